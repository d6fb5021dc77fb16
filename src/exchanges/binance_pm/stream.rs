use crate::core::errors::ExchangeError;
use crate::core::kernel::{serve, DoneSignal, ReconnectWs, StopHandle, TungsteniteWs, WsConfig, WsSession};
use crate::exchanges::binance_pm::codec::UserDataCodec;
use crate::exchanges::binance_pm::types::UserDataEvent;
use tracing::{info, instrument};

/// Production base URL of the portfolio margin user-data stream
pub const BINANCE_PM_WS_URL: &str = "wss://fstream.binance.com/pm/ws";

const STREAM_NAME: &str = "binance_pm_user_data";

/// Stream URL for a listen key: `{base}/{listen_key}`
pub fn user_data_endpoint(base_url: &str, listen_key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), listen_key)
}

/// Subscribe to the user-data stream identified by `listen_key`
///
/// Returns once the connection is established; connect failures are returned
/// here and never reach `err_handler`. From then on every frame is delivered
/// to `handler` (or `err_handler` when it cannot be decoded) on a background
/// task, one at a time and in arrival order.
pub async fn subscribe_user_data<H, E>(
    listen_key: &str,
    config: &WsConfig,
    handler: H,
    err_handler: E,
) -> Result<(DoneSignal, StopHandle), ExchangeError>
where
    H: FnMut(UserDataEvent) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    subscribe_user_data_at(BINANCE_PM_WS_URL, listen_key, config, handler, err_handler).await
}

/// Same as [`subscribe_user_data`] against a different base URL
#[instrument(skip(listen_key, config, handler, err_handler), fields(stream = STREAM_NAME))]
pub async fn subscribe_user_data_at<H, E>(
    base_url: &str,
    listen_key: &str,
    config: &WsConfig,
    handler: H,
    err_handler: E,
) -> Result<(DoneSignal, StopHandle), ExchangeError>
where
    H: FnMut(UserDataEvent) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    if listen_key.is_empty() {
        return Err(ExchangeError::InvalidParameters(
            "listen key must not be empty".to_string(),
        ));
    }

    let mut ws = TungsteniteWs::new(
        user_data_endpoint(base_url, listen_key),
        STREAM_NAME.to_string(),
        config.clone(),
    );
    ws.connect().await?;
    info!("User data stream connected");

    if config.reconnect_enabled() {
        let ws = ReconnectWs::new(ws)
            .with_max_reconnect_attempts(config.max_reconnect_attempts)
            .with_reconnect_delay(config.reconnect_delay);
        Ok(subscribe_user_data_with_session(ws, handler, err_handler))
    } else {
        Ok(subscribe_user_data_with_session(ws, handler, err_handler))
    }
}

/// Run the user-data demultiplexer over an already connected session
pub fn subscribe_user_data_with_session<S, H, E>(
    session: S,
    handler: H,
    err_handler: E,
) -> (DoneSignal, StopHandle)
where
    S: WsSession + 'static,
    H: FnMut(UserDataEvent) + Send + 'static,
    E: FnMut(ExchangeError) + Send + 'static,
{
    serve(session, UserDataCodec, handler, err_handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_endpoint() {
        assert_eq!(
            user_data_endpoint(BINANCE_PM_WS_URL, "abc123"),
            "wss://fstream.binance.com/pm/ws/abc123"
        );
        assert_eq!(
            user_data_endpoint("ws://127.0.0.1:9000/pm/ws/", "abc123"),
            "ws://127.0.0.1:9000/pm/ws/abc123"
        );
    }

    #[tokio::test]
    async fn test_empty_listen_key_rejected() {
        let result =
            subscribe_user_data("", &WsConfig::default(), |_| {}, |_| {}).await;
        assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_connect_failure_is_returned() {
        let config = WsConfig::default().with_connect_timeout(std::time::Duration::from_secs(2));
        let result =
            subscribe_user_data_at("ws://127.0.0.1:1", "abc", &config, |_| {}, |_| {}).await;
        assert!(result.is_err());
    }
}
