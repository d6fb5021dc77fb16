use anyhow::Context;
use pmargin::core::kernel::WsConfig;
use pmargin::exchanges::binance_pm::{
    build_listen_key_client, subscribe_user_data_at, user_data_base_url, ListenKeyService,
    UserDataPayload,
};
use pmargin::ExchangeConfig;
use std::time::Duration;
use tracing::{error, info, warn};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    #[cfg(feature = "env-file")]
    let config = ExchangeConfig::from_env_file("BINANCE_PM")?;
    #[cfg(not(feature = "env-file"))]
    let config = ExchangeConfig::from_env("BINANCE_PM")?;

    let listen_keys = build_listen_key_client(&config)?;
    let listen_key = listen_keys
        .start()
        .await
        .context("failed to obtain listen key")?;
    info!("Obtained listen key");

    let mut ws_config = WsConfig::default();
    if let Ok(proxy) = std::env::var("BINANCE_PM_PROXY") {
        ws_config = ws_config.with_proxy(proxy);
    }

    let (mut done, stop) = subscribe_user_data_at(
        user_data_base_url(&config),
        &listen_key,
        &ws_config,
        |event| match &event.payload {
            Some(UserDataPayload::FuturesOrderUpdate(update)) => info!(
                symbol = %update.order.symbol,
                status = %update.order.order_status,
                "futures order update"
            ),
            Some(UserDataPayload::MarginOrderUpdate(update)) => info!(
                symbol = %update.symbol,
                status = %update.order_status,
                "margin order update"
            ),
            Some(payload) => info!(event = %payload.event_type(), "{:?}", payload),
            None if event.is_stream_expired() => warn!("Listen key expired"),
            None => info!(event = %event.event_type, "event without payload"),
        },
        |err| error!("{}", err),
    )
    .await?;

    let mut renew = tokio::time::interval(KEEPALIVE_INTERVAL);
    renew.tick().await;

    loop {
        tokio::select! {
            () = done.wait() => {
                warn!("User data stream ended");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                stop.stop();
                done.wait().await;
                break;
            }
            _ = renew.tick() => {
                if let Err(e) = listen_keys.keepalive(&listen_key).await {
                    error!("Failed to renew listen key: {}", e);
                }
            }
        }
    }

    if let Err(e) = listen_keys.close(&listen_key).await {
        warn!("Failed to close listen key: {}", e);
    }
    Ok(())
}
