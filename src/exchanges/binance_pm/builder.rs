use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClientBuilder, RestClientConfig};
use crate::exchanges::binance_pm::rest::ListenKeyClient;
use crate::exchanges::binance_pm::signer::BinancePmSigner;
use crate::exchanges::binance_pm::stream::BINANCE_PM_WS_URL;
use std::sync::Arc;

/// Production base URL of the portfolio margin REST API
pub const BINANCE_PM_REST_URL: &str = "https://papi.binance.com";

/// Create a signed listen-key client from credentials
pub fn build_listen_key_client(
    config: &ExchangeConfig,
) -> Result<ListenKeyClient<ReqwestRest>, ExchangeError> {
    if !config.has_credentials() {
        return Err(ExchangeError::AuthError(
            "API key and secret are required for listen key management".to_string(),
        ));
    }

    let base_url = config
        .rest_base_url
        .clone()
        .unwrap_or_else(|| BINANCE_PM_REST_URL.to_string());

    let rest_config = RestClientConfig::new(base_url, "binance_pm".to_string())
        .with_timeout(30)
        .with_max_retries(3);

    let signer = BinancePmSigner::new(
        config.api_key().to_string(),
        config.secret_key().to_string(),
    )
    .with_recv_window(config.recv_window);

    let rest = RestClientBuilder::new(rest_config)
        .with_signer(Arc::new(signer))
        .build()?;

    Ok(ListenKeyClient::new(rest))
}

/// User-data stream base URL, honoring the configured override
pub fn user_data_base_url(config: &ExchangeConfig) -> &str {
    config.ws_base_url.as_deref().unwrap_or(BINANCE_PM_WS_URL)
}
