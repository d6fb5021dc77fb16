use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

const LISTEN_KEY_ENDPOINT: &str = "/papi/v1/listenKey";

/// Lifecycle of the listen key that authorizes a user-data stream
///
/// A key stays valid for 60 minutes after the last `start` or `keepalive`.
#[async_trait]
pub trait ListenKeyService: Send + Sync {
    /// Create a key, or return the currently active one
    async fn start(&self) -> Result<String, ExchangeError>;

    /// Extend the validity of `listen_key` by another 60 minutes
    async fn keepalive(&self, listen_key: &str) -> Result<(), ExchangeError>;

    /// Invalidate `listen_key`; its stream is closed by the server
    async fn close(&self, listen_key: &str) -> Result<(), ExchangeError>;
}

#[derive(Debug, Deserialize)]
struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    listen_key: String,
}

/// Listen-key operations against the portfolio margin REST API
pub struct ListenKeyClient<R: RestClient> {
    rest: R,
}

impl<R: RestClient> ListenKeyClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &R {
        &self.rest
    }
}

#[async_trait]
impl<R: RestClient> ListenKeyService for ListenKeyClient<R> {
    #[instrument(skip(self), fields(exchange = "binance_pm"))]
    async fn start(&self) -> Result<String, ExchangeError> {
        let response: ListenKeyResponse = self
            .rest
            .signed_request_json(Method::POST, LISTEN_KEY_ENDPOINT, &[])
            .await?;
        Ok(response.listen_key)
    }

    #[instrument(skip(self, listen_key), fields(exchange = "binance_pm"))]
    async fn keepalive(&self, listen_key: &str) -> Result<(), ExchangeError> {
        if listen_key.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "listen key must not be empty".to_string(),
            ));
        }
        self.rest
            .signed_request(
                Method::PUT,
                LISTEN_KEY_ENDPOINT,
                &[("listenKey", listen_key)],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, listen_key), fields(exchange = "binance_pm"))]
    async fn close(&self, listen_key: &str) -> Result<(), ExchangeError> {
        if listen_key.is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "listen key must not be empty".to_string(),
            ));
        }
        self.rest
            .signed_request(
                Method::DELETE,
                LISTEN_KEY_ENDPOINT,
                &[("listenKey", listen_key)],
            )
            .await?;
        Ok(())
    }
}
