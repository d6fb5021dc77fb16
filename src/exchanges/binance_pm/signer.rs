use crate::core::errors::ExchangeError;
use crate::core::kernel::{SignatureResult, Signer};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for `/papi` endpoints
pub struct BinancePmSigner {
    api_key: Secret<String>,
    secret_key: Secret<String>,
    recv_window: Option<u64>,
}

impl BinancePmSigner {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            recv_window: None,
        }
    }

    /// Reject requests the server receives later than `recv_window_ms` after signing
    pub fn with_recv_window(mut self, recv_window_ms: Option<u64>) -> Self {
        self.recv_window = recv_window_ms;
        self
    }

    fn generate_signature(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Failed to create HMAC: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Signer for BinancePmSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        _body: &[u8],
        timestamp: u64,
    ) -> SignatureResult {
        let mut params: Vec<(String, String)> = query_string
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (key.to_string(), value.to_string())
            })
            .collect();

        if let Some(recv_window) = self.recv_window {
            params.push(("recvWindow".to_string(), recv_window.to_string()));
        }
        params.push(("timestamp".to_string(), timestamp.to_string()));

        let payload = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.generate_signature(&payload)?;
        params.push(("signature".to_string(), signature));

        let mut headers = HashMap::new();
        headers.insert(
            "X-MBX-APIKEY".to_string(),
            self.api_key.expose_secret().clone(),
        );

        Ok((headers, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_documented_vector() {
        let signer = BinancePmSigner::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A".to_string(),
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string(),
        )
        .with_recv_window(Some(5000));

        let (headers, params) = signer
            .sign_request(
                "POST",
                "/api/v3/order",
                "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1",
                &[],
                1_499_827_319_559,
            )
            .unwrap();

        assert_eq!(
            headers.get("X-MBX-APIKEY").map(String::as_str),
            Some("vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A")
        );
        assert_eq!(params.len(), 9);
        assert_eq!(params[0], ("symbol".to_string(), "LTCBTC".to_string()));
        assert_eq!(params[6], ("recvWindow".to_string(), "5000".to_string()));
        assert_eq!(
            params[8],
            (
                "signature".to_string(),
                "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71".to_string()
            )
        );
    }

    #[test]
    fn test_empty_query_signs_timestamp_only() {
        let signer = BinancePmSigner::new("key".to_string(), "secret".to_string());
        let (_, params) = signer
            .sign_request("POST", "/papi/v1/listenKey", "", &[], 1)
            .unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["timestamp", "signature"]);
        assert_eq!(params[1].1.len(), 64);
    }
}
