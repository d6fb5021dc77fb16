use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i32, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    /// A single stream frame could not be decoded. `event_type` is `None` when
    /// the envelope itself was unreadable.
    #[error(
        "Failed to decode {} frame: {reason}: {raw}",
        .event_type.as_deref().unwrap_or("envelope")
    )]
    FrameDecode {
        event_type: Option<String>,
        reason: String,
        raw: String,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    #[cold]
    #[inline(never)]
    pub fn envelope_decode(reason: impl ToString, raw: impl Into<String>) -> Self {
        Self::FrameDecode {
            event_type: None,
            reason: reason.to_string(),
            raw: raw.into(),
        }
    }

    #[cold]
    #[inline(never)]
    pub fn payload_decode(
        event_type: impl Into<String>,
        reason: impl ToString,
        raw: impl Into<String>,
    ) -> Self {
        Self::FrameDecode {
            event_type: Some(event_type.into()),
            reason: reason.to_string(),
            raw: raw.into(),
        }
    }

    /// True for per-frame decode failures, which never end a stream.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Self::FrameDecode { .. })
    }

    /// Transient transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::ConnectionTimeout(_) => true,
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            Self::ApiError { code, .. } => *code >= 500,
            _ => false,
        }
    }
}
