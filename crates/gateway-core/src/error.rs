//! Gateway error types

use crate::llm::ProviderId;
use thiserror::Error;

/// Main gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("API key not configured for provider {0}")]
    NotConfigured(ProviderId),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Non-2xx from the upstream, or a transport failure (`status` is `None`).
    #[error("Upstream error (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("Upstream returned no response body")]
    NoResponseBody,

    #[error("Malformed credential envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
