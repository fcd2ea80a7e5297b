//! LLM Provider abstraction

use crate::stream::DeltaStream;
use async_trait::async_trait;
use gateway_core::error::GatewayError;
use gateway_core::llm::{ChatRequest, ChatResponse, ProviderId, Role, Usage};
use reqwest::Response;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Provider error types
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status. `body` is the raw body parsed as JSON when possible.
    #[error("Upstream error: {status} - {raw_body}")]
    Upstream {
        status: u16,
        raw_body: String,
        body: Option<serde_json::Value>,
    },

    #[error("No response body")]
    NoResponseBody,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    /// Upstream HTTP status, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream {
                status,
                raw_body,
                body,
            } => GatewayError::Upstream {
                status: Some(status),
                message: raw_body,
                body,
            },
            ProviderError::Http(e) => GatewayError::Upstream {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
                body: None,
            },
            ProviderError::NoResponseBody => GatewayError::NoResponseBody,
            ProviderError::InvalidResponse(message) => GatewayError::Upstream {
                status: None,
                message,
                body: None,
            },
        }
    }
}

/// Provider trait for LLM backends.
///
/// Implementations are bound to one credential and base URL and hold no other state,
/// so a single instance can serve concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Non-streaming chat completion
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<ChatResponse>;

    /// Open a streaming chat completion.
    ///
    /// Each call opens a new upstream connection; the returned stream is not restartable.
    async fn stream_chat(&self, request: &ChatRequest) -> ProviderResult<DeltaStream>;
}

/// Fail with [`ProviderError::Upstream`] on a non-2xx status.
pub(crate) async fn ensure_success(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw_body = response.text().await.unwrap_or_default();
    let body = serde_json::from_str(&raw_body).ok();
    warn!(status = status.as_u16(), "Upstream returned error status");

    Err(ProviderError::Upstream {
        status: status.as_u16(),
        raw_body,
        body,
    })
}

/// Fail with [`ProviderError::NoResponseBody`] when a stream has nothing to read.
pub(crate) fn ensure_body(response: Response) -> ProviderResult<Response> {
    if response.content_length() == Some(0) {
        return Err(ProviderError::NoResponseBody);
    }
    Ok(response)
}

/// Decode a JSON body, reporting shape mismatches as invalid responses.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Map upstream usage figures, summing the parts when no total is reported.
pub(crate) fn usage_from(
    prompt: Option<u32>,
    completion: Option<u32>,
    total: Option<u32>,
) -> Option<Usage> {
    if prompt.is_none() && completion.is_none() && total.is_none() {
        return None;
    }
    let mut usage = Usage::from_parts(prompt.unwrap_or(0), completion.unwrap_or(0));
    if let Some(total) = total {
        usage.total_tokens = total;
    }
    Some(usage)
}

/// Parse an upstream role string; unknown roles map to `None`.
pub(crate) fn parse_role(role: Option<&str>) -> Option<Role> {
    match role? {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}
