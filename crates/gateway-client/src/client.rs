//! HTTP client for the gateway chat endpoint

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::llm::{ChatRequest, ChatResponse, ProviderId};
use gateway_core::CallerIdentity;
use reqwest::{Client, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

const DEFAULT_CALLER_HEADER: &str = "x-caller-id";

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx from the gateway, with the message of its `{ "error": ... }` body
    #[error("Gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The gateway reported a failure after streaming began
    #[error("Stream failed: {0}")]
    Stream(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Raw chunks of a streaming reply
pub type ByteStream = BoxStream<'static, ClientResult<Bytes>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody<'a> {
    provider_id: ProviderId,
    #[serde(flatten)]
    request: &'a ChatRequest,
}

/// Client for `POST /v1/chat`
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    caller_header: String,
    caller: CallerIdentity,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, caller: CallerIdentity) -> Self {
        Self::with_client(Client::new(), base_url, caller)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, caller: CallerIdentity) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            caller_header: DEFAULT_CALLER_HEADER.to_string(),
            caller,
        }
    }

    /// Header the gateway reads the caller identity from
    pub fn with_caller_header(mut self, header: impl Into<String>) -> Self {
        self.caller_header = header.into();
        self
    }

    async fn post_chat(
        &self,
        provider: ProviderId,
        request: &ChatRequest,
    ) -> ClientResult<Response> {
        let response = self
            .http
            .post(format!("{}/v1/chat", self.base_url.trim_end_matches('/')))
            .header(self.caller_header.as_str(), self.caller.as_str())
            .json(&ChatBody { provider_id: provider, request })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(text);

        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Single-shot chat call
    #[instrument(skip(self, request), fields(provider = %provider, model = %request.model))]
    pub async fn chat(&self, provider: ProviderId, request: &ChatRequest) -> ClientResult<ChatResponse> {
        debug!("Sending chat request to gateway");
        let request = ChatRequest {
            stream: false,
            ..request.clone()
        };
        let response = self.post_chat(provider, &request).await?;
        Ok(response.json().await?)
    }

    /// Streaming chat call, returning the raw event stream for a [`crate::StreamRelay`]
    #[instrument(skip(self, request), fields(provider = %provider, model = %request.model))]
    pub async fn chat_stream(&self, provider: ProviderId, request: &ChatRequest) -> ClientResult<ByteStream> {
        debug!("Opening chat stream through gateway");
        let request = ChatRequest {
            stream: true,
            ..request.clone()
        };
        let response = self.post_chat(provider, &request).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::llm::Message;

    #[test]
    fn test_body_shape() {
        let mut request = ChatRequest::new("gpt-4o", vec![Message::user("hi")]).streaming(true);
        request.max_tokens = Some(16);

        let body = serde_json::to_value(ChatBody {
            provider_id: ProviderId::OpenRouter,
            request: &request,
        })
        .unwrap();

        assert_eq!(body["providerId"], "openrouter");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["maxTokens"], 16);
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
