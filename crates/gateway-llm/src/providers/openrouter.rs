//! OpenRouter provider implementation
//!
//! Speaks the OpenAI-compatible wire format and adds the two attribution headers
//! OpenRouter uses to identify the calling application.

use super::openai::{decode_compat_event, CompatRequest, CompatResponse};
use crate::provider::{ensure_body, ensure_success, read_json, Provider, ProviderResult};
use crate::stream::{sse_deltas, DeltaStream};
use async_trait::async_trait;
use gateway_core::config::OPENROUTER_API_BASE;
use gateway_core::llm::{ChatRequest, ChatResponse, ProviderId};
use gateway_core::Credential;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, instrument};

pub const SUGGESTED_MODELS: &[&str] = &[
    "openai/gpt-4o",
    "anthropic/claude-3.5-sonnet",
    "google/gemini-pro-1.5",
    "meta-llama/llama-3.1-70b-instruct",
];

/// OpenRouter provider
pub struct OpenRouterProvider {
    client: Client,
    api_key: Credential,
    api_base: String,
    referer: String,
    title: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: Credential, referer: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_key, referer, title)
    }

    pub fn with_client(
        client: Client,
        api_key: Credential,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            api_base: OPENROUTER_API_BASE.to_string(),
            referer: referer.into(),
            title: title.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    fn post_completions(&self) -> RequestBuilder {
        self.client
            .post(format!(
                "{}/chat/completions",
                self.api_base.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenRouter
    }

    #[instrument(skip(self, request), fields(provider = "openrouter", model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        debug!("Sending chat request to OpenRouter");

        let response = self
            .post_completions()
            .json(&CompatRequest::from_chat(request, false))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: CompatResponse = read_json(response).await?;
        body.into_chat_response(&request.model)
    }

    #[instrument(skip(self, request), fields(provider = "openrouter", model = %request.model))]
    async fn stream_chat(&self, request: &ChatRequest) -> ProviderResult<DeltaStream> {
        debug!("Opening chat stream to OpenRouter");

        let response = self
            .post_completions()
            .json(&CompatRequest::from_chat(request, true))
            .send()
            .await?;
        let response = ensure_body(ensure_success(response).await?)?;

        let model = request.model.clone();
        Ok(sse_deltas(response, move |data| {
            decode_compat_event(data, &model)
        }))
    }
}
