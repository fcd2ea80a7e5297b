//! Anthropic Claude provider implementation

use crate::provider::{
    ensure_body, ensure_success, parse_role, read_json, usage_from, Provider, ProviderError,
    ProviderResult,
};
use crate::stream::{sse_deltas, DeltaStream, SseEvent};
use async_trait::async_trait;
use gateway_core::config::ANTHROPIC_API_BASE;
use gateway_core::llm::{ChatRequest, ChatResponse, Message, ProviderId, Role, StreamDelta};
use gateway_core::Credential;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub const SUGGESTED_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: Credential,
    api_base: String,
}

impl AnthropicProvider {
    pub fn new(api_key: Credential) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    pub fn with_client(client: Client, api_key: Credential) -> Self {
        Self {
            client,
            api_key,
            api_base: ANTHROPIC_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    fn post_messages(&self) -> RequestBuilder {
        self.client
            .post(format!("{}/messages", self.api_base.trim_end_matches('/')))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

impl<'a> AnthropicRequest<'a> {
    fn from_chat(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            top_p: request.top_p,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl AnthropicResponse {
    fn into_chat_response(self, request_model: &str) -> ProviderResult<ChatResponse> {
        let block = self
            .content
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("missing content[0].text".into()))?;

        Ok(ChatResponse {
            id: self.id,
            content: block.text.unwrap_or_default(),
            role: parse_role(self.role.as_deref()).unwrap_or(Role::Assistant),
            model: self.model.unwrap_or_else(|| request_model.to_string()),
            usage: self
                .usage
                .and_then(|u| usage_from(u.input_tokens, u.output_tokens, None)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    message: Option<AnthropicEventMessage>,
    #[serde(default)]
    delta: Option<AnthropicEventDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicEventMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicEventDelta {
    #[serde(default)]
    text: Option<String>,
}

/// Per-stream decoder state: the message id and model announced by `message_start`.
#[derive(Debug, Default)]
struct EventDecoder {
    message_id: String,
    model: String,
}

impl EventDecoder {
    fn new(request_model: &str) -> Self {
        Self {
            message_id: String::new(),
            model: request_model.to_string(),
        }
    }

    fn decode(&mut self, data: &str) -> SseEvent {
        let event: AnthropicEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable stream event");
                return SseEvent::Skip;
            }
        };

        match event.event_type.as_str() {
            "message_start" => {
                if let Some(message) = event.message {
                    self.message_id = message.id;
                    if let Some(model) = message.model {
                        self.model = model;
                    }
                }
                SseEvent::Skip
            }
            "content_block_delta" => SseEvent::Delta(StreamDelta::text(
                self.message_id.clone(),
                event.delta.and_then(|d| d.text).unwrap_or_default(),
                self.model.clone(),
            )),
            _ => SseEvent::Skip,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    #[instrument(skip(self, request), fields(provider = "anthropic", model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        debug!("Sending chat request to Anthropic");

        let response = self
            .post_messages()
            .json(&AnthropicRequest::from_chat(request, false))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: AnthropicResponse = read_json(response).await?;
        body.into_chat_response(&request.model)
    }

    #[instrument(skip(self, request), fields(provider = "anthropic", model = %request.model))]
    async fn stream_chat(&self, request: &ChatRequest) -> ProviderResult<DeltaStream> {
        debug!("Opening chat stream to Anthropic");

        let response = self
            .post_messages()
            .json(&AnthropicRequest::from_chat(request, true))
            .send()
            .await?;
        let response = ensure_body(ensure_success(response).await?)?;

        let mut decoder = EventDecoder::new(&request.model);
        Ok(sse_deltas(response, move |data| decoder.decode(data)))
    }
}
