//! OpenAI provider implementation
//!
//! Also hosts the OpenAI-compatible wire format, which OpenRouter shares.

use crate::provider::{
    ensure_body, ensure_success, parse_role, read_json, usage_from, Provider, ProviderError,
    ProviderResult,
};
use crate::stream::{sse_deltas, DeltaStream, SseEvent};
use async_trait::async_trait;
use gateway_core::config::OPENAI_API_BASE;
use gateway_core::llm::{ChatRequest, ChatResponse, Message, ProviderId, Role, StreamDelta};
use gateway_core::Credential;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const SUGGESTED_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

/// OpenAI provider
pub struct OpenAIProvider {
    client: Client,
    api_key: Credential,
    api_base: String,
}

impl OpenAIProvider {
    pub fn new(api_key: Credential) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    pub fn with_client(client: Client, api_key: Credential) -> Self {
        Self {
            client,
            api_key,
            api_base: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_base.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    #[instrument(skip(self, request), fields(provider = "openai", model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        debug!("Sending chat request to OpenAI");

        let response = self
            .post("/chat/completions")
            .json(&CompatRequest::from_chat(request, false))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: CompatResponse = read_json(response).await?;
        body.into_chat_response(&request.model)
    }

    #[instrument(skip(self, request), fields(provider = "openai", model = %request.model))]
    async fn stream_chat(&self, request: &ChatRequest) -> ProviderResult<DeltaStream> {
        debug!("Opening chat stream to OpenAI");

        let response = self
            .post("/chat/completions")
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

// OpenAI-compatible wire format

#[derive(Debug, Serialize)]
pub(crate) struct CompatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

impl<'a> CompatRequest<'a> {
    pub(crate) fn from_chat(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompatChoice>,
    #[serde(default)]
    usage: Option<CompatUsage>,
}

#[derive(Debug, Deserialize)]
struct CompatChoice {
    message: CompatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct CompatMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl CompatResponse {
    pub(crate) fn into_chat_response(self, request_model: &str) -> ProviderResult<ChatResponse> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message".into()))?;

        Ok(ChatResponse {
            id: self.id,
            content: choice.message.content.unwrap_or_default(),
            role: parse_role(choice.message.role.as_deref()).unwrap_or(Role::Assistant),
            model: self.model.unwrap_or_else(|| request_model.to_string()),
            usage: self.usage.and_then(|u| {
                usage_from(u.prompt_tokens, u.completion_tokens, u.total_tokens)
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompatChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompatChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct CompatChunkChoice {
    #[serde(default)]
    delta: CompatMessage,
}

/// Decode one `data:` payload of an OpenAI-compatible stream.
pub(crate) fn decode_compat_event(data: &str, request_model: &str) -> SseEvent {
    if data.trim() == "[DONE]" {
        return SseEvent::Done;
    }

    let chunk: CompatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream event");
            return SseEvent::Skip;
        }
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return SseEvent::Skip;
    };

    SseEvent::Delta(StreamDelta {
        id: chunk.id,
        delta: choice.delta.content.unwrap_or_default(),
        role: parse_role(choice.delta.role.as_deref()),
        model: chunk.model.unwrap_or_else(|| request_model.to_string()),
        done: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::llm::Usage;

    #[test]
    fn test_request_body() {
        let mut request = ChatRequest::new(
            "gpt-4o",
            vec![Message::system("be brief"), Message::user("hi")],
        );
        request.temperature = Some(0.5);

        let body = serde_json::to_value(CompatRequest::from_chat(&request, true)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_mapping() {
        let body: CompatResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        }))
        .unwrap();

        let response = body.into_chat_response("gpt-4o").unwrap();
        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.content, "Hello");
        assert_eq!(response.role, Role::Assistant);
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.usage, Some(Usage::from_parts(5, 2)));
    }

    #[test]
    fn test_response_without_choices() {
        let body: CompatResponse =
            serde_json::from_value(serde_json::json!({"id": "x", "choices": []})).unwrap();
        assert!(matches!(
            body.into_chat_response("gpt-4o"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_stream_event_decoding() {
        let event = decode_compat_event(
            r#"{"id":"c1","model":"gpt-4o","choices":[{"delta":{"role":"assistant","content":"Hi"}}]}"#,
            "gpt-4o",
        );
        match event {
            SseEvent::Delta(delta) => {
                assert_eq!(delta.id, "c1");
                assert_eq!(delta.delta, "Hi");
                assert_eq!(delta.role, Some(Role::Assistant));
                assert!(!delta.done);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert_eq!(decode_compat_event("[DONE]", "gpt-4o"), SseEvent::Done);
        assert_eq!(decode_compat_event("{not json", "gpt-4o"), SseEvent::Skip);
        assert_eq!(
            decode_compat_event(r#"{"id":"c1","choices":[]}"#, "gpt-4o"),
            SseEvent::Skip
        );
    }
}
