//! Google Gemini provider implementation
//!
//! Authenticates with the `key` query parameter and sends no auth header.
//! The streaming endpoint returns a JSON array of response objects rather than SSE.

use crate::provider::{ensure_body, ensure_success, read_json, Provider, ProviderError, ProviderResult};
use crate::stream::{json_array_deltas, DeltaStream};
use async_trait::async_trait;
use gateway_core::config::GEMINI_API_BASE;
use gateway_core::llm::{ChatRequest, ChatResponse, ProviderId, Role, StreamDelta};
use gateway_core::Credential;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const SUGGESTED_MODELS: &[&str] = &["gemini-1.5-pro", "gemini-1.5-flash", "gemini-2.0-flash"];

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: Credential,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(api_key: Credential) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    pub fn with_client(client: Client, api_key: Credential) -> Self {
        Self {
            client,
            api_key,
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    fn post_model(&self, model: &str, method: &str) -> RequestBuilder {
        self.client
            .post(format!(
                "{}/models/{}:{}",
                self.api_base.trim_end_matches('/'),
                model,
                method
            ))
            .query(&[("key", self.api_key.expose())])
            .header("Content-Type", "application/json")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

impl GeminiRequest {
    fn from_chat(request: &ChatRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        Role::System | Role::User => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        Self {
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: request.top_p,
                frequency_penalty: request.frequency_penalty,
                presence_penalty: request.presence_penalty,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

impl GeminiResponse {
    /// Text at `candidates[0].content.parts[0]`, if that path exists
    fn first_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let part = content.parts.into_iter().next()?;
        Some(part.text.unwrap_or_default())
    }
}

/// Decode one streamed response object. Objects without a candidate are skipped.
fn decode_stream_object(object: &str, request_model: &str) -> Option<StreamDelta> {
    let response: GeminiResponse = match serde_json::from_str(object) {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream object");
            return None;
        }
    };
    if response.candidates.is_empty() {
        return None;
    }
    let text = response.first_text().unwrap_or_default();
    Some(StreamDelta::text("", text, request_model))
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    #[instrument(skip(self, request), fields(provider = "gemini", model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<ChatResponse> {
        debug!("Sending chat request to Gemini");

        let response = self
            .post_model(&request.model, "generateContent")
            .json(&GeminiRequest::from_chat(request))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: GeminiResponse = read_json(response).await?;
        let content = body.first_text().ok_or_else(|| {
            ProviderError::InvalidResponse("missing candidates[0].content.parts[0].text".into())
        })?;

        Ok(ChatResponse {
            id: String::new(),
            content,
            role: Role::Assistant,
            model: request.model.clone(),
            usage: None,
        })
    }

    #[instrument(skip(self, request), fields(provider = "gemini", model = %request.model))]
    async fn stream_chat(&self, request: &ChatRequest) -> ProviderResult<DeltaStream> {
        debug!("Opening chat stream to Gemini");

        let response = self
            .post_model(&request.model, "streamGenerateContent")
            .json(&GeminiRequest::from_chat(request))
            .send()
            .await?;
        let response = ensure_body(ensure_success(response).await?)?;

        let model = request.model.clone();
        Ok(json_array_deltas(response, move |object| {
            decode_stream_object(object, &model)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::llm::Message;

    #[test]
    fn test_request_roles_and_generation_config() {
        let mut request = ChatRequest::new(
            "gemini-1.5-flash",
            vec![
                Message::system("be brief"),
                Message::user("hi"),
                Message::assistant("hello"),
            ],
        );
        request.temperature = Some(0.2);
        request.max_tokens = Some(100);

        let body = serde_json::to_value(GeminiRequest::from_chat(&request)).unwrap();
        let roles: Vec<_> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["user", "user", "model"]);
        assert_eq!(body["contents"][2]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 100);
        assert!(body["generationConfig"]["temperature"].is_number());
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_first_text() {
        let body: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}]}}]
        }))
        .unwrap();
        assert_eq!(body.first_text().as_deref(), Some("Hello"));

        let empty: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.first_text(), None);
    }

    #[test]
    fn test_stream_object_decoding() {
        let delta = decode_stream_object(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#,
            "gemini-1.5-flash",
        )
        .unwrap();
        assert_eq!(delta.id, "");
        assert_eq!(delta.delta, "Hi");
        assert_eq!(delta.model, "gemini-1.5-flash");

        assert!(decode_stream_object(r#"{"usageMetadata":{}}"#, "m").is_none());
        assert!(decode_stream_object("{broken", "m").is_none());
    }
}
