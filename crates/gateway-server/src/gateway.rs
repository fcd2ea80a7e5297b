//! Request handling independent of the HTTP framework
//!
//! Validates the caller and the payload, resolves the credential, picks the adapter
//! and runs the chat call. Each request owns its own adapter and stream; nothing is
//! shared between requests except read-only configuration.

use gateway_core::credentials::CredentialSource;
use gateway_core::error::{GatewayError, GatewayResult};
use gateway_core::llm::{ChatRequest, ChatResponse, Message, ProviderId};
use gateway_core::{CallerIdentity, CredentialResolver};
use gateway_llm::{DeltaStream, ProviderRegistry};
use serde::Deserialize;
use tracing::{info, instrument};

/// Body of `POST /v1/chat`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
}

impl ChatPayload {
    /// Check required fields, then the provider identifier.
    pub fn into_request(self) -> GatewayResult<(ProviderId, ChatRequest)> {
        let (Some(messages), Some(model), Some(provider_id)) =
            (self.messages, self.model, self.provider_id)
        else {
            return Err(missing_fields());
        };
        if messages.is_empty() || model.trim().is_empty() || provider_id.is_empty() {
            return Err(missing_fields());
        }

        let provider: ProviderId = provider_id.parse()?;

        let request = ChatRequest {
            model,
            messages,
            stream: self.stream,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        };
        request.validate()?;

        Ok((provider, request))
    }
}

fn missing_fields() -> GatewayError {
    GatewayError::BadRequest("Missing required fields".to_string())
}

/// Outcome of a gateway call
#[derive(Debug)]
pub enum GatewayReply {
    Complete(ChatResponse),
    Stream {
        provider: ProviderId,
        model: String,
        stream: DeltaStream,
    },
}

/// Credential resolution plus adapter dispatch
#[derive(Clone)]
pub struct Gateway {
    resolver: CredentialResolver,
    registry: ProviderRegistry,
}

impl Gateway {
    pub fn new(resolver: CredentialResolver, registry: ProviderRegistry) -> Self {
        Self { resolver, registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Serve one chat call.
    ///
    /// Fails with `Unauthorized` without a caller, `BadRequest` or `UnsupportedProvider`
    /// for an invalid payload, `NotConfigured` when no credential resolves, and passes
    /// adapter failures through.
    #[instrument(skip_all, fields(caller = caller.map(|c| c.as_str()).unwrap_or("-")))]
    pub async fn handle(
        &self,
        caller: Option<&CallerIdentity>,
        payload: ChatPayload,
    ) -> GatewayResult<GatewayReply> {
        let caller = caller.ok_or(GatewayError::Unauthorized)?;
        let (provider, request) = payload.into_request()?;

        let (credential, source) = self.resolver.resolve_with_source(caller, provider).await?;
        info!(
            provider = %provider,
            model = %request.model,
            stream = request.stream,
            user_key = source == CredentialSource::User,
            "Dispatching chat request"
        );

        let adapter = self.registry.adapter(provider, credential);
        if request.stream {
            let stream = adapter.stream_chat(&request).await?;
            Ok(GatewayReply::Stream {
                provider,
                model: request.model,
                stream,
            })
        } else {
            let response = adapter.chat(&request).await?;
            Ok(GatewayReply::Complete(response))
        }
    }
}
