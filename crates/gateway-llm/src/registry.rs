//! Provider registry
//!
//! Maps a provider identifier plus one resolved credential to a configured adapter.
//! The set of providers is closed; adding one means adding an adapter and a match arm here.

use crate::provider::Provider;
use crate::providers::{anthropic, gemini, openai, openrouter};
use crate::providers::{AnthropicProvider, GeminiProvider, OpenAIProvider, OpenRouterProvider};
use gateway_core::config::ProvidersConfig;
use gateway_core::llm::{ProviderId, ProviderMetadata};
use gateway_core::Credential;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Builds per-request adapters sharing one HTTP connection pool
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    client: Client,
    config: ProvidersConfig,
}

impl ProviderRegistry {
    pub fn new(config: ProvidersConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: ProvidersConfig) -> Self {
        Self { client, config }
    }

    /// Adapter for a known provider, bound to `credential`
    pub fn adapter(&self, id: ProviderId, credential: Credential) -> Arc<dyn Provider> {
        debug!(provider = %id, "Creating provider adapter");
        let client = self.client.clone();

        match id {
            ProviderId::OpenAI => Arc::new(
                OpenAIProvider::with_client(client, credential)
                    .with_base_url(&self.config.openai_api_base),
            ),
            ProviderId::Anthropic => Arc::new(
                AnthropicProvider::with_client(client, credential)
                    .with_base_url(&self.config.anthropic_api_base),
            ),
            ProviderId::Gemini => Arc::new(
                GeminiProvider::with_client(client, credential)
                    .with_base_url(&self.config.gemini_api_base),
            ),
            ProviderId::OpenRouter => Arc::new(
                OpenRouterProvider::with_client(
                    client,
                    credential,
                    &self.config.openrouter_referer,
                    &self.config.openrouter_title,
                )
                .with_base_url(&self.config.openrouter_api_base),
            ),
        }
    }

    /// Display metadata for every supported provider
    pub fn metadata(&self) -> Vec<ProviderMetadata> {
        ProviderId::ALL
            .iter()
            .map(|id| ProviderMetadata {
                id: *id,
                name: id.display_name().to_string(),
                models: suggested_models(*id).iter().map(|m| m.to_string()).collect(),
            })
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(ProvidersConfig::default())
    }
}

/// Suggested model identifiers for display. Requests are never validated against these.
pub fn suggested_models(id: ProviderId) -> &'static [&'static str] {
    match id {
        ProviderId::OpenAI => openai::SUGGESTED_MODELS,
        ProviderId::Anthropic => anthropic::SUGGESTED_MODELS,
        ProviderId::Gemini => gemini::SUGGESTED_MODELS,
        ProviderId::OpenRouter => openrouter::SUGGESTED_MODELS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::error::GatewayError;

    #[test]
    fn test_adapter_for_every_provider() {
        let registry = ProviderRegistry::default();
        for id in ProviderId::ALL {
            let adapter = registry.adapter(id, Credential::new("k"));
            assert_eq!(adapter.id(), id);
        }
    }

    #[test]
    fn test_adapter_by_name() {
        let registry = ProviderRegistry::default();
        let id: ProviderId = "openrouter".parse().unwrap();
        assert_eq!(registry.adapter(id, Credential::new("k")).id(), ProviderId::OpenRouter);

        match "mistral".parse::<ProviderId>() {
            Err(GatewayError::UnsupportedProvider(id)) => assert_eq!(id, "mistral"),
            other => panic!("unknown provider must be rejected: {other:?}"),
        }

        // Identifiers are case-sensitive
        assert!("OpenAI".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_metadata() {
        let metadata = ProviderRegistry::default().metadata();
        assert_eq!(metadata.len(), 4);
        assert_eq!(metadata[0].id, ProviderId::OpenAI);
        assert_eq!(metadata[2].name, "Google Gemini");
        assert!(metadata.iter().all(|m| !m.models.is_empty()));
    }
}
