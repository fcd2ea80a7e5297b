//! Application state

use crate::gateway::Gateway;
use gateway_core::config::GatewayConfig;
use gateway_core::credentials::{CredentialStore, EnvFallbackKeys, FallbackKeySource};
use gateway_core::storage::SqliteCredentialStore;
use gateway_core::{CredentialCipher, CredentialResolver, GatewayError, GatewayResult};
use gateway_llm::ProviderRegistry;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// Build state from configuration: cipher, credential store and provider registry.
    pub async fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let cipher = Arc::new(
            CredentialCipher::from_key_material(&config.security.encryption_key)
                .map_err(|e| GatewayError::Config(e.to_string()))?,
        );

        let store = match &config.storage.database_url {
            Some(url) => {
                info!("Opening credential store");
                SqliteCredentialStore::new(url, cipher.clone()).await
            }
            None => {
                info!("No DATABASE_URL set, using an empty in-memory credential store");
                SqliteCredentialStore::in_memory(cipher.clone()).await
            }
        }
        .map_err(|e| GatewayError::Storage(e.to_string()))?;

        Ok(Self::with_parts(
            config,
            Arc::new(store),
            cipher,
            Arc::new(EnvFallbackKeys),
        ))
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
        cipher: Arc<CredentialCipher>,
        fallback: Arc<dyn FallbackKeySource>,
    ) -> Self {
        let resolver = CredentialResolver::new(store, cipher, fallback);
        let registry = ProviderRegistry::new(config.providers.clone());

        Self {
            config: Arc::new(config),
            gateway: Arc::new(Gateway::new(resolver, registry)),
        }
    }
}
