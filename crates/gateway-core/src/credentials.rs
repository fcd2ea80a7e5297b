//! Credential resolution
//!
//! A request is served with exactly one credential, taken from the first source that
//! has one:
//! 1. the caller's own enabled key for the provider, decrypted from the credential store
//! 2. the operator fallback named `<PROVIDER>_API_KEY`
//!
//! Sources are never merged. Credential material is never logged.

use crate::crypto::{CipherError, CredentialCipher};
use crate::error::{GatewayError, GatewayResult};
use crate::llm::ProviderId;
use crate::storage::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque identity of the authenticated caller, supplied by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Returns `None` for an empty or blank identity.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An upstream API secret. Redacted in `Debug`, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Lookup contract of the external credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Encrypted envelope of the caller's enabled credential for `provider`, if any.
    async fn find_enabled_credential(
        &self,
        caller: &CallerIdentity,
        provider: ProviderId,
    ) -> Result<Option<String>, StorageError>;
}

/// Operator-configured fallback keys, looked up by name (`OPENAI_API_KEY`, ...).
pub trait FallbackKeySource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads fallback keys from the process environment at call time.
#[derive(Debug, Clone, Default)]
pub struct EnvFallbackKeys;

impl FallbackKeySource for EnvFallbackKeys {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of fallback keys.
#[derive(Clone, Default)]
pub struct StaticFallbackKeys {
    keys: HashMap<String, String>,
}

impl StaticFallbackKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(name.into(), value.into());
        self
    }
}

impl FallbackKeySource for StaticFallbackKeys {
    fn lookup(&self, name: &str) -> Option<String> {
        self.keys.get(name).cloned()
    }
}

impl fmt::Debug for StaticFallbackKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticFallbackKeys")
            .field("names", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    User,
    Operator,
}

/// Resolves the credential to use for a `(caller, provider)` pair.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<CredentialCipher>,
    fallback: Arc<dyn FallbackKeySource>,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: Arc<CredentialCipher>,
        fallback: Arc<dyn FallbackKeySource>,
    ) -> Self {
        Self {
            store,
            cipher,
            fallback,
        }
    }

    pub async fn resolve(
        &self,
        caller: &CallerIdentity,
        provider: ProviderId,
    ) -> GatewayResult<Credential> {
        self.resolve_with_source(caller, provider)
            .await
            .map(|(credential, _)| credential)
    }

    pub async fn resolve_with_source(
        &self,
        caller: &CallerIdentity,
        provider: ProviderId,
    ) -> GatewayResult<(Credential, CredentialSource)> {
        let stored = self
            .store
            .find_enabled_credential(caller, provider)
            .await
            .map_err(|e| GatewayError::Storage(e.to_string()))?;

        if let Some(envelope) = stored {
            let secret = self.cipher.decrypt(&envelope).map_err(|e| match e {
                CipherError::MalformedEnvelope(msg) | CipherError::InvalidKey(msg) => {
                    GatewayError::MalformedEnvelope(msg)
                }
            })?;
            debug!(provider = %provider, "Using caller credential");
            return Ok((Credential::new(secret), CredentialSource::User));
        }

        match self.fallback.lookup(&provider.fallback_key_name()) {
            Some(key) if !key.is_empty() => {
                debug!(provider = %provider, "Using operator fallback credential");
                Ok((Credential::new(key), CredentialSource::Operator))
            }
            _ => Err(GatewayError::NotConfigured(provider)),
        }
    }
}
