//! Gateway Core - Core types for the provider gateway
//!
//! This crate provides the foundational types used across the gateway:
//! - Provider-agnostic chat request/response types
//! - Error types
//! - Configuration types
//! - Credential encryption, storage and resolution

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod llm;
pub mod storage;
pub mod tokens;

pub use credentials::{CallerIdentity, Credential, CredentialResolver, CredentialStore};
pub use crypto::CredentialCipher;
pub use error::{GatewayError, GatewayResult};
