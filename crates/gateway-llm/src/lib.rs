//! Gateway LLM - Provider adapters for the gateway
//!
//! This crate provides:
//! - The [`Provider`] abstraction over upstream chat APIs
//! - Adapters for OpenAI, Anthropic, Gemini and OpenRouter
//! - Incremental stream decoding ([`DeltaStream`])
//! - The [`ProviderRegistry`] mapping provider identifiers to adapters

pub mod provider;
pub mod providers;
pub mod registry;
pub mod stream;

pub use provider::{Provider, ProviderError, ProviderResult};
pub use providers::{AnthropicProvider, GeminiProvider, OpenAIProvider, OpenRouterProvider};
pub use registry::ProviderRegistry;
pub use stream::DeltaStream;
