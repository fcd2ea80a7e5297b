//! Gateway configuration types

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Upstream endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openai_base")]
    pub openai_api_base: String,
    #[serde(default = "default_anthropic_base")]
    pub anthropic_api_base: String,
    #[serde(default = "default_gemini_base")]
    pub gemini_api_base: String,
    #[serde(default = "default_openrouter_base")]
    pub openrouter_api_base: String,
    /// Value of OpenRouter's `HTTP-Referer` identification header
    #[serde(default = "default_openrouter_referer")]
    pub openrouter_referer: String,
    /// Value of OpenRouter's `X-Title` identification header
    #[serde(default = "default_openrouter_title")]
    pub openrouter_title: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai_api_base: default_openai_base(),
            anthropic_api_base: default_anthropic_base(),
            gemini_api_base: default_gemini_base(),
            openrouter_api_base: default_openrouter_base(),
            openrouter_referer: default_openrouter_referer(),
            openrouter_title: default_openrouter_title(),
        }
    }
}

fn default_openai_base() -> String {
    OPENAI_API_BASE.to_string()
}

fn default_anthropic_base() -> String {
    ANTHROPIC_API_BASE.to_string()
}

fn default_gemini_base() -> String {
    GEMINI_API_BASE.to_string()
}

fn default_openrouter_base() -> String {
    OPENROUTER_API_BASE.to_string()
}

fn default_openrouter_referer() -> String {
    "https://anygpt.ai".to_string()
}

fn default_openrouter_title() -> String {
    "AnyGPT".to_string()
}

/// Credential and caller-identity settings
#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Cipher key for stored credentials. Required, there is no default key.
    #[serde(skip_serializing)]
    pub encryption_key: String,
    /// Header carrying the caller identity set by the authentication layer
    #[serde(default = "default_caller_header")]
    pub caller_header: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encryption_key", &"***")
            .field("caller_header", &self.caller_header)
            .finish()
    }
}

fn default_caller_header() -> String {
    "x-caller-id".to_string()
}

/// Credential store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite URL; `None` means an empty in-memory store
    #[serde(default)]
    pub database_url: Option<String>,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("GATEWAY_PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid GATEWAY_PORT: {p}")))?,
            None => default_port(),
        };

        let encryption_key = var("ENCRYPTION_KEY").ok_or_else(|| {
            GatewayError::Config("ENCRYPTION_KEY must be set to store credentials".to_string())
        })?;

        let defaults = ProvidersConfig::default();

        Ok(Self {
            server: ServerConfig {
                host: var("GATEWAY_HOST").unwrap_or_else(default_host),
                port,
                cors_origins: var("GATEWAY_CORS_ORIGINS")
                    .map(|origins| {
                        origins
                            .split(',')
                            .map(|o| o.trim().to_string())
                            .filter(|o| !o.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            providers: ProvidersConfig {
                openai_api_base: var("OPENAI_API_BASE").unwrap_or(defaults.openai_api_base),
                anthropic_api_base: var("ANTHROPIC_API_BASE")
                    .unwrap_or(defaults.anthropic_api_base),
                gemini_api_base: var("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base),
                openrouter_api_base: var("OPENROUTER_API_BASE")
                    .unwrap_or(defaults.openrouter_api_base),
                openrouter_referer: var("OPENROUTER_REFERER")
                    .unwrap_or(defaults.openrouter_referer),
                openrouter_title: var("OPENROUTER_TITLE").unwrap_or(defaults.openrouter_title),
            },
            security: SecurityConfig {
                encryption_key,
                caller_header: var("GATEWAY_CALLER_HEADER")
                    .map(|h| h.to_ascii_lowercase())
                    .unwrap_or_else(default_caller_header),
            },
            storage: StorageConfig {
                database_url: var("DATABASE_URL"),
            },
        })
    }
}
