//! Caller identity extraction
//!
//! Authentication happens upstream of the gateway. The authenticating layer places the
//! caller's opaque identity in a configured header; this extractor only reads it.
//! Whether a request without one is rejected is decided by the handler.

use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use gateway_core::CallerIdentity;
use std::convert::Infallible;

/// Caller identity taken from the configured header, if present and non-blank
#[derive(Debug, Clone)]
pub struct Caller(pub Option<CallerIdentity>);

impl Caller {
    pub fn identity(&self) -> Option<&CallerIdentity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = parts
            .headers
            .get(state.config.security.caller_header.as_str())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| CallerIdentity::new(value.trim()));

        Ok(Caller(identity))
    }
}
