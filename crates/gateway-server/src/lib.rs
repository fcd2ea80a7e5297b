//! Gateway Server - HTTP surface of the provider gateway
//!
//! This crate provides:
//! - The provider-agnostic chat endpoint, streaming and non-streaming
//! - Provider listing and health endpoints
//! - Caller identity extraction and request logging middleware

pub mod api;
pub mod gateway;
pub mod middleware;
pub mod state;

pub use api::create_router;
pub use gateway::{ChatPayload, Gateway, GatewayReply};
pub use state::AppState;
