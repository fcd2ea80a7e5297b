//! Gateway Client - consumer side of the provider gateway
//!
//! This crate provides:
//! - [`GatewayClient`] for the gateway's chat endpoint
//! - [`StreamRelay`], which rebuilds a streamed reply from partial network chunks
//! - [`ChatSession`], conversation state that appends one assistant turn per reply

pub mod client;
pub mod relay;
pub mod session;

pub use client::{ClientError, ClientResult, GatewayClient};
pub use relay::{RelayEvent, StreamRelay};
pub use session::ChatSession;
