//! API routes

pub mod chat;
pub mod health;
pub mod providers;

use crate::middleware::logging_middleware;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat", post(chat::chat))
        .route("/v1/providers", get(providers::list_providers))
        .route("/health", get(health::health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
