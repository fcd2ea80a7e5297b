//! Provider listing

use crate::state::AppState;
use axum::{extract::State, Json};
use gateway_core::llm::ProviderMetadata;
use serde::{Deserialize, Serialize};

/// GET /v1/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.gateway.registry().metadata(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderMetadata>,
}
