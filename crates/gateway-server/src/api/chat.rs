//! Chat API

use crate::gateway::{ChatPayload, GatewayReply};
use crate::middleware::Caller;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use gateway_core::error::GatewayError;
use gateway_core::llm::ProviderId;
use gateway_core::tokens::estimate_tokens;
use gateway_llm::DeltaStream;
use std::convert::Infallible;
use std::time::Instant;
use tracing::{error, info, warn};

/// Sentinel payload closing a successful stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// POST /v1/chat
pub async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|rejection| match caller.identity() {
        None => GatewayError::Unauthorized,
        Some(_) => GatewayError::BadRequest(rejection.body_text()),
    })?;

    match state.gateway.handle(caller.identity(), payload).await? {
        GatewayReply::Complete(response) => Ok(Json(response).into_response()),
        GatewayReply::Stream {
            provider,
            model,
            stream,
        } => Ok(Sse::new(relay_events(provider, model, stream)).into_response()),
    }
}

/// Re-frame upstream deltas as gateway SSE events.
///
/// Emits one `data: <delta>` event per delta and `data: [DONE]` after the last. A failure
/// after streaming began ends with a single `data: {"error": ...}` event and no sentinel.
/// The upstream is pulled only as fast as the client reads, and dropping the response
/// body drops the upstream stream with it.
pub fn relay_events(
    provider: ProviderId,
    model: String,
    mut upstream: DeltaStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let started = Instant::now();
        let mut text = String::new();
        let mut deltas = 0usize;
        let mut completed = false;

        loop {
            match upstream.next_delta().await {
                None => {
                    completed = true;
                    break;
                }
                Some(Ok(delta)) => {
                    deltas += 1;
                    text.push_str(&delta.delta);
                    match Event::default().json_data(&delta) {
                        Ok(event) => yield Ok(event),
                        Err(e) => {
                            error!(error = %e, "Failed to encode stream delta");
                            yield Ok(error_event("Internal Server Error"));
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    let err = GatewayError::from(e);
                    error!(provider = %provider, error = %err, "Upstream stream failed");
                    yield Ok(error_event(ApiError::from(err).message()));
                    break;
                }
            }
        }

        if completed {
            yield Ok(Event::default().data(DONE_SENTINEL));
        }

        info!(
            provider = %provider,
            model = %model,
            deltas,
            completed,
            estimated_completion_tokens = estimate_tokens(&text),
            duration_ms = started.elapsed().as_millis() as u64,
            "Stream finished"
        );
    }
}

fn error_event(message: &str) -> Event {
    Event::default().data(serde_json::json!({ "error": message }).to_string())
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotConfigured,
    BadGateway,
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotConfigured | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message shown to the caller. Details stay in the server log.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized => "Unauthorized",
            ApiError::NotConfigured => "API key not configured",
            ApiError::BadGateway => "Upstream provider error",
            ApiError::Internal => "Internal Server Error",
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::BadRequest(msg) => ApiError::BadRequest(msg),
            GatewayError::UnsupportedProvider(id) => {
                ApiError::BadRequest(format!("Unsupported provider: {id}"))
            }
            GatewayError::Unauthorized => ApiError::Unauthorized,
            GatewayError::NotConfigured(provider) => {
                warn!(provider = %provider, "No credential configured");
                ApiError::NotConfigured
            }
            err @ (GatewayError::Upstream { .. } | GatewayError::NoResponseBody) => {
                error!(error = %err, "Upstream call failed");
                ApiError::BadGateway
            }
            err => {
                error!(error = %err, "Request failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}
