//! HTTP surface: turn submission and session lookup.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::pipeline::{TurnDecision, TurnProcessor, TurnRequest};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<TurnProcessor>,
}

/// Build the Axum router.
pub fn routes(processor: Arc<TurnProcessor>) -> Router {
    let state = AppState { processor };

    Router::new()
        .route("/health", get(health))
        .route("/api/turn", post(process_turn))
        .route("/api/sessions/{id}", get(get_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scam-honeypot"
    }))
}

// ── Turns ───────────────────────────────────────────────────────────────

async fn process_turn(State(state): State<AppState>, Json(request): Json<TurnRequest>) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("turn", %request_id, session_id = %request.session_id);

    // Detached: a dropped connection must not cancel a turn mid-write.
    let processor = Arc::clone(&state.processor);
    let handle = tokio::spawn(
        async move {
            processor
                .process_turn(&request.session_id, &request.message, &request.history)
                .await
        }
        .instrument(span),
    );

    match handle.await {
        Ok(Ok(decision)) => (StatusCode::OK, Json(decision)).into_response(),
        Ok(Err(e)) => engine_error_response(e),
        Err(e) => {
            warn!(%request_id, error = %e, "Turn task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Turn processing failed")
        }
    }
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.processor.store().get(&id).await {
        Ok(Some(session)) => {
            let threshold = state.processor.config().scam_threshold;
            (
                StatusCode::OK,
                Json(TurnDecision::from_session(&session, threshold, None)),
            )
                .into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Err(e) => {
            warn!(session_id = %id, error = %e, "Session lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Session store unavailable")
        }
    }
}

fn engine_error_response(error: EngineError) -> Response {
    match error {
        EngineError::StoreConflict { .. } => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, &error.to_string())
        }
        EngineError::InvalidRequest(ref reason) => error_response(StatusCode::BAD_REQUEST, reason),
        EngineError::Store(ref e) => {
            warn!(error = %e, "Session store failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Session store unavailable")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
