//! Axum Handlers for the Control API
//!
//! `start` and `stop` are the session's command channel; `status` reports a
//! snapshot. They use `utoipa` doc comments to generate OpenAPI documentation.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use crate::{
    models::{CommandResponse, StatusResponse},
    state::AppState,
};

/// Re-arm the session: release the followed person and wait in `idle`.
///
/// `ok` is `false` when perception did not release its target; the session
/// then keeps its previous state and the caller should retry.
#[utoipa::path(
    post,
    path = "/start",
    responses(
        (status = 200, description = "Outcome of the re-arm request", body = CommandResponse)
    )
)]
pub async fn start_session(State(state): State<Arc<AppState>>) -> Json<CommandResponse> {
    Json(CommandResponse::from(state.manager.start().await))
}

/// Stop the session. The session is stopped locally even when perception
/// does not acknowledge, in which case `ok` is `false`.
#[utoipa::path(
    post,
    path = "/stop",
    responses(
        (status = 200, description = "Session stopped", body = CommandResponse)
    )
)]
pub async fn stop_session(State(state): State<Arc<AppState>>) -> Json<CommandResponse> {
    Json(CommandResponse::from(state.manager.stop().await))
}

/// Current state of the session and the latest completed attempt.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Session snapshot", body = StatusResponse)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.manager.snapshot().await;
    (StatusCode::OK, Json(StatusResponse::from(snapshot)))
}
