//! Session status and control endpoints for the web UI

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use super::ApiState;
use crate::session::{SessionCommand, SessionSnapshot};

/// Build the session router (nested under `/api/session`)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(get_session))
        .route("/toggle", post(toggle))
        .with_state(state)
}

/// Current session snapshot for the UI poll
async fn get_session(State(state): State<Arc<ApiState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// Flip the listening toggle
///
/// 202 once the command is queued; 503 when no session loop is running
/// (voice disabled).
async fn toggle(State(state): State<Arc<ApiState>>) -> StatusCode {
    match state.commands.send(SessionCommand::Toggle).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::warn!(error = %e, "session loop unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
