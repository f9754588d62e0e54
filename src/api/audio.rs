//! Audio serving endpoint
//!
//! Serves the published reply audio out of the blob store. Stateless; one
//! store lookup per request.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use super::ApiState;

/// Build the audio router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/audio/{filename}", get(get_audio))
        .with_state(state)
}

/// Serve a stored audio blob by filename
///
/// 200 with an `audio/mpeg` body when present, 404 when absent, 500 with
/// the error text on a retrieval failure.
async fn get_audio(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> Response {
    match state.blobs.find_by_name(&filename) {
        Ok(Some(blob)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/mpeg")],
            blob.data,
        )
            .into_response(),
        Ok(None) => {
            tracing::debug!(filename, "audio blob not found");
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            tracing::error!(filename, error = %e, "audio retrieval failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error occurred: {e}"),
            )
                .into_response()
        }
    }
}
