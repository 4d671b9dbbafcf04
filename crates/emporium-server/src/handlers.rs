//! HTTP endpoints other than the `WebSocket` upgrade.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::state::AppState;

/// Connection and session counts.
///
/// # Route
///
/// `GET /ws/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    let connected = state.hub.connected().await;
    match state.session_count().await {
        Ok(sessions) => Json(json!({
            "status": "ok",
            "connected": connected,
            "sessions": sessions,
            "message_types": state.dispatcher.message_types(),
        }))
        .into_response(),
        Err(err) => {
            error!(error = %err, "status query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string(), "status": 500 })),
            )
                .into_response()
        }
    }
}
