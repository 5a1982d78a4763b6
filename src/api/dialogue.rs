//! Dialogue control endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use crate::dialogue::DialogueStatus;

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub voice_enabled: bool,
    #[serde(flatten)]
    pub dialogue: DialogueStatus,
}

/// Acknowledgement for queued commands
#[derive(Serialize)]
pub struct CommandResponse {
    pub queued: &'static str,
}

/// Error body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type CommandResult = Result<(StatusCode, Json<CommandResponse>), (StatusCode, Json<ErrorResponse>)>;

/// Build dialogue router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/mute", post(toggle_mute))
        .route("/deactivate", post(deactivate))
        .with_state(state)
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        voice_enabled: state.voice_enabled,
        dialogue: state.handle.status(),
    })
}

async fn toggle_mute(State(state): State<Arc<ApiState>>) -> CommandResult {
    queued(state.handle.toggle_mute(), "mute_toggled")
}

async fn deactivate(State(state): State<Arc<ApiState>>) -> CommandResult {
    queued(state.handle.deactivate(), "deactivate")
}

fn queued(delivered: bool, command: &'static str) -> CommandResult {
    if delivered {
        tracing::debug!(command, "command queued");
        Ok((StatusCode::ACCEPTED, Json(CommandResponse { queued: command })))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "dialogue session is not running".to_string(),
            }),
        ))
    }
}
