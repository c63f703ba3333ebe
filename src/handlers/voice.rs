use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::core::realtime::Citation;
use crate::core::session::SessionStatus;
use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VoiceStatusResponse {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub citations: Vec<Citation>,
}

fn status_response(state: &AppState) -> VoiceStatusResponse {
    let session_id = if state.voice.status().is_live() {
        state.voice.session_id().map(|id| id.to_string())
    } else {
        None
    };
    VoiceStatusResponse {
        status: state.voice.status(),
        session_id,
        citations: state.voice.citations(),
    }
}

/// Start a voice session, replacing any running one.
pub async fn start_voice(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<VoiceStatusResponse>> {
    state.voice.start(state.session_config.clone()).await?;
    Ok(Json(status_response(&state)))
}

/// Stop the voice session. Succeeds when nothing is running.
pub async fn stop_voice(State(state): State<Arc<AppState>>) -> Json<VoiceStatusResponse> {
    state.voice.stop().await;
    Json(status_response(&state))
}

pub async fn voice_status(State(state): State<Arc<AppState>>) -> Json<VoiceStatusResponse> {
    Json(status_response(&state))
}
