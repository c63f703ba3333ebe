use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::listings::{FilterUpdate, SearchFilters};
use crate::core::nlu::{Intent, NluError};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TextReply {
    pub intent: Intent,
    pub reply: String,
    pub filters: SearchFilters,
    pub count: usize,
}

/// Typed fallback for the voice session.
///
/// The extracted filters go through the same merge as the voice tool, so
/// the UI and any live session see the change. Filters the model got wrong
/// are logged and left alone; the reply is still returned.
pub async fn assistant_text(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TextRequest>,
) -> AppResult<Json<TextReply>> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }
    let assistant = state.assistant.as_ref().ok_or(NluError::MissingApiKey)?;

    let current = state.filters.snapshot();
    let parsed = assistant.parse_utterance(text, &current).await?;
    debug!(intent = ?parsed.intent, "Text utterance understood");

    let update = parsed.filter_update().unwrap_or_else(|e| {
        warn!("Ignoring filters from the text model: {}", e);
        FilterUpdate::default()
    });
    let filters = if update.is_empty() {
        current
    } else {
        state.filters.update(update)
    };
    let count = state.listings.search(&filters).await?.len();

    Ok(Json(TextReply {
        intent: parsed.intent,
        reply: parsed.assistant_reply,
        filters,
        count,
    }))
}
