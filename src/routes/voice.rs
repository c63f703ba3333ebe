//! Voice session route configuration

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{events, voice};
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice session router
///
/// # Endpoints
///
/// - `POST /voice/start`: open a session on the local microphone and speaker
/// - `POST /voice/stop`: end it (idempotent)
/// - `GET /voice/status`: current status and citations
/// - `GET /voice/events`: WebSocket upgrade for live status, volume, filter
///   and citation events
///
/// # Example
///
/// ```json
/// // Server pushes
/// {"type": "status", "status": {"state": "active"}}
/// {"type": "volume", "level": 0.12}
/// {"type": "filters", "filters": {"city": "Ghent", "maxPrice": 1200.0}, "count": 2}
/// ```
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice/start", post(voice::start_voice))
        .route("/voice/stop", post(voice::stop_voice))
        .route("/voice/status", get(voice::voice_status))
        .route("/voice/events", get(events::voice_events_handler))
        .layer(TraceLayer::new_for_http())
}
