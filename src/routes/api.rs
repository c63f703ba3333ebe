use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, assistant};
use crate::state::AppState;
use std::sync::Arc;

/// Create the search API router
///
/// - `GET /listings`: listings matching the current filters
/// - `GET /filters`, `PATCH /filters`, `DELETE /filters`: read, merge into
///   and reset the shared search filters
/// - `POST /assistant/text`: typed utterance, applies the extracted filters
///   and returns the assistant's reply
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/listings", get(api::list_listings))
        .route(
            "/filters",
            get(api::get_filters)
                .patch(api::update_filters)
                .delete(api::reset_filters),
        )
        .route("/assistant/text", post(assistant::assistant_text))
        .layer(TraceLayer::new_for_http())
}
