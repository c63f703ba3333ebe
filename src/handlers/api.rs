use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::core::listings::{FilterUpdate, Listing, SearchFilters};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub filters: SearchFilters,
    pub count: usize,
    pub listings: Vec<Listing>,
}

/// Listings matching the current filters.
pub async fn list_listings(State(state): State<Arc<AppState>>) -> AppResult<Json<ListingsResponse>> {
    let filters = state.filters.snapshot();
    let listings = state.listings.search(&filters).await?;
    Ok(Json(ListingsResponse {
        filters,
        count: listings.len(),
        listings,
    }))
}

pub async fn get_filters(State(state): State<Arc<AppState>>) -> Json<SearchFilters> {
    Json(state.filters.snapshot())
}

/// Merge a partial filter change from the UI.
///
/// Same merge law as the voice tool: absent fields are kept, `null` clears.
pub async fn update_filters(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> AppResult<Json<SearchFilters>> {
    let update = FilterUpdate::from_args(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid filters: {e}")))?;
    tracing::debug!(?update, "Filters changed from the UI");
    Ok(Json(state.filters.update(update)))
}

/// Clear every filter.
pub async fn reset_filters(State(state): State<Arc<AppState>>) -> Json<SearchFilters> {
    Json(state.filters.replace(SearchFilters::default()))
}
