//! Property listings and the search contract used by the voice tools.

pub mod filters;
mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use filters::{
    Coordinates, FilterUpdate, PropertyType, SearchFilters, SharedFilters, SortBy,
};
pub use store::InMemoryListings;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors raised by a listing search backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Listing search unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid listing data: {0}")]
    InvalidData(String),
}

/// A property on the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub address: String,
    /// Monthly rent or sale price in euro
    pub price: f64,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub energy_class: Option<String>,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Living area in square metres
    pub size: f64,
    #[serde(default)]
    pub description: String,
    pub bedrooms: u32,
    #[serde(default)]
    pub pets_allowed: bool,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// RFC 3339 creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Distance from the searcher in km, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Backend answering listing searches.
#[async_trait]
pub trait ListingSearch: Send + Sync {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Listing>, SearchError>;
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
