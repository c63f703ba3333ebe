//! In-memory listing catalogue.

use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::filters::{SearchFilters, SortBy};
use super::{Listing, ListingSearch, SearchError, haversine_km};

/// Listings bundled with the binary.
const SEED_LISTINGS: &str = include_str!("../../../data/listings.json");

/// Listing search over a fixed set of listings held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryListings {
    listings: Vec<Listing>,
}

impl InMemoryListings {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    /// The bundled Belgian sample catalogue.
    pub fn seeded() -> Result<Self, SearchError> {
        Self::from_json(SEED_LISTINGS)
    }

    /// Parse a JSON array of listings.
    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        let listings: Vec<Listing> =
            serde_json::from_str(json).map_err(|e| SearchError::InvalidData(e.to_string()))?;
        Ok(Self::new(listings))
    }

    /// Load a JSON array of listings from `path`.
    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Unavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let store = Self::from_json(&contents)?;
        info!(
            "Loaded {} listings from {}",
            store.listings.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Filter and order listings for `filters`.
    pub fn query(&self, filters: &SearchFilters) -> Vec<Listing> {
        let city = filters.city.as_ref().map(|c| c.to_lowercase());

        let mut results: Vec<Listing> = self
            .listings
            .iter()
            .filter(|l| {
                city.as_ref()
                    .is_none_or(|c| l.address.to_lowercase().contains(c.as_str()))
            })
            .filter(|l| filters.min_price.is_none_or(|min| l.price >= min))
            .filter(|l| filters.max_price.is_none_or(|max| l.price <= max))
            .filter(|l| filters.min_size.is_none_or(|min| l.size >= min))
            .filter(|l| filters.bedrooms.is_none_or(|min| l.bedrooms >= min))
            // only an explicit "pets allowed" narrows the search
            .filter(|l| filters.pets_allowed != Some(true) || l.pets_allowed)
            .filter(|l| {
                filters
                    .property_type
                    .is_none_or(|t| l.property_type == t)
            })
            .cloned()
            .map(|mut listing| {
                listing.distance = match (filters.user_location, listing.coordinates) {
                    (Some(from), Some(to)) => Some(haversine_km(from, to)),
                    _ => None,
                };
                listing
            })
            .collect();

        match filters.sort_by {
            Some(SortBy::PriceAsc) => {
                results.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal))
            }
            Some(SortBy::PriceDesc) => {
                results.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal))
            }
            Some(SortBy::Size) => {
                results.sort_by(|a, b| b.size.partial_cmp(&a.size).unwrap_or(Ordering::Equal))
            }
            Some(SortBy::Distance) => results.sort_by(|a, b| match (a.distance, b.distance) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
            // newest first
            None => results.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        debug!(matches = results.len(), "Listing query evaluated");
        results
    }
}

#[async_trait]
impl ListingSearch for InMemoryListings {
    async fn search(&self, filters: &SearchFilters) -> Result<Vec<Listing>, SearchError> {
        Ok(self.query(filters))
    }
}
