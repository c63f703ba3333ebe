//! Search filters and their merge law.
//!
//! [`SearchFilters`] is the current search; [`FilterUpdate`] is a partial
//! change to it. Merging is last-write-wins per field: a field absent from
//! the update keeps its value, a field set to a value replaces it, and a field
//! explicitly set to `null` clears it.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::broadcast;

/// Capacity of the filter change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Kind of property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Studio,
    Villa,
    Loft,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Studio => "studio",
            Self::Villa => "villa",
            Self::Loft => "loft",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Apartment,
            Self::House,
            Self::Studio,
            Self::Villa,
            Self::Loft,
        ]
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown property type '{s}'"))
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortBy {
    #[serde(rename = "price_asc")]
    PriceAsc,
    #[serde(rename = "price_desc")]
    PriceDesc,
    /// Largest first
    #[serde(rename = "size")]
    Size,
    /// Closest to the user location first
    #[serde(rename = "distance")]
    Distance,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Size => "size",
            Self::Distance => "distance",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::PriceAsc, Self::PriceDesc, Self::Size, Self::Distance]
    }
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown sort order '{s}'"))
    }
}

/// Deserialize a unit enum through its case-insensitive `FromStr`.
fn parse_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr<Err = String>,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl<'de> Deserialize<'de> for PropertyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        parse_str(deserializer)
    }
}

impl<'de> Deserialize<'de> for SortBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        parse_str(deserializer)
    }
}

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Current search criteria. Every field is optional; `None` means
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pets_allowed: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_location: Option<Coordinates>,
}

/// Deserialize a field so that absent stays `None`, `null` becomes
/// `Some(None)` and a value becomes `Some(Some(v))`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Bedroom counts arrive as JSON numbers which may carry a fraction part.
fn double_option_count<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    match value {
        None => Ok(Some(None)),
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => {
            Ok(Some(Some(n as u32)))
        }
        Some(n) => Err(serde::de::Error::custom(format!(
            "bedrooms must be a non-negative whole number, got {n}"
        ))),
    }
}

/// Partial change to [`SearchFilters`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_size: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option_count")]
    pub bedrooms: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub pets_allowed: Option<Option<bool>>,
    #[serde(rename = "type", default, deserialize_with = "double_option")]
    pub property_type: Option<Option<PropertyType>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sort_by: Option<Option<SortBy>>,
    #[serde(default, deserialize_with = "double_option")]
    pub user_location: Option<Option<Coordinates>>,
}

impl FilterUpdate {
    /// Parse tool-call arguments. An absent/empty argument object is an
    /// empty update.
    pub fn from_args(args: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if args.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(args)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn merge_field<T>(current: &mut Option<T>, update: Option<Option<T>>) {
    if let Some(value) = update {
        *current = value;
    }
}

impl SearchFilters {
    /// Apply `update`, last write wins per field.
    pub fn apply(&mut self, update: FilterUpdate) {
        merge_field(&mut self.city, update.city.map(normalize_city));
        merge_field(&mut self.min_price, update.min_price);
        merge_field(&mut self.max_price, update.max_price);
        merge_field(&mut self.min_size, update.min_size);
        merge_field(&mut self.bedrooms, update.bedrooms);
        merge_field(&mut self.pets_allowed, update.pets_allowed);
        merge_field(&mut self.property_type, update.property_type);
        merge_field(&mut self.sort_by, update.sort_by);
        merge_field(&mut self.user_location, update.user_location);
    }

    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }
}

/// Blank city names mean "anywhere".
fn normalize_city(city: Option<String>) -> Option<String> {
    city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Filters shared between the voice session and direct UI edits.
///
/// Every change is published to subscribers so views can re-run their
/// search.
#[derive(Debug, Clone)]
pub struct SharedFilters {
    inner: Arc<RwLock<SearchFilters>>,
    changes: broadcast::Sender<SearchFilters>,
}

impl Default for SharedFilters {
    fn default() -> Self {
        Self::new(SearchFilters::default())
    }
}

impl SharedFilters {
    pub fn new(initial: SearchFilters) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(initial)),
            changes,
        }
    }

    /// Current filters.
    pub fn snapshot(&self) -> SearchFilters {
        self.inner.read().clone()
    }

    /// Merge `update` and return the resulting filters.
    pub fn update(&self, update: FilterUpdate) -> SearchFilters {
        let next = {
            let mut guard = self.inner.write();
            guard.apply(update);
            guard.clone()
        };
        let _ = self.changes.send(next.clone());
        next
    }

    /// Replace the filters wholesale.
    pub fn replace(&self, filters: SearchFilters) -> SearchFilters {
        *self.inner.write() = filters.clone();
        let _ = self.changes.send(filters.clone());
        filters
    }

    /// Subscribe to filter changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SearchFilters> {
        self.changes.subscribe()
    }
}
