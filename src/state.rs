use std::sync::Arc;

use tracing::info;

use crate::config::HomieConfig;
use crate::core::audio::{AudioBackend, default_backend};
use crate::core::listings::{InMemoryListings, ListingSearch, SharedFilters};
use crate::core::nlu::GeminiTextClient;
use crate::core::realtime::{GeminiLiveConnector, RealtimeConnector};
use crate::core::session::{SessionConfig, SessionController};
use crate::core::tools::ToolDispatcher;

/// Shared application state for the HTTP handlers.
pub struct AppState {
    pub config: HomieConfig,
    pub filters: SharedFilters,
    pub listings: Arc<dyn ListingSearch>,
    pub voice: SessionController,
    pub session_config: SessionConfig,
    /// Typed-input assistant, `None` without an API key
    pub assistant: Option<GeminiTextClient>,
}

impl AppState {
    /// Build the state from configuration: listing catalogue, Gemini
    /// connector (when a key is configured) and the local audio backend.
    pub fn new(config: HomieConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let listings: Arc<dyn ListingSearch> = match &config.listings_path {
            Some(path) => Arc::new(InMemoryListings::from_file(path)?),
            None => {
                let store = InMemoryListings::seeded()?;
                info!("Using bundled catalogue with {} listings", store.len());
                Arc::new(store)
            }
        };

        let connector = gemini_connector(&config)?;
        if connector.is_none() {
            info!("GEMINI_API_KEY not configured, voice sessions will be refused");
        }

        Self::with_parts(config, listings, connector, default_backend())
    }

    /// Assemble the state from explicit collaborators.
    pub fn with_parts(
        config: HomieConfig,
        listings: Arc<dyn ListingSearch>,
        connector: Option<Arc<dyn RealtimeConnector>>,
        audio: Arc<dyn AudioBackend>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let session_config = config.session_config()?;
        let assistant = gemini_text_client(&config)?;
        let filters = SharedFilters::default();
        let dispatcher = ToolDispatcher::new(filters.clone(), listings.clone());
        let voice = SessionController::new(connector, audio, dispatcher);

        Ok(Arc::new(Self {
            config,
            filters,
            listings,
            voice,
            session_config,
            assistant,
        }))
    }
}

/// Connector for the configured endpoint, or `None` without an API key.
pub fn gemini_connector(
    config: &HomieConfig,
) -> Result<Option<Arc<dyn RealtimeConnector>>, Box<dyn std::error::Error>> {
    let Some(key) = config.gemini_api_key.as_deref().filter(|_| config.has_api_key()) else {
        return Ok(None);
    };

    let connector = GeminiLiveConnector::new(key)?
        .with_base_url(config.gemini_live_url.clone())
        .with_connect_timeout(config.connect_timeout());
    Ok(Some(Arc::new(connector)))
}

/// Text client for the configured REST endpoint, or `None` without an API key.
pub fn gemini_text_client(
    config: &HomieConfig,
) -> Result<Option<GeminiTextClient>, Box<dyn std::error::Error>> {
    let Some(key) = config.gemini_api_key.as_deref().filter(|_| config.has_api_key()) else {
        return Ok(None);
    };

    let client = GeminiTextClient::new(key)?
        .with_base_url(config.gemini_api_url.clone())
        .with_model(config.gemini_text_model.clone());
    Ok(Some(client))
}
