pub mod audio;
pub mod listings;
pub mod nlu;
pub mod realtime;
pub mod session;
pub mod tools;

pub use audio::{AudioBackend, EncodedFrame, PlaybackScheduler, UnavailableAudio};
pub use listings::{InMemoryListings, Listing, ListingSearch, SearchFilters, SharedFilters};
pub use nlu::{GeminiTextClient, Intent, NluError};
pub use realtime::{GeminiLiveConnector, RealtimeConnector, RealtimeError, RealtimeResult};
pub use session::{SessionConfig, SessionController, SessionStatus};
pub use tools::ToolDispatcher;
