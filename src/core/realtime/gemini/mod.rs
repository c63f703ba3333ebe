//! Gemini Live provider.
//!
//! Bidirectional native-audio sessions over WebSocket with function calling.
//!
//! # Example
//!
//! ```rust,ignore
//! use homie_voice::core::realtime::{GeminiLiveConnector, RealtimeConnector, SessionSetup};
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = GeminiLiveConnector::new(std::env::var("GEMINI_API_KEY").unwrap()).unwrap();
//!     let setup = SessionSetup {
//!         model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
//!         voice: Some("Orus".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let mut connection = connector.connect(&setup).await.unwrap();
//!     while let Some(event) = connection.incoming.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::{DEFAULT_CONNECT_TIMEOUT, GeminiLiveConnector};
pub use config::{GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiVoice, live_url, model_path};
pub use messages::{LiveClientMessage, LiveServerMessage};
