pub mod config;
pub mod console;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::HomieConfig;
pub use core::*;
pub use errors::{AppError, AppResult, VoiceError, VoiceResult};
pub use state::AppState;
