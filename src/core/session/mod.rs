//! Voice session lifecycle.
//!
//! [`SessionController`] owns the single realtime session: it opens the
//! audio devices and the model connection, pumps microphone frames out,
//! routes incoming tool calls, speech and interruptions, and tears it all
//! down again on stop, remote close or transport failure.

mod controller;
mod runner;

use serde::{Deserialize, Serialize};

use crate::core::realtime::{GEMINI_DEFAULT_MODEL, GeminiVoice};

pub use controller::SessionController;

/// Lifecycle state of the voice session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Microphone is streaming to the model
    Active,
    /// The model closed the session
    Ended,
    /// Start failed or the connection broke; carries a short status line
    Error(String),
}

impl SessionStatus {
    /// True while a session holds devices or a connection.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionStatus::Connecting | SessionStatus::Connected | SessionStatus::Active
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Connecting => write!(f, "Connecting"),
            SessionStatus::Connected => write!(f, "Connected"),
            SessionStatus::Active => write!(f, "Active"),
            SessionStatus::Ended => write!(f, "Ended"),
            SessionStatus::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Per-session settings sent with the setup message.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub voice: GeminiVoice,
    /// System instruction describing the assistant
    pub persona: Option<String>,
    /// Offer the model web search grounding
    pub google_search: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: GEMINI_DEFAULT_MODEL.to_string(),
            voice: GeminiVoice::default(),
            persona: None,
            google_search: true,
        }
    }
}
