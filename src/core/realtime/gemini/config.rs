//! Gemini Live API configuration types.
//!
//! Endpoint, model path and the prebuilt voice catalogue.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Gemini Live bidirectional WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Native-audio model used when none is configured.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Build the authenticated endpoint URL.
pub fn live_url(base: &str, api_key: &str) -> RealtimeResult<Url> {
    if api_key.trim().is_empty() {
        return Err(RealtimeError::InvalidConfiguration(
            "API key is empty".to_string(),
        ));
    }
    Url::parse_with_params(base, &[("key", api_key)])
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid endpoint URL: {e}")))
}

/// Model path as the setup message expects it (`models/<id>`).
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Prebuilt Gemini voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiVoice {
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
    /// Default voice of the assistant persona
    #[default]
    Orus,
    Zephyr,
    Leda,
}

impl GeminiVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
            Self::Orus => "Orus",
            Self::Zephyr => "Zephyr",
            Self::Leda => "Leda",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or_default()
    }

    /// Get all available voices.
    pub fn all() -> &'static [Self] {
        &[
            Self::Puck,
            Self::Charon,
            Self::Kore,
            Self::Fenrir,
            Self::Aoede,
            Self::Orus,
            Self::Zephyr,
            Self::Leda,
        ]
    }
}

impl std::fmt::Display for GeminiVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_url_carries_key() {
        let url = live_url(GEMINI_LIVE_URL, "abc123").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("generativelanguage.googleapis.com"));
        assert!(url.query_pairs().any(|(k, v)| k == "key" && v == "abc123"));
    }

    #[test]
    fn test_live_url_rejects_empty_key() {
        let result = live_url(GEMINI_LIVE_URL, "  ");
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_model_path() {
        assert_eq!(model_path("gemini-x"), "models/gemini-x");
        assert_eq!(model_path("models/gemini-x"), "models/gemini-x");
    }

    #[test]
    fn test_voice_parsing() {
        assert_eq!(GeminiVoice::from_str_or_default("kore"), GeminiVoice::Kore);
        assert_eq!(GeminiVoice::from_str_or_default("Orus"), GeminiVoice::Orus);
        assert_eq!(
            GeminiVoice::from_str_or_default("unknown"),
            GeminiVoice::Orus
        );
        assert_eq!(GeminiVoice::all().len(), 8);
        assert_eq!(GeminiVoice::Leda.to_string(), "Leda");
    }
}
