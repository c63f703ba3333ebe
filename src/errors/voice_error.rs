//! Failures of the voice session as seen by its caller.
//!
//! Each variant maps to a short status string through
//! [`VoiceError::user_message`]; raw provider payloads never reach the user.

use thiserror::Error;

use crate::core::audio::{CaptureError, DecodeError, PlaybackError};
use crate::core::realtime::RealtimeError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VoiceError {
    /// No API key configured
    #[error("Missing API key")]
    MissingApiKey,

    /// Any other unusable session configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Microphone access was refused
    #[error("Microphone permission denied")]
    Permission,

    /// Audio input or output could not be opened
    #[error("Audio device error: {0}")]
    Device(String),

    /// The connection could not be established
    #[error("Connect failed: {0}")]
    Connect(RealtimeError),

    /// An established connection broke
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A single incoming audio payload was malformed
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A stop or a newer start superseded the session before it was running
    #[error("Session start cancelled")]
    Cancelled,
}

impl VoiceError {
    /// Short status line for the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            VoiceError::MissingApiKey => "Missing API key",
            VoiceError::Config(_) => "Voice assistant is not configured",
            VoiceError::Permission => "Microphone access denied",
            VoiceError::Device(_) => "Audio device unavailable",
            VoiceError::Connect(_) => "Could not connect",
            VoiceError::ConnectionLost(_) => "Connection lost",
            VoiceError::Decode(_) => "Could not play a response",
            VoiceError::Cancelled => "Voice session cancelled",
        }
    }
}

impl From<CaptureError> for VoiceError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied => VoiceError::Permission,
            other => VoiceError::Device(other.to_string()),
        }
    }
}

impl From<PlaybackError> for VoiceError {
    fn from(err: PlaybackError) -> Self {
        VoiceError::Device(err.to_string())
    }
}

impl From<RealtimeError> for VoiceError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::InvalidConfiguration(msg) => VoiceError::Config(msg),
            other => VoiceError::Connect(other),
        }
    }
}

pub type VoiceResult<T> = Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_errors_map_to_taxonomy() {
        assert_eq!(
            VoiceError::from(CaptureError::PermissionDenied),
            VoiceError::Permission
        );
        assert!(matches!(
            VoiceError::from(CaptureError::NoInputDevice),
            VoiceError::Device(_)
        ));
    }

    #[test]
    fn test_user_messages_are_short() {
        let errors = [
            VoiceError::MissingApiKey,
            VoiceError::Permission,
            VoiceError::Connect(RealtimeError::Timeout("15000ms".to_string())),
            VoiceError::ConnectionLost("socket reset by peer".to_string()),
        ];
        for err in errors {
            assert!(err.user_message().len() < 40);
            assert!(!err.user_message().contains("socket"));
        }
        assert_eq!(
            VoiceError::Connect(RealtimeError::WebSocketError("reset".to_string())).user_message(),
            "Could not connect"
        );
    }

    #[test]
    fn test_decode_error_message() {
        let err = VoiceError::from(DecodeError::OddByteLength(3));
        assert_eq!(err.user_message(), "Could not play a response");
    }

    #[test]
    fn test_invalid_configuration_is_config_error() {
        let err = VoiceError::from(RealtimeError::InvalidConfiguration("no key".to_string()));
        assert!(matches!(err, VoiceError::Config(_)));
    }
}
