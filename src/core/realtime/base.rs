//! Base traits and types for realtime voice-model connections.
//!
//! A connection is a pair of channels owned by a background transport task:
//! the session pushes [`ClientMessage`]s into `outgoing` and reads
//! [`TransportEvent`]s from `incoming`. Wire formats stay inside the
//! provider module; everything here is provider-neutral.
//!
//! # Audio Format
//!
//! Input audio is PCM 16-bit signed little-endian at 16kHz, output audio is
//! the same encoding at 24kHz. Both travel as base64 text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Session Setup
// =============================================================================

/// Function exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Everything sent when a session is opened.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSetup {
    /// Model identifier
    pub model: String,
    /// Prebuilt output voice
    pub voice: Option<String>,
    /// Persona / system instruction
    pub system_instruction: Option<String>,
    /// Functions the model may call
    pub tools: Vec<FunctionDeclaration>,
    /// Let the model ground answers in web search results
    pub google_search: bool,
}

// =============================================================================
// Messages
// =============================================================================

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id echoed back in the response
    pub id: String,
    /// Function name
    pub name: String,
    /// Arguments object (empty object when absent)
    pub args: serde_json::Value,
}

/// Result of one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

/// Inline audio carried by a server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub mime_type: Option<String>,
    /// Base64 PCM16 payload
    pub data: String,
}

/// Web source the model grounded an answer on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// One server message, normalized.
///
/// A single message may carry any combination of these parts; the session
/// handles each one independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMessage {
    pub setup_complete: bool,
    pub tool_calls: Vec<ToolCall>,
    pub cancelled_tool_calls: Vec<String>,
    pub audio: Vec<AudioChunk>,
    pub text: Vec<String>,
    pub citations: Vec<Citation>,
    pub interrupted: bool,
    pub turn_complete: bool,
    /// Time left before the server closes the connection
    pub go_away: Option<String>,
}

impl ServerMessage {
    /// True when the message carries nothing the session acts on.
    pub fn is_empty(&self) -> bool {
        !self.setup_complete
            && self.tool_calls.is_empty()
            && self.cancelled_tool_calls.is_empty()
            && self.audio.is_empty()
            && self.text.is_empty()
            && self.citations.is_empty()
            && !self.interrupted
            && !self.turn_complete
            && self.go_away.is_none()
    }
}

/// Message from the session to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// One encoded microphone frame
    Audio { mime_type: String, data: String },
    /// All responses for the tool calls of one server message
    ToolResponses(Vec<ToolResponse>),
    /// Close the connection gracefully
    Close,
}

/// Event delivered by the transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(ServerMessage),
    /// Remote side closed the connection
    Closed { reason: Option<String> },
    /// Connection broke
    Failed(RealtimeError),
}

// =============================================================================
// Connection
// =============================================================================

/// Grace period for the transport task to flush a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Open connection to a realtime model.
#[derive(Debug)]
pub struct RealtimeConnection {
    /// Messages towards the model
    pub outgoing: mpsc::Sender<ClientMessage>,
    /// Events from the model
    pub incoming: mpsc::Receiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeConnection {
    pub fn new(
        outgoing: mpsc::Sender<ClientMessage>,
        incoming: mpsc::Receiver<TransportEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outgoing,
            incoming,
            task,
        }
    }

    /// Close the connection and wait briefly for the transport to finish.
    pub async fn close(mut self) {
        let _ = self.outgoing.try_send(ClientMessage::Close);
        self.incoming.close();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(CLOSE_GRACE, &mut task).await {
                Ok(_) => debug!("Realtime transport task finished"),
                Err(_) => {
                    warn!("Realtime transport did not close in time, aborting");
                    task.abort();
                }
            }
        }
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// =============================================================================
// Connector Trait
// =============================================================================

/// Opens realtime connections.
///
/// `connect` resolves once the provider acknowledged the setup, so a returned
/// connection is ready to carry audio.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, setup: &SessionSetup) -> RealtimeResult<RealtimeConnection>;
}
