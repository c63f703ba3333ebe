//! Realtime voice-model connections.
//!
//! - `base`: provider-neutral messages, connection handle and the
//!   [`RealtimeConnector`] trait
//! - [`gemini`]: Gemini Live implementation

mod base;
pub mod gemini;

pub use base::{
    AudioChunk, Citation, ClientMessage, FunctionDeclaration, RealtimeConnection,
    RealtimeConnector, RealtimeError, RealtimeResult, ServerMessage, SessionSetup, ToolCall,
    ToolResponse, TransportEvent,
};
pub use gemini::{
    DEFAULT_CONNECT_TIMEOUT, GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiLiveConnector,
    GeminiVoice,
};
