//! Mock Provider Servers
//!
//! Local stand-ins for the realtime provider so the connector can be driven
//! over a real WebSocket without network access:
//! - Gemini Live (`BidiGenerateContent` over WebSocket)

// Allow dead code in test infrastructure - not every test uses every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

pub mod gemini_live_mock;

pub use gemini_live_mock::{GeminiLiveMock, MockLiveSession, SetupBehavior};

/// Connection statistics for a mock server
#[derive(Debug, Default)]
pub struct MockStats {
    pub connections: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_sent: AtomicU64,
}

impl MockStats {
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Connections: {}, Received: {}, Sent: {}",
            self.connections(),
            self.frames_received.load(Ordering::Relaxed),
            self.frames_sent.load(Ordering::Relaxed),
        )
    }
}
