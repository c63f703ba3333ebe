//! Test Fixtures Module
//!
//! Shared fixtures for the Homie voice tests:
//! - Audio fixtures (programmatically generated)
//! - Fake audio devices with a manually driven output clock
//! - A channel-backed realtime connector

// Allow dead code in test fixtures - not every test file uses every helper
#![allow(dead_code)]

pub mod audio_fixtures;
pub mod mock_audio;
pub mod mock_connector;

pub use audio_fixtures::*;
pub use mock_audio::*;
pub use mock_connector::*;
