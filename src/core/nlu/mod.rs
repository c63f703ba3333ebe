//! Text-mode understanding.
//!
//! Typed input is the fallback when voice is unavailable. A single
//! `generateContent` call with a JSON response schema turns the utterance
//! and the current filters into an [`Intent`], a partial filter change and
//! a short reply.

mod client;
mod messages;

pub use client::{GEMINI_API_URL, GEMINI_TEXT_MODEL, GeminiTextClient, NluError};
pub use messages::{Intent, NluResponse, prompt, response_schema};
