//! Merging YAML and environment configurations.

use tracing::warn;

use super::HomieConfig;
use super::env::EnvConfig;
use super::yaml::YamlConfig;
use crate::core::realtime::GeminiVoice;

fn parse_voice(name: &str) -> GeminiVoice {
    let voice = GeminiVoice::from_str_or_default(name);
    if !voice.as_str().eq_ignore_ascii_case(name.trim()) {
        warn!("Unknown voice '{}', using {}", name, voice);
    }
    voice
}

/// Build the final configuration: YAML over environment over defaults.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<HomieConfig, Box<dyn std::error::Error>> {
    let mut env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let gemini = yaml.gemini.unwrap_or_default();
    let assistant = yaml.assistant.unwrap_or_default();
    let listings = yaml.listings.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let mut config = HomieConfig::default();

    if let Some(host) = server.host.or(env.host.take()) {
        config.host = host;
    }
    if let Some(port) = server.port.or(env.port) {
        config.port = port;
    }

    config.gemini_api_key = gemini.api_key.or(env.gemini_api_key.take());
    if let Some(model) = gemini.model.or(env.gemini_model.take()) {
        config.gemini_model = model;
    }
    if let Some(voice) = gemini.voice.or(env.gemini_voice.take()) {
        config.gemini_voice = parse_voice(&voice);
    }
    if let Some(url) = gemini.live_url.or(env.gemini_live_url.take()) {
        config.gemini_live_url = url;
    }
    if let Some(timeout) = gemini.connect_timeout_ms.or(env.connect_timeout_ms) {
        config.connect_timeout_ms = timeout;
    }
    if let Some(search) = gemini.google_search.or(env.gemini_google_search) {
        config.gemini_google_search = search;
    }
    if let Some(model) = gemini.text_model.or(env.gemini_text_model.take()) {
        config.gemini_text_model = model;
    }
    if let Some(url) = gemini.api_url.or(env.gemini_api_url.take()) {
        config.gemini_api_url = url;
    }

    config.persona_path = assistant.persona_path.or(env.persona_path.take());
    config.listings_path = listings.path.or(env.listings_path.take());
    config.cors_allowed_origins = security
        .cors_allowed_origins
        .or(env.cors_allowed_origins.take());

    Ok(config)
}
