//! Configuration validation logic.

use url::Url;

use super::HomieConfig;

pub(super) fn validate(config: &HomieConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.gemini_model.trim().is_empty() {
        return Err("gemini model must not be empty".into());
    }

    if config.connect_timeout_ms == 0 {
        return Err("connect_timeout_ms must be greater than zero".into());
    }

    let url = Url::parse(&config.gemini_live_url)
        .map_err(|e| format!("Invalid Gemini Live URL '{}': {e}", config.gemini_live_url))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(format!(
            "Gemini Live URL must use ws:// or wss://, got '{}'",
            url.scheme()
        )
        .into());
    }

    if config.gemini_text_model.trim().is_empty() {
        return Err("gemini text model must not be empty".into());
    }

    let api = Url::parse(&config.gemini_api_url)
        .map_err(|e| format!("Invalid Gemini API URL '{}': {e}", config.gemini_api_url))?;
    if !matches!(api.scheme(), "http" | "https") {
        return Err(format!(
            "Gemini API URL must use http:// or https://, got '{}'",
            api.scheme()
        )
        .into());
    }

    if let Some(path) = &config.persona_path {
        if !path.is_file() {
            return Err(format!("Persona file not found: {}", path.display()).into());
        }
    }

    Ok(())
}
