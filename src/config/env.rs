//! Environment variable loading.

use std::env;
use std::path::PathBuf;

/// Raw values read from the environment. `None` means unset or empty.
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_voice: Option<String>,
    pub gemini_live_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub gemini_google_search: Option<bool>,
    pub gemini_text_model: Option<String>,
    pub gemini_api_url: Option<String>,
    pub persona_path: Option<PathBuf>,
    pub listings_path: Option<PathBuf>,
    pub cors_allowed_origins: Option<String>,
}

impl Drop for EnvConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("Invalid {name} value '{raw}'")),
        None => Ok(None),
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self, String> {
        Ok(Self {
            host: var("HOST"),
            port: parse_var("PORT")?,
            gemini_api_key: var("GEMINI_API_KEY").or_else(|| var("API_KEY")),
            gemini_model: var("GEMINI_MODEL"),
            gemini_voice: var("GEMINI_VOICE"),
            gemini_live_url: var("GEMINI_LIVE_URL"),
            connect_timeout_ms: parse_var("CONNECT_TIMEOUT_MS")?,
            gemini_google_search: parse_var("GEMINI_GOOGLE_SEARCH")?,
            gemini_text_model: var("GEMINI_TEXT_MODEL"),
            gemini_api_url: var("GEMINI_API_URL"),
            persona_path: var("PERSONA_PATH").map(PathBuf::from),
            listings_path: var("LISTINGS_PATH").map(PathBuf::from),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        })
    }
}
