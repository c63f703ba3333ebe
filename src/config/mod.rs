//! Configuration for the Homie voice service
//!
//! Configuration comes from three sources: .env files (loaded in `main`),
//! environment variables and an optional YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use homie_voice::config::HomieConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = HomieConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = HomieConfig::from_file(&PathBuf::from("homie.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::nlu::{GEMINI_API_URL, GEMINI_TEXT_MODEL};
use crate::core::realtime::{GEMINI_DEFAULT_MODEL, GEMINI_LIVE_URL, GeminiVoice};
use crate::core::session::SessionConfig;

/// Default connection establishment bound in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Persona used when no persona file is configured.
pub const DEFAULT_PERSONA: &str = "You are Homie, a friendly real-estate agent helping people \
find a home in Belgium. Keep answers short and conversational. Whenever the user mentions a \
search criterion such as a city, a budget, a minimum size, a number of bedrooms, pets or the \
kind of property, call updateSearchFilters with only the criteria that changed, then tell the \
user how many properties match.";

/// Service configuration
///
/// Groups:
/// - Server settings (host, port)
/// - Gemini Live settings (API key, model, voice, endpoint, timeout, search)
/// - Gemini text settings (model, REST endpoint)
/// - Assistant persona and listing catalogue
/// - Security settings (CORS)
#[derive(Debug, Clone)]
pub struct HomieConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Gemini Live settings
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_voice: GeminiVoice,
    /// WebSocket endpoint, overridable for local testing
    pub gemini_live_url: String,
    pub connect_timeout_ms: u64,
    /// Offer web search grounding to the live model
    pub gemini_google_search: bool,

    // Gemini text settings
    pub gemini_text_model: String,
    /// REST base URL, overridable for local testing
    pub gemini_api_url: String,

    /// File holding the system instruction; built-in persona when unset
    pub persona_path: Option<PathBuf>,
    /// JSON listing catalogue; bundled sample catalogue when unset
    pub listings_path: Option<PathBuf>,

    // Security settings
    /// Comma-separated origins, or "*"
    pub cors_allowed_origins: Option<String>,
}

impl Default for HomieConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            gemini_api_key: None,
            gemini_model: GEMINI_DEFAULT_MODEL.to_string(),
            gemini_voice: GeminiVoice::default(),
            gemini_live_url: GEMINI_LIVE_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            gemini_google_search: true,
            gemini_text_model: GEMINI_TEXT_MODEL.to_string(),
            gemini_api_url: GEMINI_API_URL.to_string(),
            persona_path: None,
            listings_path: None,
            cors_allowed_origins: None,
        }
    }
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for HomieConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl HomieConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables provide the base configuration and YAML values
    /// override them. The merged result is validated.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// System instruction for the assistant.
    pub fn persona(&self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.persona_path {
            Some(path) => {
                let persona = std::fs::read_to_string(path).map_err(|e| {
                    format!("Failed to read persona file {}: {e}", path.display())
                })?;
                Ok(persona.trim().to_string())
            }
            None => Ok(DEFAULT_PERSONA.to_string()),
        }
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> Result<SessionConfig, Box<dyn std::error::Error>> {
        Ok(SessionConfig {
            model: self.gemini_model.clone(),
            voice: self.gemini_voice,
            persona: Some(self.persona()?),
            google_search: self.gemini_google_search,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    pub(crate) fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("API_KEY");
            env::remove_var("GEMINI_MODEL");
            env::remove_var("GEMINI_VOICE");
            env::remove_var("GEMINI_LIVE_URL");
            env::remove_var("CONNECT_TIMEOUT_MS");
            env::remove_var("GEMINI_GOOGLE_SEARCH");
            env::remove_var("GEMINI_TEXT_MODEL");
            env::remove_var("GEMINI_API_URL");
            env::remove_var("PERSONA_PATH");
            env::remove_var("LISTINGS_PATH");
            env::remove_var("CORS_ALLOWED_ORIGINS");
        }
    }

    #[test]
    fn test_address_and_timeout() {
        let mut config = HomieConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 8080;
        config.connect_timeout_ms = 2500;
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.connect_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_has_api_key() {
        let mut config = HomieConfig::default();
        assert!(!config.has_api_key());
        config.gemini_api_key = Some("   ".to_string());
        assert!(!config.has_api_key());
        config.gemini_api_key = Some("key".to_string());
        assert!(config.has_api_key());
    }

    #[test]
    fn test_default_persona() {
        let config = HomieConfig::default();
        let session = config.session_config().unwrap();
        assert_eq!(session.model, GEMINI_DEFAULT_MODEL);
        assert_eq!(session.voice, GeminiVoice::Orus);
        assert!(session.google_search);
        assert!(session.persona.unwrap().contains("updateSearchFilters"));
    }

    #[test]
    fn test_persona_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("persona.txt");
        fs::write(&path, "  You are a concise agent in Leuven.\n").unwrap();

        let mut config = HomieConfig::default();
        config.persona_path = Some(path);
        assert_eq!(config.persona().unwrap(), "You are a concise agent in Leuven.");

        let mut missing = HomieConfig::default();
        missing.persona_path = Some(temp_dir.path().join("missing.txt"));
        assert!(
            missing
                .persona()
                .unwrap_err()
                .to_string()
                .contains("Failed to read persona file")
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = HomieConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
        assert_eq!(config.gemini_live_url, GEMINI_LIVE_URL);
        assert!(config.gemini_google_search);
        assert_eq!(config.gemini_text_model, GEMINI_TEXT_MODEL);
        assert_eq!(config.gemini_api_url, GEMINI_API_URL);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_search_switch_and_text_settings() {
        cleanup_env_vars();

        unsafe {
            env::set_var("GEMINI_GOOGLE_SEARCH", "false");
            env::set_var("GEMINI_TEXT_MODEL", "gemini-text-env");
            env::set_var("GEMINI_API_URL", "http://127.0.0.1:9001/v1beta");
        }
        let config = HomieConfig::from_env().unwrap();
        assert!(!config.gemini_google_search);
        assert!(!config.session_config().unwrap().google_search);
        assert_eq!(config.gemini_text_model, "gemini-text-env");
        assert_eq!(config.gemini_api_url, "http://127.0.0.1:9001/v1beta");

        unsafe {
            env::set_var("GEMINI_GOOGLE_SEARCH", "sometimes");
        }
        let result = HomieConfig::from_env();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("GEMINI_GOOGLE_SEARCH")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_api_key_fallback() {
        cleanup_env_vars();

        unsafe {
            env::set_var("API_KEY", "fallback-key");
        }
        let config = HomieConfig::from_env().unwrap();
        assert_eq!(config.gemini_api_key, Some("fallback-key".to_string()));

        unsafe {
            env::set_var("GEMINI_API_KEY", "primary-key");
        }
        let config = HomieConfig::from_env().unwrap();
        assert_eq!(config.gemini_api_key, Some("primary-key".to_string()));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let result = HomieConfig::from_env();
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("homie.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

gemini:
  api_key: "yaml-key"
  voice: "Kore"
  connect_timeout_ms: 5000
  google_search: false
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("GEMINI_API_KEY", "env-key");
            env::set_var("GEMINI_MODEL", "gemini-live-env");
        }

        let config = HomieConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.gemini_api_key, Some("yaml-key".to_string()));
        assert_eq!(config.gemini_voice, GeminiVoice::Kore);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert!(!config.gemini_google_search);
        // ENV value where YAML is silent
        assert_eq!(config.gemini_model, "gemini-live-env");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = HomieConfig::from_file(&PathBuf::from("/nonexistent/homie.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_zero_timeout() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("homie.yaml");
        fs::write(&config_path, "gemini:\n  connect_timeout_ms: 0\n").unwrap();

        let result = HomieConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("connect_timeout_ms")
        );

        cleanup_env_vars();
    }
}
