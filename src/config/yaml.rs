use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values given here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// gemini:
///   api_key: "your-gemini-key"
///   model: "gemini-2.5-flash-native-audio-preview-09-2025"
///   voice: "Orus"
///   live_url: "wss://generativelanguage.googleapis.com/ws/..."
///   connect_timeout_ms: 15000
///   google_search: true
///   text_model: "gemini-2.5-flash"
///   api_url: "https://generativelanguage.googleapis.com/v1beta"
///
/// assistant:
///   persona_path: "/etc/homie/persona.txt"
///
/// listings:
///   path: "/var/lib/homie/listings.json"
///
/// security:
///   cors_allowed_origins: "https://homie.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub assistant: Option<AssistantYaml>,
    pub listings: Option<ListingsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Gemini Live configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub live_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub google_search: Option<bool>,
    pub text_model: Option<String>,
    pub api_url: Option<String>,
}

/// Assistant persona configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AssistantYaml {
    pub persona_path: Option<PathBuf>,
}

/// Listing catalogue configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ListingsYaml {
    pub path: Option<PathBuf>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
