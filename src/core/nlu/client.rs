//! Gemini REST client for typed utterances.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::messages::{GenerateContentRequest, GenerateContentResponse, NluResponse, prompt};
use crate::core::listings::SearchFilters;

/// Gemini REST API base.
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text model used when none is configured.
pub const GEMINI_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Bound on one request, connect included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from text understanding.
#[derive(Debug, Error)]
pub enum NluError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Gemini API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("No response from the model")]
    EmptyResponse,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl NluError {
    /// Short status line for the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "Missing API key",
            Self::Request(_) | Self::Api { .. } => "Assistant unavailable",
            Self::EmptyResponse | Self::InvalidResponse(_) => "Assistant gave no usable answer",
        }
    }
}

impl From<reqwest::Error> for NluError {
    fn from(err: reqwest::Error) -> Self {
        NluError::Request(err.to_string())
    }
}

/// Turns typed utterances into an intent, a filter change and a reply.
pub struct GeminiTextClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiTextClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, NluError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(NluError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: GEMINI_TEXT_MODEL.to_string(),
        })
    }

    /// Point the client at another endpoint (used against local servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Understand one utterance given the filters already in place.
    pub async fn parse_utterance(
        &self,
        text: &str,
        current: &SearchFilters,
    ) -> Result<NluResponse, NluError> {
        let request = GenerateContentRequest::new(prompt(text, current));
        debug!(model = %self.model, "Sending text utterance");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(%status, "Gemini text request rejected");
            return Err(NluError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| NluError::InvalidResponse(e.to_string()))?;
        let text = body.text().ok_or(NluError::EmptyResponse)?;

        serde_json::from_str(&text).map_err(|e| NluError::InvalidResponse(e.to_string()))
    }
}

impl Drop for GeminiTextClient {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl std::fmt::Debug for GeminiTextClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTextClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
