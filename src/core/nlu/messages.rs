//! `generateContent` request and response shapes for text understanding.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::listings::{FilterUpdate, PropertyType, SearchFilters, SortBy};

/// What the user wanted from a typed utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    ApartmentSearch,
    RefineFilters,
    AskDetails,
    SmallTalk,
    EndSession,
}

impl Intent {
    pub fn all() -> &'static [Self] {
        &[
            Self::ApartmentSearch,
            Self::RefineFilters,
            Self::AskDetails,
            Self::SmallTalk,
            Self::EndSession,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApartmentSearch => "APARTMENT_SEARCH",
            Self::RefineFilters => "REFINE_FILTERS",
            Self::AskDetails => "ASK_DETAILS",
            Self::SmallTalk => "SMALL_TALK",
            Self::EndSession => "END_SESSION",
        }
    }
}

/// Structured answer for one utterance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluResponse {
    pub intent: Intent,
    /// Partial filters in the same shape the voice tool receives
    #[serde(default)]
    pub filters: Option<Value>,
    pub assistant_reply: String,
}

impl NluResponse {
    /// Filter change carried by the answer, empty when none was extracted.
    pub fn filter_update(&self) -> Result<FilterUpdate, serde_json::Error> {
        match &self.filters {
            Some(filters) => FilterUpdate::from_args(filters),
            None => Ok(FilterUpdate::default()),
        }
    }
}

/// Prompt for one utterance, carrying the filters already in place.
pub fn prompt(text: &str, current: &SearchFilters) -> String {
    let filters = serde_json::to_string(current).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are Homie, a real estate assistant for Belgium.\n\
         User said: \"{text}\"\n\
         Current filters: {filters}\n\n\
         Extract filters and generate a warm, short reply.\n\
         Return JSON."
    )
}

/// Schema constraining the model output to [`NluResponse`].
pub fn response_schema() -> Value {
    let intents: Vec<&str> = Intent::all().iter().map(Intent::as_str).collect();
    let types: Vec<&str> = PropertyType::all().iter().map(PropertyType::as_str).collect();
    let sorts: Vec<&str> = SortBy::all().iter().map(SortBy::as_str).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "intent": {"type": "STRING", "enum": intents},
            "filters": {
                "type": "OBJECT",
                "nullable": true,
                "properties": {
                    "city": {"type": "STRING", "nullable": true},
                    "minPrice": {"type": "NUMBER", "nullable": true},
                    "maxPrice": {"type": "NUMBER", "nullable": true},
                    "minSize": {"type": "NUMBER", "nullable": true},
                    "bedrooms": {"type": "NUMBER", "nullable": true},
                    "petsAllowed": {"type": "BOOLEAN", "nullable": true},
                    "type": {"type": "STRING", "enum": types, "nullable": true},
                    "sortBy": {"type": "STRING", "enum": sorts, "nullable": true}
                }
            },
            "assistantReply": {"type": "STRING"}
        },
        "required": ["intent", "assistantReply"]
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: TextGenerationConfig,
}

impl GenerateContentRequest {
    pub fn new(prompt: String) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: TextGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, `None` when it carries none.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}
