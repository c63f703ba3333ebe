//! Gemini Live wire messages.
//!
//! Client messages are externally tagged objects (`{"setup": {...}}`,
//! `{"realtimeInput": {...}}`, `{"toolResponse": {...}}`). Server messages
//! are a single object whose optional members say what the message carries;
//! [`LiveServerMessage::into_server_message`] flattens them into the
//! provider-neutral [`ServerMessage`].

use serde::{Deserialize, Serialize};

use super::config::model_path;
use crate::core::realtime::base::{
    AudioChunk, Citation, FunctionDeclaration, ServerMessage, SessionSetup, ToolCall, ToolResponse,
};

// =============================================================================
// Client Messages
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LiveClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponseBody),
}

impl LiveClientMessage {
    /// Setup message for a new session.
    pub fn setup(setup: &SessionSetup) -> Self {
        let speech_config = setup.voice.as_ref().map(|voice| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice.clone(),
                },
            },
        });

        let system_instruction = setup
            .system_instruction
            .as_ref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| Content {
                parts: vec![TextPart { text: text.clone() }],
            });

        let mut tools = Vec::new();
        if !setup.tools.is_empty() {
            tools.push(Tool {
                function_declarations: setup.tools.clone(),
                google_search: None,
            });
        }
        if setup.google_search {
            tools.push(Tool {
                function_declarations: Vec::new(),
                google_search: Some(serde_json::json!({})),
            });
        }

        Self::Setup(Setup {
            model: model_path(&setup.model),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config,
            },
            system_instruction,
            tools,
        })
    }

    /// One microphone frame.
    pub fn audio(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: mime_type.into(),
                data: data.into(),
            }],
        })
    }

    /// Batched tool responses.
    pub fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        Self::ToolResponse(ToolResponseBody {
            function_responses: responses
                .into_iter()
                .map(|r| FunctionResponse {
                    id: r.id,
                    name: r.name,
                    response: r.response,
                })
                .collect(),
        })
    }
}

/// Session setup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_declarations: Vec<FunctionDeclaration>,
    /// Empty object enabling search grounding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseBody {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

// =============================================================================
// Server Messages
// =============================================================================

/// Message received from the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallBody>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallBody {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

fn collect_citations(metadata: &GroundingMetadata, into: &mut Vec<Citation>) {
    for chunk in &metadata.grounding_chunks {
        let Some(web) = &chunk.web else { continue };
        let Some(uri) = web.uri.as_ref().filter(|uri| !uri.is_empty()) else {
            continue;
        };
        into.push(Citation {
            title: web.title.clone().unwrap_or_else(|| uri.clone()),
            uri: uri.clone(),
        });
    }
}

impl LiveServerMessage {
    /// Flatten into the provider-neutral form.
    pub fn into_server_message(self) -> ServerMessage {
        let mut message = ServerMessage {
            setup_complete: self.setup_complete.is_some(),
            ..Default::default()
        };

        if let Some(content) = self.server_content {
            message.interrupted = content.interrupted.unwrap_or(false);
            message.turn_complete = content.turn_complete.unwrap_or(false);

            if let Some(metadata) = &content.grounding_metadata {
                collect_citations(metadata, &mut message.citations);
            }
            for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
                if let Some(inline) = part.inline_data {
                    message.audio.push(AudioChunk {
                        mime_type: inline.mime_type,
                        data: inline.data,
                    });
                }
                if let Some(text) = part.text {
                    message.text.push(text);
                }
                if let Some(metadata) = &part.grounding_metadata {
                    collect_citations(metadata, &mut message.citations);
                }
            }
        }

        if let Some(tool_call) = self.tool_call {
            message.tool_calls = tool_call
                .function_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id.unwrap_or_default(),
                    name: call.name,
                    args: call
                        .args
                        .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
                })
                .collect();
        }

        if let Some(cancellation) = self.tool_call_cancellation {
            message.cancelled_tool_calls = cancellation.ids;
        }

        if let Some(go_away) = self.go_away {
            message.go_away = Some(go_away.time_left.unwrap_or_default());
        }

        message
    }
}
