//! Wire types for the gateway HTTP surface.

use serde::{Deserialize, Serialize};

use crate::risk::Category;
use crate::route::Route;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    pub fn assistant(request_id: &str, model: &str, content: String) -> Self {
        Self {
            id: request_id.to_string(),
            object: "chat.completion".to_string(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Error envelope returned on every failure path.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Mapping view exposed by the explain endpoint. Deliberately omits the
/// original value.
#[derive(Debug, Serialize)]
pub struct ExplainMapping {
    pub placeholder: String,
    pub entity_type: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub request_id: String,
    pub policy_version: String,
    pub model: String,
    pub sanitized_input: String,
    pub detections: usize,
    pub min_confidence: f64,
    pub risk_score: u32,
    pub risk_category: Category,
    pub route: Route,
    pub egress: bool,
    pub hard_block: bool,
    pub mappings: Vec<ExplainMapping>,
}
