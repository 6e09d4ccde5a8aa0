//! API Models
//!
//! Request and response bodies of the chat endpoint, with `utoipa` schemas
//! for the OpenAPI document.

use serde::{Deserialize, Serialize};
use std::fmt;
use taylor_core::{conversation::Turn, orchestrator::GenerationResult};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    #[schema(example = "user")]
    pub role: MessageRole,
    #[schema(example = "Can you show me 5/12 on a number line?")]
    pub content: String,
}

impl From<ChatMessage> for Turn {
    fn from(message: ChatMessage) -> Self {
        match message.role {
            MessageRole::User => Turn::human(message.content),
            MessageRole::Assistant => Turn::persona(message.content),
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Access code, used when the `x-study-code` header is absent.
    #[serde(rename = "studyCode", default)]
    pub study_code: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
    /// A URL or `data:` URI of the requested diagram, or `null`.
    pub image: Option<String>,
}

impl From<GenerationResult> for ChatResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            reply: result.reply,
            image: result.image,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
