use crate::error::UpstreamError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Role of a message sent to a chat-completion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single non-streaming chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A generic client for interacting with a text-generation model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes exactly one call to the model and returns the raw text of the
    /// first choice. No retries are attempted.
    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError>;
}

/// Connection details shared by every OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct UpstreamEndpoint {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl UpstreamEndpoint {
    /// # Arguments
    ///
    /// * `http` - A configured HTTP client (timeouts are set by the caller).
    /// * `api_base` - Base URL, e.g. `https://api.openai.com/v1`.
    /// * `api_key` - Bearer credential. Never logged.
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    /// POSTs a JSON body to `path` under the base URL and returns the parsed
    /// JSON answer. HTTP 429 maps to [`UpstreamError::RateLimited`], any other
    /// non-2xx status to [`UpstreamError::Status`].
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), "Upstream responded");
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    endpoint: UpstreamEndpoint,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Where and how to reach the service.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o-mini").
    pub fn new(endpoint: UpstreamEndpoint, model: String) -> Self {
        Self { endpoint, model }
    }
}

fn to_openai_message(
    message: &ChatMessage,
) -> Result<ChatCompletionRequestMessage, UpstreamError> {
    let content = message.content.clone();
    let built: ChatCompletionRequestMessage = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    };
    Ok(built)
}

/// Pulls `choices[0].message.content` out of a chat-completion payload.
fn first_choice_text(payload: &Value) -> Result<String, UpstreamError> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::Malformed("no message content in first choice".to_string()))
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    #[allow(deprecated)]
    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
        let messages = request
            .messages
            .iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>, _>>()?;

        let body = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()?;

        let payload = self.endpoint.post_json("chat/completions", &body).await?;
        first_choice_text(&payload)
    }
}
