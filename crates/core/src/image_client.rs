//! Image Generation Client
//!
//! Sends a diagram prompt to an OpenAI-compatible image endpoint and turns the
//! answer into something a browser can display directly.

use crate::{error::UpstreamError, llm_client::UpstreamEndpoint};
use async_openai::types::{CreateImageRequestArgs, ImageModel, ImageResponseFormat};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;
use std::fmt;

/// A displayable image: a hosted URL or inline base64 PNG data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(String),
    InlinePng(String),
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Url(url) => f.write_str(url),
            ImageRef::InlinePng(data) => write!(f, "data:image/png;base64,{}", data),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Makes exactly one call to the image model for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<ImageRef, UpstreamError>;
}

pub struct OpenAIImageClient {
    endpoint: UpstreamEndpoint,
    model: String,
    size: String,
}

impl OpenAIImageClient {
    /// # Arguments
    ///
    /// * `endpoint` - Where and how to reach the service.
    /// * `model` - Image model identifier (e.g., "gpt-image-1").
    /// * `size` - Fixed output size such as "1024x1024".
    pub fn new(endpoint: UpstreamEndpoint, model: String, size: String) -> Self {
        Self {
            endpoint,
            model,
            size,
        }
    }
}

/// Reads the first entry of `data`, preferring `url` over `b64_json`.
fn first_image_ref(payload: &Value) -> Result<ImageRef, UpstreamError> {
    let first = payload
        .get("data")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
        .ok_or_else(|| UpstreamError::Malformed("image response has no data".to_string()))?;

    if let Some(url) = first.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) {
        return Ok(ImageRef::Url(url.to_string()));
    }

    if let Some(b64) = first.get("b64_json").and_then(Value::as_str) {
        BASE64
            .decode(b64.as_bytes())
            .map_err(|e| UpstreamError::Malformed(format!("image base64 decode failed: {}", e)))?;
        return Ok(ImageRef::InlinePng(b64.to_string()));
    }

    Err(UpstreamError::Malformed(
        "image entry has neither url nor b64_json".to_string(),
    ))
}

impl OpenAIImageClient {
    /// `gpt-image-*` models reject `response_format` and always answer with
    /// `b64_json`; older models default to short-lived URLs unless asked.
    fn accepts_response_format(&self) -> bool {
        !self.model.starts_with("gpt-image")
    }

    fn request_body(&self, prompt: &str) -> Result<Value, UpstreamError> {
        let mut args = CreateImageRequestArgs::default();
        args.model(ImageModel::Other(self.model.clone())).prompt(prompt);
        if self.accepts_response_format() {
            args.response_format(ImageResponseFormat::Url);
        }
        let request = args.build()?;

        // The size enum does not cover every model's sizes, so it is set on the raw body.
        let mut body = serde_json::to_value(&request)
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        body["size"] = Value::String(self.size.clone());
        Ok(body)
    }
}

#[async_trait]
impl ImageGenerator for OpenAIImageClient {
    async fn generate(&self, prompt: &str) -> Result<ImageRef, UpstreamError> {
        let body = self.request_body(prompt)?;
        let payload = self.endpoint.post_json("images/generations", &body).await?;
        first_image_ref(&payload)
    }
}
