use thiserror::Error;

/// Failure of a single call to an upstream text or image model.
///
/// Every upstream-calling component returns this at its boundary; the
/// orchestrator decides which fallback applies.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request could not be built: {0}")]
    Request(String),
    #[error("upstream transport failure: {0}")]
    Transport(String),
    #[error("upstream rate limited the request")]
    RateLimited,
    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },
    #[error("upstream payload was malformed: {0}")]
    Malformed(String),
    #[error("upstream returned an empty reply")]
    EmptyReply,
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<async_openai::error::OpenAIError> for UpstreamError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Self::Request(err.to_string())
    }
}
