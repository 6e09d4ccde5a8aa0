//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests to the chat
//! endpoint. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{ConnectInfo, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Json, Response},
};
use sha2::{Digest, Sha256};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use taylor_core::{conversation::Turn, orchestrator::ChatError};
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::{
    config::ConfigError,
    models::{ChatRequest, ChatResponse, ErrorResponse},
    state::AppState,
};

/// Header that may carry the access code.
pub const STUDY_CODE_HEADER: &str = "x-study-code";

pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    TooManyRequests { retry_after_secs: u64 },
    Misconfigured(ConfigError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unauthorized => {
                let message = "Unauthorized (missing/invalid study code).".to_string();
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::TooManyRequests { retry_after_secs } => {
                let message = "Too many requests. Please wait and try again.".to_string();
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse { message })).into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::Misconfigured(err) => {
                error!("Server misconfiguration: {}", err);
                let message = "The server is not configured to answer chat requests.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

/// Whole seconds for a `Retry-After` header, rounded up and never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RateLimited { retry_after } => ApiError::TooManyRequests {
                retry_after_secs: retry_after_secs(retry_after),
            },
            ChatError::InvalidConversation(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

/// Identifies the caller for rate limiting: the first `x-forwarded-for`
/// entry, else the peer address.
pub fn client_id(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Checks the access code when the deployment requires one. The header wins
/// over the body field; both are trimmed.
pub fn authorize(
    required: Option<&str>,
    headers: &HeaderMap,
    body_code: Option<&str>,
) -> Result<(), ApiError> {
    let Some(required) = required else {
        return Ok(());
    };
    let supplied = headers
        .get(STUDY_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(body_code)
        .unwrap_or_default()
        .trim();

    if codes_match(supplied, required) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Compares two access codes in time independent of where they differ.
/// Hashing first also hides the length of the required code.
fn codes_match(supplied: &str, required: &str) -> bool {
    let supplied = Sha256::digest(supplied.as_bytes());
    let required = Sha256::digest(required.as_bytes());
    supplied
        .iter()
        .zip(required.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Send the conversation so far and receive the persona's next reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Persona reply, with a diagram when one was requested", body = ChatResponse),
        (status = 400, description = "Malformed request or empty conversation", body = ErrorResponse),
        (status = 401, description = "Missing or invalid study code", body = ErrorResponse),
        (status = 429, description = "Too many requests from this client", body = ErrorResponse),
        (status = 500, description = "Server is missing its upstream credential", body = ErrorResponse)
    ),
    params(
        ("x-study-code" = Option<String>, Header, description = "Access code, when the deployment requires one")
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let orchestrator = state.orchestrator.as_ref().ok_or_else(|| {
        ApiError::Misconfigured(ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    })?;

    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Rejected malformed chat request");
        ApiError::BadRequest(rejection.body_text())
    })?;

    authorize(
        state.config.study_code.as_deref(),
        &headers,
        payload.study_code.as_deref(),
    )?;

    let client = client_id(&headers, peer);
    let turns: Vec<Turn> = payload.messages.into_iter().map(Turn::from).collect();
    let span = info_span!("chat", request_id = %Uuid::new_v4());

    let result = orchestrator
        .respond(&client, turns)
        .instrument(span)
        .await?;
    Ok(Json(result.into()))
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
