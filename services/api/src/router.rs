//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the chat endpoint, health check, and OpenAPI documentation.

use crate::{
    handlers,
    models::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse, MessageRole},
    state::AppState,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::chat, handlers::health),
    components(
        schemas(ChatRequest, ChatMessage, MessageRole, ChatResponse, ErrorResponse)
    ),
    tags(
        (name = "Taylor API", description = "Roleplay chat with a simulated student, with optional fraction diagrams")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/healthz", get(handlers::health))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_chat_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/chat"));
        assert!(doc.paths.paths.contains_key("/healthz"));
    }
}
