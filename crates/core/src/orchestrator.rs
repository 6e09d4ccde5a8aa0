//! Response Orchestration
//!
//! One request moves through: admission (rate limit) → validation → intent and
//! persona reply (concurrently) → optional diagram → merged result. Every
//! upstream failure is recovered here according to a fixed policy:
//!
//! - classifier failure: treated as "no image wanted"
//! - reply failure: fixed fallback reply, no diagram attempted
//! - image failure or missing fraction: `image` is `None`

use crate::{
    conversation::{Conversation, ConversationError, Turn},
    diagram::build_diagram_prompt,
    image_client::ImageGenerator,
    intent::{IntentClassifier, IntentDecision},
    persona::{PersonaReplyGenerator, fallback_for},
    rate_limit::{RateDecision, RateLimiter},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors that reject a request before any upstream call is made.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("too many requests, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    InvalidConversation(#[from] ConversationError),
}

/// The single artifact returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub reply: String,
    pub image: Option<String>,
}

pub struct ChatOrchestrator {
    classifier: Arc<dyn IntentClassifier>,
    persona: PersonaReplyGenerator,
    images: Arc<dyn ImageGenerator>,
    limiter: Arc<dyn RateLimiter>,
}

impl ChatOrchestrator {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        persona: PersonaReplyGenerator,
        images: Arc<dyn ImageGenerator>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            classifier,
            persona,
            images,
            limiter,
        }
    }

    /// Handles one chat request from `client_id`.
    #[instrument(skip_all, fields(client = %client_id, turns = turns.len()))]
    pub async fn respond(
        &self,
        client_id: &str,
        turns: Vec<Turn>,
    ) -> Result<GenerationResult, ChatError> {
        if let RateDecision::Deny { retry_after } = self.limiter.check(client_id) {
            warn!(?retry_after, "Client exceeded its request budget");
            return Err(ChatError::RateLimited { retry_after });
        }
        let conversation = Conversation::new(turns)?;

        let (intent, reply) = tokio::join!(
            self.classifier.classify(conversation.latest_human_text()),
            self.persona.generate(&conversation),
        );

        let intent = intent.unwrap_or_else(|e| {
            warn!(error = %e, "Intent classification failed; assuming no image");
            IntentDecision::no_image()
        });
        debug!(?intent, "Intent resolved");

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Persona reply failed; substituting fallback");
                return Ok(GenerationResult {
                    reply: fallback_for(&e).to_string(),
                    image: None,
                });
            }
        };

        let image = self.render_diagram(&intent, &conversation).await;
        info!(
            wants_image = intent.wants_image,
            has_image = image.is_some(),
            "Response assembled"
        );
        Ok(GenerationResult { reply, image })
    }

    /// Attempts a diagram only when one was asked for and a fraction is known.
    async fn render_diagram(
        &self,
        intent: &IntentDecision,
        conversation: &Conversation,
    ) -> Option<String> {
        if !intent.wants_image {
            return None;
        }
        let Some(fraction) = intent.fraction().or_else(|| conversation.latest_fraction()) else {
            info!("Diagram requested but no fraction found in the conversation");
            return None;
        };

        let prompt = build_diagram_prompt(intent.image_type, fraction);
        match self.images.generate(&prompt).await {
            Ok(image) => Some(image.to_string()),
            Err(e) => {
                warn!(error = %e, %fraction, "Image generation failed; replying without diagram");
                None
            }
        }
    }
}
