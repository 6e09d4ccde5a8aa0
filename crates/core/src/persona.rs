//! Persona Reply Generation
//!
//! Produces the simulated student's next turn. The persona instruction is an
//! opaque prompt asset; this module only frames the conversation around it.

use crate::{
    conversation::{Conversation, Speaker},
    error::UpstreamError,
    llm_client::{ChatMessage, CompletionRequest, LLMClient},
};
use std::sync::Arc;

/// Shown when the reply could not be produced for any reason other than rate limiting.
pub const FALLBACK_REPLY: &str = "Connection error, please try again.";

/// Shown when the text model rate-limited the request.
pub const RATE_LIMITED_REPLY: &str =
    "Sorry, I need a short break before I can answer. Can you ask me again in a minute?";

/// Sampling settings for persona replies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplySettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 120,
        }
    }
}

pub struct PersonaReplyGenerator {
    llm: Arc<dyn LLMClient>,
    instruction: Arc<String>,
    settings: ReplySettings,
}

impl PersonaReplyGenerator {
    pub fn new(llm: Arc<dyn LLMClient>, instruction: Arc<String>, settings: ReplySettings) -> Self {
        Self {
            llm,
            instruction,
            settings,
        }
    }

    /// The persona instruction followed by every turn in its upstream role.
    pub fn build_request(&self, conversation: &Conversation) -> CompletionRequest {
        let mut messages = Vec::with_capacity(conversation.turns().len() + 1);
        messages.push(ChatMessage::system(self.instruction.as_str()));
        messages.extend(conversation.turns().iter().map(|turn| match turn.speaker {
            Speaker::Human => ChatMessage::user(turn.text.clone()),
            Speaker::Persona => ChatMessage::assistant(turn.text.clone()),
        }));

        CompletionRequest {
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Generates one in-character reply, trimmed. Blank output is an error.
    pub async fn generate(&self, conversation: &Conversation) -> Result<String, UpstreamError> {
        let raw = self.llm.complete(self.build_request(conversation)).await?;
        let reply = raw.trim();
        if reply.is_empty() {
            return Err(UpstreamError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}

/// The user-safe text substituted for a failed reply.
pub fn fallback_for(error: &UpstreamError) -> &'static str {
    match error {
        UpstreamError::RateLimited => RATE_LIMITED_REPLY,
        _ => FALLBACK_REPLY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{conversation::Turn, llm_client::MockLLMClient};

    fn conversation() -> Conversation {
        Conversation::new(vec![
            Turn::human("What is 1/4 + 1/6?"),
            Turn::persona("Is it 2/10?"),
            Turn::human("Why do you think so?"),
        ])
        .unwrap()
    }

    fn generator(llm: MockLLMClient) -> PersonaReplyGenerator {
        PersonaReplyGenerator::new(
            Arc::new(llm),
            Arc::new("You are Taylor.".to_string()),
            ReplySettings::default(),
        )
    }

    #[test]
    fn request_starts_with_instruction_and_maps_roles() {
        let request = generator(MockLLMClient::new()).build_request(&conversation());

        assert_eq!(
            request.messages,
            vec![
                ChatMessage::system("You are Taylor."),
                ChatMessage::user("What is 1/4 + 1/6?"),
                ChatMessage::assistant("Is it 2/10?"),
                ChatMessage::user("Why do you think so?"),
            ]
        );
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 120);
    }

    #[tokio::test]
    async fn reply_is_trimmed() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .times(1)
            .returning(|_| Ok("  I added the tops and the bottoms.\n".to_string()));

        let reply = generator(llm).generate(&conversation()).await.unwrap();
        assert_eq!(reply, "I added the tops and the bottoms.");
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().returning(|_| Ok("   \n".to_string()));

        let err = generator(llm).generate(&conversation()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyReply));
        assert_eq!(fallback_for(&err), FALLBACK_REPLY);
    }

    #[test]
    fn rate_limit_gets_its_own_fallback() {
        assert_eq!(fallback_for(&UpstreamError::RateLimited), RATE_LIMITED_REPLY);
        assert_eq!(
            fallback_for(&UpstreamError::Transport("reset".to_string())),
            FALLBACK_REPLY
        );
    }
}
