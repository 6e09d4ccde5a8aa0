//! Conversation Model
//!
//! A conversation is the ordered list of turns the calling session owns. The
//! core receives it by value on every request and never keeps it.

use crate::fraction::{FractionParameters, extract_fraction};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The teacher-in-training typing into the chat.
    Human,
    /// The simulated student.
    Persona,
}

impl Speaker {
    /// The role name the OpenAI-compatible chat API expects for this speaker.
    pub fn upstream_role(self) -> &'static str {
        match self {
            Speaker::Human => "user",
            Speaker::Persona => "assistant",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.upstream_role())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Human,
            text: text.into(),
        }
    }

    pub fn persona(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Persona,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("conversation must contain at least one turn")]
    Empty,
}

/// A validated, non-empty sequence of turns.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Validates the turns and wraps them.
    pub fn new(turns: Vec<Turn>) -> Result<Self, ConversationError> {
        if turns.is_empty() {
            return Err(ConversationError::Empty);
        }
        Ok(Self { turns })
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Text of the most recent human turn, or `""` when the human has not spoken.
    pub fn latest_human_text(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Human)
            .map(|turn| turn.text.as_str())
            .unwrap_or("")
    }

    /// Searches turns from newest to oldest and returns the first fraction found.
    ///
    /// Matches are never combined across turns.
    pub fn latest_fraction(&self) -> Option<FractionParameters> {
        self.turns
            .iter()
            .rev()
            .find_map(|turn| extract_fraction(&turn.text))
    }
}
