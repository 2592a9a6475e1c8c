//! UI-agnostic chat session state
//!
//! These types are shared by every front end (terminal UI, one-shot CLI) and
//! don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

/// Who wrote a message in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    /// Label shown next to the message in a rendered transcript
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Agent => "AI",
        }
    }
}

/// A single entry in the transcript. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Speaker,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Agent,
            content: content.into(),
        }
    }
}

/// Everything a chat session knows. Lives in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub transcript: Vec<Message>,
    pub pending_input: String,
    pub awaiting_response: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pending input would be accepted by a send
    pub fn has_sendable_input(&self) -> bool {
        !self.pending_input.trim().is_empty()
    }
}
