//! Core types for the provider gateway.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// CHAT TYPES
// =============================================================================

/// Chat message role. Survey prompts are sent as a single user turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier understood by the endpoint, e.g. "gpt-4o-mini".
    pub model: String,
    /// Messages in the conversation.
    pub messages: Vec<Message>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Which code path made this call, for usage records.
    pub caller: &'static str,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, caller: &'static str) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            caller,
        }
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// Response from chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// First choice's message content, unmodified.
    pub content: String,
    /// Prompt tokens, when the endpoint reports usage.
    pub input_tokens: Option<u32>,
    /// Completion tokens, when the endpoint reports usage.
    pub output_tokens: Option<u32>,
    pub latency: Duration,
    pub finish_reason: FinishReason,
    /// Provider request ID (x-request-id header).
    pub request_id: Option<String>,
}
