//! Anthropic adapter types and canonical conversion logic.

use crate::{ChatMessage, CompletionResult, ProviderId, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicRequest {
    pub model: String,
    /// Out-of-band system instruction; the Messages API has no system role.
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnthropicRole {
    User,
    Assistant,
}

impl AnthropicRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Splits canonical history into the side-channel system text (first system
/// message) and the remaining conversation in original order.
pub(crate) fn split_system(history: Vec<ChatMessage>) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system = None;
    let mut messages = Vec::with_capacity(history.len());

    for message in history {
        let role = match message.role() {
            Role::System => {
                if system.is_none() {
                    system = Some(message.into_content());
                }
                continue;
            }
            Role::User => AnthropicRole::User,
            Role::Assistant => AnthropicRole::Assistant,
        };

        messages.push(AnthropicMessage {
            role,
            content: message.into_content(),
        });
    }

    (system, messages)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicResponse {
    pub model: String,
    /// Text of the first text block.
    pub content: String,
    pub stop_reason: Option<String>,
}

impl AnthropicResponse {
    pub(crate) fn into_completion_result(self) -> CompletionResult {
        CompletionResult {
            content: self.content,
            finish_reason: self.stop_reason,
            provider: ProviderId::Anthropic,
            model: self.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnthropicStreamChunk {
    TextDelta(String),
    Stopped { stop_reason: Option<String> },
}
