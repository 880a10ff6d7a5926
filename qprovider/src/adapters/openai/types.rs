//! OpenAI adapter types and canonical conversion logic.

use crate::{ChatMessage, CompletionResult, ProviderId, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiMessage {
    pub role: OpenAiRole,
    pub content: String,
}

impl From<ChatMessage> for OpenAiMessage {
    fn from(value: ChatMessage) -> Self {
        Self {
            role: value.role().into(),
            content: value.into_content(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiRole {
    System,
    User,
    Assistant,
}

impl OpenAiRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<Role> for OpenAiRole {
    fn from(value: Role) -> Self {
        match value {
            Role::System => Self::System,
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiResponse {
    pub model: String,
    pub content: String,
    pub finish_reason: Option<String>,
}

impl OpenAiResponse {
    pub(crate) fn into_completion_result(self) -> CompletionResult {
        CompletionResult {
            content: self.content,
            finish_reason: self.finish_reason,
            provider: ProviderId::OpenAi,
            model: self.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAiStreamChunk {
    TextDelta(String),
    Finished { finish_reason: Option<String> },
}
