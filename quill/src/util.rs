//! Small convenience helpers for common setup.

use qchat::{ChatTurnPayload, CurrentUser};
use qprovider::ProviderId;

pub fn parse_provider_id(value: &str) -> Option<ProviderId> {
    match value.trim().to_ascii_lowercase().as_str() {
        "openai" => Some(ProviderId::OpenAi),
        "claude" | "anthropic" => Some(ProviderId::Anthropic),
        "mock" => Some(ProviderId::Mock),
        _ => None,
    }
}

pub fn user(id: impl Into<String>) -> CurrentUser {
    CurrentUser::new(id.into(), "user")
}

pub fn question(text: impl Into<String>) -> ChatTurnPayload {
    ChatTurnPayload {
        question: text.into(),
        model: None,
        streaming: false,
    }
}

pub fn streaming_question(text: impl Into<String>) -> ChatTurnPayload {
    ChatTurnPayload {
        streaming: true,
        ..question(text)
    }
}
