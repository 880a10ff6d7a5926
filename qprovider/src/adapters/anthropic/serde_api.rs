//! Anthropic Messages API payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};

use crate::{BackendFailure, CONTEXT_LENGTH_SUBCODE};

use super::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse};

pub(crate) fn build_api_request(request: AnthropicRequest) -> AnthropicApiRequest {
    AnthropicApiRequest {
        model: request.model,
        max_tokens: request.max_tokens,
        system: request.system,
        messages: request
            .messages
            .into_iter()
            .map(AnthropicApiMessage::from)
            .collect(),
        temperature: request.temperature,
        stream: request.stream,
    }
}

/// Status for an error `type`, used for errors delivered inside the event
/// stream where no HTTP status exists.
pub(crate) fn status_for_error_type(error_type: &str) -> Option<u16> {
    match error_type {
        "invalid_request_error" => Some(400),
        "authentication_error" => Some(401),
        "not_found_error" => Some(404),
        "rate_limit_error" => Some(429),
        "api_error" | "overloaded_error" => Some(503),
        _ => None,
    }
}

pub(crate) fn failure_from_error(status: Option<u16>, error: AnthropicApiError) -> BackendFailure {
    let status = match status {
        // Anthropic reports overload as 529.
        Some(529) => Some(503),
        Some(status) => Some(status),
        None => status_for_error_type(&error.r#type),
    };

    let mut failure = BackendFailure {
        status,
        ..BackendFailure::default()
    }
    .with_subcode(error.r#type);

    if error.message.to_ascii_lowercase().contains("prompt is too long") {
        failure = failure.with_subcode(CONTEXT_LENGTH_SUBCODE);
    }

    failure.with_detail(error.message)
}

pub(crate) fn parse_error_body(status: Option<u16>, body: &str) -> BackendFailure {
    match serde_json::from_str::<AnthropicApiErrorEnvelope>(body) {
        Ok(envelope) => failure_from_error(status, envelope.error),
        Err(_) => {
            let failure = BackendFailure {
                status: if status == Some(529) { Some(503) } else { status },
                ..BackendFailure::default()
            };
            if body.trim().is_empty() {
                failure
            } else {
                failure.with_detail(body.trim().to_string())
            }
        }
    }
}

/// Parses one streamed event payload; an `error` event fails it.
pub(crate) fn parse_stream_event(data: &str) -> Result<AnthropicApiStreamEvent, BackendFailure> {
    let parsed: AnthropicApiStreamEvent =
        serde_json::from_str(data).map_err(|err| BackendFailure::transport(err.to_string()))?;

    match parsed {
        AnthropicApiStreamEvent::Error { error } => Err(failure_from_error(None, error)),
        other => Ok(other),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicApiErrorEnvelope {
    pub error: AnthropicApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicApiError {
    pub r#type: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicApiRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicApiMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicApiMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<AnthropicMessage> for AnthropicApiMessage {
    fn from(value: AnthropicMessage) -> Self {
        Self {
            role: value.role.as_str(),
            content: value.content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicApiResponse {
    pub model: String,
    pub content: Vec<AnthropicApiContentBlock>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicApiContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl From<AnthropicApiResponse> for AnthropicResponse {
    fn from(value: AnthropicApiResponse) -> Self {
        let content = value
            .content
            .into_iter()
            .find_map(|block| match block {
                AnthropicApiContentBlock::Text { text } => Some(text),
                AnthropicApiContentBlock::Other => None,
            })
            .unwrap_or_default();

        Self {
            model: value.model,
            content,
            stop_reason: value.stop_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicApiStreamEvent {
    ContentBlockDelta {
        delta: AnthropicApiDelta,
    },
    MessageDelta {
        delta: AnthropicApiMessageDelta,
    },
    MessageStop,
    Error {
        error: AnthropicApiError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicApiDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicApiMessageDelta {
    pub stop_reason: Option<String>,
}
