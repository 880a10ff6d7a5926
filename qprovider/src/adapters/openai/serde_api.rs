//! OpenAI HTTP payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};

use crate::BackendFailure;

use super::types::{OpenAiMessage, OpenAiRequest, OpenAiResponse};

pub(crate) fn build_api_request(request: OpenAiRequest) -> OpenAiApiRequest {
    OpenAiApiRequest {
        model: request.model,
        messages: request
            .messages
            .into_iter()
            .map(OpenAiApiMessage::from)
            .collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: request.stream,
    }
}

/// Reads `{"error": {...}}` bodies, returning the failure with the given status.
pub(crate) fn parse_error_body(status: Option<u16>, body: &str) -> BackendFailure {
    let mut failure = BackendFailure {
        status,
        ..BackendFailure::default()
    };

    match serde_json::from_str::<OpenAiApiErrorEnvelope>(body) {
        Ok(envelope) => {
            if failure.status.is_none() {
                failure.status = envelope.error.r#type.as_deref().and_then(status_for_error_type);
            }
            if let Some(code) = envelope.error.code {
                failure = failure.with_subcode(code);
            }
            failure.with_detail(envelope.error.message)
        }
        Err(_) if body.trim().is_empty() => failure,
        Err(_) => failure.with_detail(body.trim().to_string()),
    }
}

/// Parses one streamed `data:` payload; an embedded `error` object fails it.
pub(crate) fn parse_stream_payload(payload: &str) -> Result<OpenAiApiStreamResponse, BackendFailure> {
    let parsed: OpenAiApiStreamResponse = serde_json::from_str(payload)
        .map_err(|err| BackendFailure::transport(err.to_string()))?;

    if parsed.error.is_some() {
        return Err(parse_error_body(None, payload));
    }

    Ok(parsed)
}

/// Status implied by an error `type` when no HTTP status is available, as for
/// errors delivered inside an event stream.
pub(crate) fn status_for_error_type(error_type: &str) -> Option<u16> {
    match error_type {
        "invalid_request_error" => Some(400),
        "authentication_error" | "invalid_api_key" => Some(401),
        "not_found_error" => Some(404),
        "rate_limit_error" | "rate_limit_exceeded" | "insufficient_quota" => Some(429),
        "server_error" | "api_error" => Some(500),
        "service_unavailable" => Some(503),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<OpenAiMessage> for OpenAiApiMessage {
    fn from(value: OpenAiMessage) -> Self {
        Self {
            role: value.role.as_str(),
            content: value.content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiResponse {
    pub model: String,
    pub choices: Vec<OpenAiApiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiAssistantMessage {
    pub content: Option<String>,
}

impl TryFrom<OpenAiApiResponse> for OpenAiResponse {
    type Error = BackendFailure;

    fn try_from(value: OpenAiApiResponse) -> Result<Self, Self::Error> {
        let choice = value
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendFailure::transport("OpenAI response did not include choices"))?;

        Ok(Self {
            model: value.model,
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiApiStreamChoice>,
    #[serde(default)]
    pub error: Option<OpenAiApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamChoice {
    pub delta: OpenAiApiStreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamDelta {
    pub content: Option<String>,
}
