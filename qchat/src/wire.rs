//! Wire shapes at the transport boundary: inbound payloads, JSON responses,
//! server-sent event frames and error bodies.

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use qcommon::{CompletionOptions, OwnerId};
use serde::{Deserialize, Serialize};

use crate::{
    ChatError, ChatErrorKind, ChatEvent, ChatTurnOutcome, ChatTurnRequest, ConversationSession,
    ConversationTurn,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatTurnPayload {
    pub question: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "isStreaming")]
    pub streaming: bool,
}

impl ChatTurnPayload {
    pub fn parse(body: &str) -> Result<Self, ChatError> {
        serde_json::from_str(body)
            .map_err(|err| ChatError::invalid_request(format!("malformed request body: {err}")))
    }

    pub fn into_request(self, owner_id: OwnerId) -> ChatTurnRequest {
        let mut options = CompletionOptions::default();
        if let Some(model) = self.model {
            options = options.with_model(model);
        }

        ChatTurnRequest {
            owner_id,
            question: self.question,
            options,
        }
    }
}

fn rfc3339(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub turn_id: String,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: String,
}

impl From<&ConversationTurn> for ChatTurnResponse {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            turn_id: turn.id.to_string(),
            session_id: turn.session_id.to_string(),
            question: turn.question.clone(),
            answer: turn.answer.clone(),
            created_at: rfc3339(turn.created_at),
        }
    }
}

impl From<&ChatTurnOutcome> for ChatTurnResponse {
    fn from(outcome: &ChatTurnOutcome) -> Self {
        let mut response = Self::from(&outcome.turn);
        response.session_id = outcome.session_id.to_string();
        response
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ConversationSession> for SessionSummary {
    fn from(session: &ConversationSession) -> Self {
        Self {
            session_id: session.id.to_string(),
            created_at: rfc3339(session.created_at),
            updated_at: rfc3339(session.updated_at),
        }
    }
}

/// JSON error body. Provider failures carry their canonical kind; chat-layer
/// failures carry the chat kind and no provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub canonical_kind: String,
    pub provider_name: Option<String>,
    pub retryable: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: u16,
    pub body: ErrorBody,
}

impl ErrorResponse {
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|_| {
            format!(
                "{{\"statusCode\":{},\"message\":\"internal error\"}}",
                self.status
            )
        })
    }
}

pub fn status_for(error: &ChatError) -> u16 {
    if let Some(canonical) = &error.provider_error {
        return canonical.transport_status();
    }

    match error.kind {
        ChatErrorKind::InvalidRequest => 400,
        ChatErrorKind::Forbidden => 403,
        ChatErrorKind::NotFound => 404,
        ChatErrorKind::Conflict => 409,
        ChatErrorKind::AdmissionDenied => 429,
        ChatErrorKind::Provider | ChatErrorKind::Store => 500,
    }
}

impl From<&ChatError> for ErrorResponse {
    fn from(error: &ChatError) -> Self {
        let status = status_for(error);
        let body = match &error.provider_error {
            Some(canonical) => ErrorBody {
                status_code: status,
                canonical_kind: canonical.kind.as_str().to_string(),
                provider_name: Some(canonical.provider.as_str().to_string()),
                retryable: canonical.retryable,
                message: canonical.user_message().to_string(),
            },
            None => ErrorBody {
                status_code: status,
                canonical_kind: error.kind.as_str().to_string(),
                provider_name: None,
                retryable: error.is_retryable(),
                message: error.message.clone(),
            },
        };

        Self { status, body }
    }
}

impl From<ChatError> for ErrorResponse {
    fn from(error: ChatError) -> Self {
        Self::from(&error)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionData<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageData<'a> {
    text_fragment: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DoneData<'a> {
    turn_id: &'a str,
    session_id: &'a str,
}

/// JSON `data` payload of one stream event.
pub fn event_data(event: &ChatEvent) -> String {
    let encoded = match event {
        ChatEvent::Session { session_id } => serde_json::to_string(&SessionData {
            session_id: session_id.as_str(),
        }),
        ChatEvent::Message { fragment } => serde_json::to_string(&MessageData {
            text_fragment: fragment,
        }),
        ChatEvent::Done {
            turn_id,
            session_id,
        } => serde_json::to_string(&DoneData {
            turn_id: turn_id.as_str(),
            session_id: session_id.as_str(),
        }),
        ChatEvent::Error(error) => return ErrorResponse::from(error).to_json(),
    };

    encoded.unwrap_or_else(|_| "{}".to_string())
}

/// `event: <name>\ndata: <json>\n\n`
pub fn render_sse(event: &ChatEvent) -> String {
    format!("event: {}\ndata: {}\n\n", event.name(), event_data(event))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use qcommon::{SessionId, TurnId};
    use qprovider::{BackendFailure, ProviderId, normalize};

    use super::*;

    #[test]
    fn payload_accepts_streaming_alias() {
        let payload =
            ChatTurnPayload::parse(r#"{"question":"hi","model":"gpt-4o","isStreaming":true}"#)
                .expect("parse");
        assert!(payload.streaming);
        assert_eq!(payload.model.as_deref(), Some("gpt-4o"));

        let plain = ChatTurnPayload::parse(r#"{"question":"hi"}"#).expect("parse");
        assert!(!plain.streaming);

        let request = plain.into_request(OwnerId::new("u1"));
        assert_eq!(request.options.model, None);
    }

    #[test]
    fn malformed_payload_is_invalid_request() {
        let error = ChatTurnPayload::parse(r#"{"model":"x"}"#).expect_err("missing question");
        assert_eq!(error.kind, ChatErrorKind::InvalidRequest);
    }

    #[test]
    fn turn_response_uses_camel_case_and_rfc3339() {
        let turn = ConversationTurn {
            id: TurnId::new("t1"),
            session_id: SessionId::new("s1"),
            question: "q".into(),
            answer: "a".into(),
            created_at: UNIX_EPOCH + Duration::from_millis(1_500),
        };
        let json = serde_json::to_value(ChatTurnResponse::from(&turn)).expect("json");

        assert_eq!(json["turnId"], "t1");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:01.500Z");
    }

    #[test]
    fn sse_frames_follow_event_data_layout() {
        let frame = render_sse(&ChatEvent::Message {
            fragment: "line\nbreak".into(),
        });
        assert_eq!(
            frame,
            "event: message\ndata: {\"textFragment\":\"line\\nbreak\"}\n\n"
        );

        let done = render_sse(&ChatEvent::Done {
            turn_id: TurnId::new("t"),
            session_id: SessionId::new("s"),
        });
        assert_eq!(done, "event: done\ndata: {\"turnId\":\"t\",\"sessionId\":\"s\"}\n\n");
    }

    #[test]
    fn provider_errors_render_identically_across_providers() {
        let bodies = [ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Mock]
            .into_iter()
            .map(|provider| {
                let error = ChatError::from(
                    normalize(provider, BackendFailure::status(429)).with_detail("slow down"),
                );
                ErrorResponse::from(&error)
            })
            .collect::<Vec<_>>();

        for response in &bodies {
            assert_eq!(response.status, 429);
            assert_eq!(response.body.canonical_kind, "RATE_LIMIT");
            assert!(response.body.retryable);
            assert_eq!(response.body.message, bodies[0].body.message);
            assert!(!response.to_json().contains("slow down"));
        }
    }

    #[test]
    fn chat_layer_errors_map_to_their_own_statuses() {
        assert_eq!(status_for(&ChatError::forbidden("x")), 403);
        assert_eq!(status_for(&ChatError::not_found("x")), 404);
        assert_eq!(status_for(&ChatError::admission_denied("x")), 429);
        assert_eq!(status_for(&ChatError::store("x")), 500);

        let body = ErrorResponse::from(ChatError::forbidden("not yours")).body;
        assert_eq!(body.canonical_kind, "FORBIDDEN");
        assert_eq!(body.provider_name, None);
    }
}
