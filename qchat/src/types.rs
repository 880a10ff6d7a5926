//! Session, turn and chat event types.

use std::pin::Pin;
use std::time::{Duration, SystemTime};

use futures_core::Stream;
use qcommon::{CompletionOptions, OwnerId, SessionId, TurnId};

use crate::ChatError;

/// A run of turns by one owner, kept alive by activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub id: SessionId,
    pub owner_id: OwnerId,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl ConversationSession {
    pub fn new(id: SessionId, owner_id: OwnerId, now: SystemTime) -> Self {
        Self {
            id,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active while less than `window` has passed since the last update.
    pub fn is_active(&self, now: SystemTime, window: Duration) -> bool {
        match now.duration_since(self.updated_at) {
            Ok(idle) => idle < window,
            // updated in the future relative to `now`
            Err(_) => true,
        }
    }
}

/// One completed question/answer exchange. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub session_id: SessionId,
    pub question: String,
    pub answer: String,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnRequest {
    pub owner_id: OwnerId,
    pub question: String,
    pub options: CompletionOptions,
}

impl ChatTurnRequest {
    pub fn new(owner_id: impl Into<OwnerId>, question: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            question: question.into(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options = self.options.with_model(model);
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnOutcome {
    pub turn: ConversationTurn,
    pub session_id: SessionId,
}

/// Events of one streamed turn: `Session`, any number of `Message`, then
/// exactly one of `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Session {
        session_id: SessionId,
    },
    Message {
        fragment: String,
    },
    Done {
        turn_id: TurnId,
        session_id: SessionId,
    },
    Error(ChatError),
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Message { .. } => "message",
            Self::Done { .. } => "done",
            Self::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error(_))
    }
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'static>>;

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn session_activity_uses_strict_window() {
        let start = UNIX_EPOCH + Duration::from_secs(10_000);
        let session = ConversationSession::new(SessionId::new("s"), OwnerId::new("u"), start);
        let window = Duration::from_secs(30 * 60);

        assert!(session.is_active(start + Duration::from_secs(29 * 60), window));
        assert!(!session.is_active(start + window, window));
        assert!(!session.is_active(start + Duration::from_secs(31 * 60), window));
    }

    #[test]
    fn event_names_match_wire_names() {
        assert_eq!(
            ChatEvent::Session {
                session_id: SessionId::new("s")
            }
            .name(),
            "session"
        );
        assert_eq!(
            ChatEvent::Message {
                fragment: "x".into()
            }
            .name(),
            "message"
        );
        assert!(ChatEvent::Error(ChatError::store("boom")).is_terminal());
    }
}
