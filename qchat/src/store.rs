//! Conversation storage contracts and a basic in-memory implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::SystemTime;

use qcommon::{OwnerId, SessionId};

use crate::{ChatError, ConversationSession, ConversationTurn};

pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ConversationStore: Send + Sync {
    /// Returns the owner's newest session updated after `active_since`, or
    /// persists and returns `candidate` when there is none.
    ///
    /// Implementations perform the lookup and the insert as one atomic step
    /// per owner, so concurrent callers never create two active sessions.
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> ChatFuture<'a, Result<ConversationSession, ChatError>>;

    fn find_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<ConversationSession>, ChatError>>;

    /// Sessions of one owner, most recently updated first.
    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> ChatFuture<'a, Result<Vec<ConversationSession>, ChatError>>;

    /// Turns of one session in `created_at` order.
    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<ConversationTurn>, ChatError>>;

    /// Stores `turn` and moves its session's `updated_at` to the turn's
    /// `created_at`.
    fn record_turn<'a>(&'a self, turn: ConversationTurn) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Removes a session and its turns. Returns whether anything was removed.
    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<bool, ChatError>>;
}

#[derive(Debug, Default)]
struct StoreState {
    sessions: HashMap<SessionId, ConversationSession>,
    turns: HashMap<SessionId, Vec<ConversationTurn>>,
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    state: Mutex<StoreState>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> ChatFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            let newest = state
                .sessions
                .values()
                .filter(|session| &session.owner_id == owner_id)
                .max_by_key(|session| session.updated_at);

            if let Some(session) = newest.filter(|session| session.updated_at > active_since) {
                return Ok(session.clone());
            }

            if state.sessions.contains_key(&candidate.id) {
                return Err(ChatError::conflict(format!(
                    "session '{}' already exists",
                    candidate.id
                )));
            }

            state
                .sessions
                .insert(candidate.id.clone(), candidate.clone());
            Ok(candidate)
        })
    }

    fn find_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<ConversationSession>, ChatError>> {
        Box::pin(async move {
            let state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            Ok(state.sessions.get(session_id).cloned())
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> ChatFuture<'a, Result<Vec<ConversationSession>, ChatError>> {
        Box::pin(async move {
            let state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            let mut sessions = state
                .sessions
                .values()
                .filter(|session| &session.owner_id == owner_id)
                .cloned()
                .collect::<Vec<_>>();
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(sessions)
        })
    }

    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<ConversationTurn>, ChatError>> {
        Box::pin(async move {
            let state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            let mut turns = state.turns.get(session_id).cloned().unwrap_or_default();
            // stable: equal timestamps keep insertion order
            turns.sort_by_key(|turn| turn.created_at);
            Ok(turns)
        })
    }

    fn record_turn<'a>(&'a self, turn: ConversationTurn) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            let session = state.sessions.get_mut(&turn.session_id).ok_or_else(|| {
                ChatError::not_found(format!("session '{}' does not exist", turn.session_id))
            })?;
            session.updated_at = session.updated_at.max(turn.created_at);

            state
                .turns
                .entry(turn.session_id.clone())
                .or_default()
                .push(turn);
            Ok(())
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ChatError::store("conversation store lock poisoned"))?;

            state.turns.remove(session_id);
            Ok(state.sessions.remove(session_id).is_some())
        })
    }
}
