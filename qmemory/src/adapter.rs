//! Adapter that exposes qmemory as a qchat ConversationStore.

use std::sync::Arc;
use std::time::SystemTime;

use qchat::{ChatError, ChatFuture, ConversationSession, ConversationStore, ConversationTurn};
use qcommon::{OwnerId, SessionId};

use crate::backend::MemoryBackend;

#[derive(Clone)]
pub struct MemoryConversationStore {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryConversationStore {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn MemoryBackend> {
        Arc::clone(&self.backend)
    }
}

impl ConversationStore for MemoryConversationStore {
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> ChatFuture<'a, Result<ConversationSession, ChatError>> {
        Box::pin(async move {
            self.backend
                .find_or_create_active_session(owner_id, active_since, candidate)
                .await
                .map_err(ChatError::from)
        })
    }

    fn find_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<ConversationSession>, ChatError>> {
        Box::pin(async move {
            self.backend
                .load_session(session_id)
                .await
                .map_err(ChatError::from)
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> ChatFuture<'a, Result<Vec<ConversationSession>, ChatError>> {
        Box::pin(async move {
            self.backend
                .list_sessions(owner_id)
                .await
                .map_err(ChatError::from)
        })
    }

    fn list_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Vec<ConversationTurn>, ChatError>> {
        Box::pin(async move {
            self.backend
                .load_turns(session_id)
                .await
                .map_err(ChatError::from)
        })
    }

    fn record_turn<'a>(&'a self, turn: ConversationTurn) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move { self.backend.append_turn(turn).await.map_err(ChatError::from) })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            self.backend
                .delete_session(session_id)
                .await
                .map_err(ChatError::from)
        })
    }
}
