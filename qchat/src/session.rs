//! Session continuity: which session a message belongs to and the history
//! replayed to the model.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use qcommon::{Clock, OwnerId, SessionId, SystemClock, TurnId};
use qprovider::ChatMessage;

use crate::{ChatError, ConversationSession, ConversationStore, ConversationTurn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub inactivity_window: Duration,
    pub system_prompt: String,
}

impl SessionConfig {
    pub const DEFAULT_INACTIVITY_WINDOW: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_SYSTEM_PROMPT: &'static str =
        "You are a friendly and helpful AI assistant. Answer clearly and accurately.";

    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_window: Self::DEFAULT_INACTIVITY_WINDOW,
            system_prompt: Self::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: SessionConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The owner's active session, or a freshly persisted one.
    pub async fn resolve_session(
        &self,
        owner_id: &OwnerId,
    ) -> Result<ConversationSession, ChatError> {
        let now = self.clock.now();
        let active_since = now
            .checked_sub(self.config.inactivity_window)
            .unwrap_or(UNIX_EPOCH);
        let candidate = ConversationSession::new(SessionId::generate(), owner_id.clone(), now);

        self.store
            .find_or_create_active_session(owner_id, active_since, candidate)
            .await
    }

    pub async fn append_turn(
        &self,
        session_id: &SessionId,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<ConversationTurn, ChatError> {
        let turn = ConversationTurn {
            id: TurnId::generate(),
            session_id: session_id.clone(),
            question: question.into(),
            answer: answer.into(),
            created_at: self.clock.now(),
        };

        self.store.record_turn(turn.clone()).await?;
        Ok(turn)
    }

    /// `[system, user, assistant, ..., user(new_question)]` for the session.
    pub async fn build_history(
        &self,
        session_id: &SessionId,
        new_question: &str,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let turns = self.store.list_turns(session_id).await?;

        let mut history = Vec::with_capacity(turns.len() * 2 + 2);
        history.push(ChatMessage::system(self.config.system_prompt.clone()));
        for turn in turns {
            history.push(ChatMessage::user(turn.question));
            history.push(ChatMessage::assistant(turn.answer));
        }
        history.push(ChatMessage::user(new_question));

        Ok(history)
    }

    pub async fn session_turns(
        &self,
        owner_id: &OwnerId,
        session_id: &SessionId,
    ) -> Result<Vec<ConversationTurn>, ChatError> {
        self.owned_session(owner_id, session_id).await?;
        self.store.list_turns(session_id).await
    }

    pub async fn sessions_for_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<ConversationSession>, ChatError> {
        self.store.list_sessions(owner_id).await
    }

    pub async fn delete_session(
        &self,
        owner_id: &OwnerId,
        session_id: &SessionId,
    ) -> Result<(), ChatError> {
        self.owned_session(owner_id, session_id).await?;
        if !self.store.delete_session(session_id).await? {
            return Err(ChatError::not_found(format!(
                "session '{session_id}' does not exist"
            )));
        }
        Ok(())
    }

    async fn owned_session(
        &self,
        owner_id: &OwnerId,
        session_id: &SessionId,
    ) -> Result<ConversationSession, ChatError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("session '{session_id}' does not exist")))?;

        if &session.owner_id != owner_id {
            return Err(ChatError::forbidden(format!(
                "session '{session_id}' belongs to another user"
            )));
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use qcommon::ManualClock;
    use qprovider::Role;

    use super::*;
    use crate::{ChatErrorKind, InMemoryConversationStore};

    fn manager(clock: Arc<ManualClock>) -> SessionManager {
        SessionManager::new(Arc::new(InMemoryConversationStore::new())).with_clock(clock)
    }

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[tokio::test]
    async fn history_starts_with_single_system_message() {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = manager(clock.clone())
            .with_config(SessionConfig::default().with_system_prompt("be brief"));
        let owner = OwnerId::new("u1");

        let session = manager.resolve_session(&owner).await.expect("session");
        manager
            .append_turn(&session.id, "q1", "a1")
            .await
            .expect("turn 1");
        clock.advance(Duration::from_secs(5));
        manager
            .append_turn(&session.id, "q2", "a2")
            .await
            .expect("turn 2");

        let history = manager
            .build_history(&session.id, "q3")
            .await
            .expect("history");
        let shape = history
            .iter()
            .map(|m| (m.role(), m.content()))
            .collect::<Vec<_>>();
        assert_eq!(
            shape,
            vec![
                (Role::System, "be brief"),
                (Role::User, "q1"),
                (Role::Assistant, "a1"),
                (Role::User, "q2"),
                (Role::Assistant, "a2"),
                (Role::User, "q3"),
            ]
        );
    }

    #[tokio::test]
    async fn resolve_splits_after_inactivity_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = manager(clock.clone());
        let owner = OwnerId::new("u1");

        let first = manager.resolve_session(&owner).await.expect("first");
        manager
            .append_turn(&first.id, "q", "a")
            .await
            .expect("turn");

        clock.advance(Duration::from_secs(29 * 60));
        let same = manager.resolve_session(&owner).await.expect("same");
        assert_eq!(same.id, first.id);

        clock.advance(Duration::from_secs(31 * 60));
        let next = manager.resolve_session(&owner).await.expect("next");
        assert_ne!(next.id, first.id);
    }

    #[tokio::test]
    async fn session_turns_checks_ownership() {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = manager(clock);
        let owner = OwnerId::new("owner");
        let session = manager.resolve_session(&owner).await.expect("session");

        let error = manager
            .session_turns(&OwnerId::new("intruder"), &session.id)
            .await
            .expect_err("forbidden");
        assert_eq!(error.kind, ChatErrorKind::Forbidden);

        let error = manager
            .session_turns(&owner, &SessionId::new("missing"))
            .await
            .expect_err("missing");
        assert_eq!(error.kind, ChatErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_session_requires_owner() {
        let clock = Arc::new(ManualClock::new(start()));
        let manager = manager(clock);
        let owner = OwnerId::new("owner");
        let session = manager.resolve_session(&owner).await.expect("session");

        let error = manager
            .delete_session(&OwnerId::new("other"), &session.id)
            .await
            .expect_err("forbidden");
        assert_eq!(error.kind, ChatErrorKind::Forbidden);

        manager
            .delete_session(&owner, &session.id)
            .await
            .expect("deleted");
        assert!(manager
            .sessions_for_owner(&owner)
            .await
            .expect("list")
            .is_empty());
    }
}
