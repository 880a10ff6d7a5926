//! Session and turn persistence with a qchat store adapter.
//!
//! ```rust
//! use qmemory::{MemoryBackendConfig, create_conversation_store};
//!
//! let store = create_conversation_store(MemoryBackendConfig::InMemory)
//!     .expect("in-memory sqlite opens");
//! # let _ = store;
//! ```

mod adapter;
mod backend;
mod backends;
mod error;

pub mod prelude {
    pub use crate::{
        MemoryBackend, MemoryBackendConfig, MemoryConversationStore, MemoryError,
        MemoryErrorKind, PostgresMemoryBackend, PostgresMemoryBackendConfig, SqliteMemoryBackend,
        create_conversation_store, create_default_memory_backend, create_memory_backend,
    };
}

pub use adapter::MemoryConversationStore;
pub use backend::{
    MemoryBackend, MemoryBackendConfig, create_conversation_store, create_default_memory_backend,
    create_memory_backend,
};
pub use backends::postgres::{PostgresMemoryBackend, PostgresMemoryBackendConfig};
pub use backends::sqlite::SqliteMemoryBackend;
pub use error::{MemoryError, MemoryErrorKind};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    use futures_util::StreamExt;
    use qchat::{
        ChatErrorKind, ChatEvent, ChatService, ChatTurnRequest, ConversationStore,
        SessionManager,
    };
    use qcommon::{ManualClock, OwnerId, SessionId};
    use qprovider::adapters::mock::MockProvider;

    use crate::{
        MemoryBackendConfig, MemoryConversationStore, SqliteMemoryBackend,
        create_conversation_store,
    };

    fn service(store: Arc<dyn ConversationStore>, clock: Arc<ManualClock>) -> ChatService {
        ChatService::builder(Arc::new(MockProvider::instant()))
            .sessions(SessionManager::new(store).with_clock(clock))
            .build()
    }

    #[tokio::test]
    async fn chat_turns_persist_through_sqlite_store() {
        let store = create_conversation_store(MemoryBackendConfig::InMemory).expect("store");
        let clock = Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
        let service = service(store.clone(), clock.clone());

        let first = service
            .run_turn(ChatTurnRequest::new("u1", "hello"))
            .await
            .expect("first");
        clock.advance(Duration::from_secs(60));

        let events = service
            .stream_turn(ChatTurnRequest::new("u1", "again"))
            .collect::<Vec<_>>()
            .await;
        assert!(matches!(events.last(), Some(ChatEvent::Done { .. })));

        let turns = store.list_turns(&first.session_id).await.expect("turns");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].question, "hello");
        assert_eq!(turns[1].question, "again");

        let history = service
            .sessions()
            .build_history(&first.session_id, "third")
            .await
            .expect("history");
        assert_eq!(history.len(), 6);
    }

    #[tokio::test]
    async fn store_errors_map_to_chat_kinds() {
        let backend = Arc::new(SqliteMemoryBackend::new_in_memory().expect("sqlite"));
        let store = MemoryConversationStore::new(backend);
        let clock = Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_000)));
        let service = service(Arc::new(store), clock);

        let error = service
            .sessions()
            .append_turn(&SessionId::new("missing"), "q", "a")
            .await
            .expect_err("missing session");
        assert_eq!(error.kind, ChatErrorKind::NotFound);

        let error = service
            .sessions()
            .session_turns(&OwnerId::new("u1"), &SessionId::new("missing"))
            .await
            .expect_err("missing session");
        assert_eq!(error.kind, ChatErrorKind::NotFound);
    }
}
