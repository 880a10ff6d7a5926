//! Memory backend trait, backend selection and construction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use qchat::{ConversationSession, ConversationStore, ConversationTurn};
use qcommon::{BoxFuture, OwnerId, SessionId};

use crate::adapter::MemoryConversationStore;
use crate::backends::postgres::{PostgresMemoryBackend, PostgresMemoryBackendConfig};
use crate::backends::sqlite::{SqliteMemoryBackend, default_sqlite_path};
use crate::error::MemoryError;

pub trait MemoryBackend: Send + Sync {
    /// Newest session of `owner_id` updated after `active_since`, otherwise
    /// `candidate` after inserting it. Atomic per owner.
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> BoxFuture<'a, Result<ConversationSession, MemoryError>>;

    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ConversationSession>, MemoryError>>;

    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, MemoryError>>;

    fn load_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<ConversationTurn>, MemoryError>>;

    fn append_turn<'a>(&'a self, turn: ConversationTurn)
    -> BoxFuture<'a, Result<(), MemoryError>>;

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<bool, MemoryError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryBackendConfig {
    Sqlite { path: PathBuf },
    Postgres(PostgresMemoryBackendConfig),
    /// Private in-memory SQLite database, gone when the process exits.
    InMemory,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_memory_backend(
    config: MemoryBackendConfig,
) -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    match config {
        MemoryBackendConfig::Sqlite { path } => Ok(Arc::new(SqliteMemoryBackend::new(path)?)),
        MemoryBackendConfig::Postgres(config) => Ok(Arc::new(PostgresMemoryBackend::new(config)?)),
        MemoryBackendConfig::InMemory => Ok(Arc::new(SqliteMemoryBackend::new_in_memory()?)),
    }
}

pub fn create_default_memory_backend() -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    create_memory_backend(MemoryBackendConfig::default())
}

/// Backend for `config` wrapped as a chat [`ConversationStore`].
pub fn create_conversation_store(
    config: MemoryBackendConfig,
) -> Result<Arc<dyn ConversationStore>, MemoryError> {
    let backend = create_memory_backend(config)?;
    Ok(Arc::new(MemoryConversationStore::new(backend)))
}
