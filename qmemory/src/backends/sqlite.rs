use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use qchat::{ConversationSession, ConversationTurn};
use qcommon::{BoxFuture, OwnerId, SessionId, TurnId};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::backend::MemoryBackend;
use crate::error::MemoryError;

const SESSION_COLUMNS: &str =
    "session_id, owner_id, created_at_secs, created_at_nanos, updated_at_secs, updated_at_nanos";

#[derive(Debug)]
pub struct SqliteMemoryBackend {
    connection: Mutex<Connection>,
}

impl SqliteMemoryBackend {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let backend = Self {
            connection: Mutex::new(connection),
        };
        backend.initialize_schema()?;
        Ok(backend)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite backend lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                updated_at_secs INTEGER NOT NULL,
                updated_at_nanos INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_owner_updated
            ON sessions(owner_id, updated_at_secs, updated_at_nanos);

            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                turn_id TEXT NOT NULL UNIQUE,
                session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_session_created
            ON turns(session_id, created_at_secs, created_at_nanos, id);
            ",
        )
        .map_err(|error| {
            MemoryError::storage(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(())
    }

    fn newest_session(
        conn: &Connection,
        owner_id: &OwnerId,
    ) -> Result<Option<ConversationSession>, MemoryError> {
        let row = conn
            .query_row(
                &format!(
                    "
                    SELECT {SESSION_COLUMNS}
                    FROM sessions
                    WHERE owner_id = ?1
                    ORDER BY updated_at_secs DESC, updated_at_nanos DESC
                    LIMIT 1
                    "
                ),
                params![owner_id.as_str()],
                session_row,
            )
            .optional()
            .map_err(|error| {
                MemoryError::storage(format!("failed to query newest session: {error}"))
            })?;

        row.map(SessionRow::decode).transpose()
    }
}

struct SessionRow {
    session_id: String,
    owner_id: String,
    created_at: (i64, i64),
    updated_at: (i64, i64),
}

impl SessionRow {
    fn decode(self) -> Result<ConversationSession, MemoryError> {
        Ok(ConversationSession {
            id: SessionId::from(self.session_id),
            owner_id: OwnerId::from(self.owner_id),
            created_at: decode_system_time(self.created_at.0, self.created_at.1)?,
            updated_at: decode_system_time(self.updated_at.0, self.updated_at.1)?,
        })
    }
}

fn session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        session_id: row.get(0)?,
        owner_id: row.get(1)?,
        created_at: (row.get(2)?, row.get(3)?),
        updated_at: (row.get(4)?, row.get(5)?),
    })
}

impl MemoryBackend for SqliteMemoryBackend {
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> BoxFuture<'a, Result<ConversationSession, MemoryError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|error| MemoryError::storage(format!("failed to begin tx: {error}")))?;

            if let Some(session) = Self::newest_session(&tx, owner_id)?
                && session.updated_at > active_since
            {
                tx.commit()
                    .map_err(|error| MemoryError::storage(format!("failed to commit tx: {error}")))?;
                return Ok(session);
            }

            let (created_secs, created_nanos) = encode_system_time(candidate.created_at)?;
            let (updated_secs, updated_nanos) = encode_system_time(candidate.updated_at)?;
            let inserted = tx
                .execute(
                    &format!(
                        "INSERT OR IGNORE INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                    ),
                    params![
                        candidate.id.as_str(),
                        candidate.owner_id.as_str(),
                        created_secs,
                        created_nanos,
                        updated_secs,
                        updated_nanos,
                    ],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to insert session: {error}"))
                })?;

            if inserted == 0 {
                return Err(MemoryError::conflict(format!(
                    "session '{}' already exists",
                    candidate.id
                )));
            }

            tx.commit()
                .map_err(|error| MemoryError::storage(format!("failed to commit tx: {error}")))?;
            Ok(candidate)
        })
    }

    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ConversationSession>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let row = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
                    params![session_id.as_str()],
                    session_row,
                )
                .optional()
                .map_err(|error| {
                    MemoryError::storage(format!("failed to query session: {error}"))
                })?;

            row.map(SessionRow::decode).transpose()
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "
                    SELECT {SESSION_COLUMNS}
                    FROM sessions
                    WHERE owner_id = ?1
                    ORDER BY updated_at_secs DESC, updated_at_nanos DESC
                    "
                ))
                .map_err(|error| {
                    MemoryError::storage(format!("failed to prepare session query: {error}"))
                })?;
            let rows = stmt
                .query_map(params![owner_id.as_str()], session_row)
                .map_err(|error| {
                    MemoryError::storage(format!("failed to query session rows: {error}"))
                })?;

            let mut sessions = Vec::new();
            for row in rows {
                let row = row.map_err(|error| {
                    MemoryError::storage(format!("failed to read session row: {error}"))
                })?;
                sessions.push(row.decode()?);
            }
            Ok(sessions)
        })
    }

    fn load_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<ConversationTurn>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut stmt = conn
                .prepare(
                    "
                    SELECT turn_id, question, answer, created_at_secs, created_at_nanos
                    FROM turns
                    WHERE session_id = ?1
                    ORDER BY created_at_secs ASC, created_at_nanos ASC, id ASC
                    ",
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to prepare turn query: {error}"))
                })?;
            let rows = stmt
                .query_map(params![session_id.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(|error| {
                    MemoryError::storage(format!("failed to query turn rows: {error}"))
                })?;

            let mut turns = Vec::new();
            for row in rows {
                let (turn_id, question, answer, secs, nanos) = row.map_err(|error| {
                    MemoryError::storage(format!("failed to read turn row: {error}"))
                })?;
                turns.push(ConversationTurn {
                    id: TurnId::from(turn_id),
                    session_id: session_id.clone(),
                    question,
                    answer,
                    created_at: decode_system_time(secs, nanos)?,
                });
            }
            Ok(turns)
        })
    }

    fn append_turn<'a>(
        &'a self,
        turn: ConversationTurn,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|error| MemoryError::storage(format!("failed to begin tx: {error}")))?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM sessions WHERE session_id = ?1",
                    params![turn.session_id.as_str()],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|error| {
                    MemoryError::storage(format!("failed to query session: {error}"))
                })?;
            if exists.is_none() {
                return Err(MemoryError::not_found(format!(
                    "session '{}' does not exist",
                    turn.session_id
                )));
            }

            let (secs, nanos) = encode_system_time(turn.created_at)?;
            tx.execute(
                "
                INSERT INTO turns (
                    turn_id,
                    session_id,
                    question,
                    answer,
                    created_at_secs,
                    created_at_nanos
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    turn.id.as_str(),
                    turn.session_id.as_str(),
                    &turn.question,
                    &turn.answer,
                    secs,
                    nanos,
                ],
            )
            .map_err(|error| MemoryError::storage(format!("failed to insert turn: {error}")))?;

            tx.execute(
                "
                UPDATE sessions
                SET updated_at_secs = ?2, updated_at_nanos = ?3
                WHERE session_id = ?1
                  AND (updated_at_secs < ?2 OR (updated_at_secs = ?2 AND updated_at_nanos < ?3))
                ",
                params![turn.session_id.as_str(), secs, nanos],
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to refresh session timestamp: {error}"))
            })?;

            tx.commit()
                .map_err(|error| MemoryError::storage(format!("failed to commit tx: {error}")))?;
            Ok(())
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<bool, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let deleted = conn
                .execute(
                    "DELETE FROM sessions WHERE session_id = ?1",
                    params![session_id.as_str()],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to delete session: {error}"))
                })?;
            Ok(deleted > 0)
        })
    }
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".quill").join("quill.sqlite3");
    }

    PathBuf::from("quill.sqlite3")
}

fn encode_system_time(value: SystemTime) -> Result<(i64, i64), MemoryError> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        MemoryError::invalid_request(format!("timestamp predates unix epoch: {error}"))
    })?;
    Ok((
        duration.as_secs() as i64,
        i64::from(duration.subsec_nanos()),
    ))
}

fn decode_system_time(seconds: i64, nanos: i64) -> Result<SystemTime, MemoryError> {
    if seconds < 0 {
        return Err(MemoryError::storage(format!(
            "timestamp seconds must be non-negative, got {seconds}"
        )));
    }
    if !(0..1_000_000_000).contains(&nanos) {
        return Err(MemoryError::storage(format!(
            "timestamp nanos must be in [0, 1_000_000_000), got {nanos}"
        )));
    }
    Ok(UNIX_EPOCH + Duration::new(seconds as u64, nanos as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryErrorKind;

    fn at(secs: u64, nanos: u32) -> SystemTime {
        UNIX_EPOCH + Duration::new(secs, nanos)
    }

    fn session(id: &str, owner: &str, created: SystemTime) -> ConversationSession {
        ConversationSession::new(SessionId::new(id), OwnerId::new(owner), created)
    }

    fn turn(id: &str, session: &str, created: SystemTime) -> ConversationTurn {
        ConversationTurn {
            id: TurnId::new(id),
            session_id: SessionId::new(session),
            question: format!("question {id}"),
            answer: format!("answer {id}"),
            created_at: created,
        }
    }

    #[tokio::test]
    async fn active_session_is_reused_and_stale_one_replaced() {
        let backend = SqliteMemoryBackend::new_in_memory().expect("sqlite");
        let owner = OwnerId::new("u1");

        let first = backend
            .find_or_create_active_session(&owner, at(0, 0), session("s1", "u1", at(100, 5)))
            .await
            .expect("create");
        let reused = backend
            .find_or_create_active_session(&owner, at(100, 4), session("s2", "u1", at(101, 0)))
            .await
            .expect("reuse");
        assert_eq!(reused, first);

        let replaced = backend
            .find_or_create_active_session(&owner, at(100, 5), session("s3", "u1", at(2_000, 0)))
            .await
            .expect("replace");
        assert_eq!(replaced.id, SessionId::new("s3"));

        let listed = backend.list_sessions(&owner).await.expect("list");
        assert_eq!(
            listed.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["s3", "s1"]
        );
    }

    #[tokio::test]
    async fn turns_round_trip_in_created_order_and_refresh_session() {
        let backend = SqliteMemoryBackend::new_in_memory().expect("sqlite");
        let owner = OwnerId::new("u1");
        backend
            .find_or_create_active_session(&owner, at(0, 0), session("s1", "u1", at(10, 0)))
            .await
            .expect("create");

        backend
            .append_turn(turn("t2", "s1", at(30, 7)))
            .await
            .expect("t2");
        backend
            .append_turn(turn("t1", "s1", at(20, 0)))
            .await
            .expect("t1");

        let turns = backend
            .load_turns(&SessionId::new("s1"))
            .await
            .expect("turns");
        assert_eq!(
            turns.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t1", "t2"]
        );
        assert_eq!(turns[1].created_at, at(30, 7));

        let stored = backend
            .load_session(&SessionId::new("s1"))
            .await
            .expect("load")
            .expect("exists");
        assert_eq!(stored.updated_at, at(30, 7));
        assert_eq!(stored.created_at, at(10, 0));
    }

    #[tokio::test]
    async fn append_turn_requires_existing_session() {
        let backend = SqliteMemoryBackend::new_in_memory().expect("sqlite");
        let error = backend
            .append_turn(turn("t1", "missing", at(1, 0)))
            .await
            .expect_err("missing session");
        assert_eq!(error.kind, MemoryErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deleting_session_cascades_to_turns() {
        let backend = SqliteMemoryBackend::new_in_memory().expect("sqlite");
        let owner = OwnerId::new("u1");
        backend
            .find_or_create_active_session(&owner, at(0, 0), session("s1", "u1", at(10, 0)))
            .await
            .expect("create");
        backend
            .append_turn(turn("t1", "s1", at(20, 0)))
            .await
            .expect("turn");

        assert!(backend
            .delete_session(&SessionId::new("s1"))
            .await
            .expect("delete"));
        assert!(!backend
            .delete_session(&SessionId::new("s1"))
            .await
            .expect("delete again"));

        let conn = backend.connection().expect("connection");
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
            .expect("count");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn file_backed_database_persists_across_reopen() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("qmemory-sqlite-{unique}"))
            .join("quill.sqlite3");

        {
            let backend = SqliteMemoryBackend::new(&path).expect("open");
            backend
                .find_or_create_active_session(
                    &OwnerId::new("u1"),
                    at(0, 0),
                    session("s1", "u1", at(10, 0)),
                )
                .await
                .expect("create");
        }

        let reopened = SqliteMemoryBackend::new(&path).expect("reopen");
        let found = reopened
            .load_session(&SessionId::new("s1"))
            .await
            .expect("load");
        assert!(found.is_some());

        let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    }
}
