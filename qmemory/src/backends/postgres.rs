use std::time::SystemTime;

use qchat::{ConversationSession, ConversationTurn};
use qcommon::{BoxFuture, OwnerId, SessionId, TurnId};
use tokio::sync::OnceCell;
use tokio_postgres::{Client, NoTls, Row};

use crate::backend::MemoryBackend;
use crate::error::MemoryError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS quill_sessions (
        session_id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_quill_sessions_owner_updated
    ON quill_sessions(owner_id, updated_at DESC);

    CREATE TABLE IF NOT EXISTS quill_turns (
        id BIGSERIAL PRIMARY KEY,
        turn_id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL REFERENCES quill_sessions(session_id) ON DELETE CASCADE,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_quill_turns_session_created
    ON quill_turns(session_id, created_at, id);
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresMemoryBackendConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl PostgresMemoryBackendConfig {
    pub const DEFAULT_PORT: u16 = 5432;
}

/// PostgreSQL backend. Opens one connection per operation; the schema is
/// created on first use.
#[derive(Debug)]
pub struct PostgresMemoryBackend {
    config: PostgresMemoryBackendConfig,
    schema_ready: OnceCell<()>,
}

impl PostgresMemoryBackend {
    pub fn new(config: PostgresMemoryBackendConfig) -> Result<Self, MemoryError> {
        if config.host.trim().is_empty() {
            return Err(MemoryError::invalid_request(
                "postgres host cannot be empty",
            ));
        }
        if config.database.trim().is_empty() {
            return Err(MemoryError::invalid_request(
                "postgres database cannot be empty",
            ));
        }
        if config.username.trim().is_empty() {
            return Err(MemoryError::invalid_request(
                "postgres username cannot be empty",
            ));
        }
        Ok(Self {
            config,
            schema_ready: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &PostgresMemoryBackendConfig {
        &self.config
    }

    async fn connect_client(&self) -> Result<Client, MemoryError> {
        let mut config = tokio_postgres::Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.dbname(&self.config.database);
        config.user(&self.config.username);
        config.password(&self.config.password);

        let (client, connection) = config.connect(NoTls).await.map_err(|error| {
            MemoryError::storage(format!("failed to connect to postgres: {error}"))
        })?;

        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::error!(
                    phase = "memory",
                    event = "postgres_connection_error",
                    error = %error
                );
            }
        });

        self.schema_ready
            .get_or_try_init(|| async {
                client.batch_execute(SCHEMA).await.map_err(|error| {
                    MemoryError::storage(format!("failed to initialize postgres schema: {error}"))
                })
            })
            .await?;

        Ok(client)
    }
}

fn session_from_row(row: &Row) -> ConversationSession {
    ConversationSession {
        id: SessionId::from(row.get::<_, String>("session_id")),
        owner_id: OwnerId::from(row.get::<_, String>("owner_id")),
        created_at: row.get::<_, SystemTime>("created_at"),
        updated_at: row.get::<_, SystemTime>("updated_at"),
    }
}

fn storage_error(action: &str) -> impl Fn(tokio_postgres::Error) -> MemoryError + '_ {
    move |error| MemoryError::storage(format!("failed to {action}: {error}"))
}

impl MemoryBackend for PostgresMemoryBackend {
    fn find_or_create_active_session<'a>(
        &'a self,
        owner_id: &'a OwnerId,
        active_since: SystemTime,
        candidate: ConversationSession,
    ) -> BoxFuture<'a, Result<ConversationSession, MemoryError>> {
        Box::pin(async move {
            let mut client = self.connect_client().await?;
            let tx = client
                .transaction()
                .await
                .map_err(storage_error("begin tx"))?;

            // serializes resolution per owner until commit
            tx.execute(
                "SELECT pg_advisory_xact_lock(hashtext($1))",
                &[&owner_id.as_str()],
            )
            .await
            .map_err(storage_error("acquire owner lock"))?;

            let newest = tx
                .query_opt(
                    "
                    SELECT session_id, owner_id, created_at, updated_at
                    FROM quill_sessions
                    WHERE owner_id = $1
                    ORDER BY updated_at DESC
                    LIMIT 1
                    ",
                    &[&owner_id.as_str()],
                )
                .await
                .map_err(storage_error("query newest session"))?
                .map(|row| session_from_row(&row));

            if let Some(session) = newest
                && session.updated_at > active_since
            {
                tx.commit().await.map_err(storage_error("commit tx"))?;
                return Ok(session);
            }

            let inserted = tx
                .execute(
                    "
                    INSERT INTO quill_sessions (session_id, owner_id, created_at, updated_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (session_id) DO NOTHING
                    ",
                    &[
                        &candidate.id.as_str(),
                        &candidate.owner_id.as_str(),
                        &candidate.created_at,
                        &candidate.updated_at,
                    ],
                )
                .await
                .map_err(storage_error("insert session"))?;

            if inserted == 0 {
                tx.rollback().await.map_err(storage_error("rollback tx"))?;
                return Err(MemoryError::conflict(format!(
                    "session '{}' already exists",
                    candidate.id
                )));
            }

            tx.commit().await.map_err(storage_error("commit tx"))?;
            Ok(candidate)
        })
    }

    fn load_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ConversationSession>, MemoryError>> {
        Box::pin(async move {
            let client = self.connect_client().await?;
            let row = client
                .query_opt(
                    "
                    SELECT session_id, owner_id, created_at, updated_at
                    FROM quill_sessions
                    WHERE session_id = $1
                    ",
                    &[&session_id.as_str()],
                )
                .await
                .map_err(storage_error("query session"))?;

            Ok(row.map(|row| session_from_row(&row)))
        })
    }

    fn list_sessions<'a>(
        &'a self,
        owner_id: &'a OwnerId,
    ) -> BoxFuture<'a, Result<Vec<ConversationSession>, MemoryError>> {
        Box::pin(async move {
            let client = self.connect_client().await?;
            let rows = client
                .query(
                    "
                    SELECT session_id, owner_id, created_at, updated_at
                    FROM quill_sessions
                    WHERE owner_id = $1
                    ORDER BY updated_at DESC
                    ",
                    &[&owner_id.as_str()],
                )
                .await
                .map_err(storage_error("query sessions"))?;

            Ok(rows.iter().map(session_from_row).collect())
        })
    }

    fn load_turns<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<ConversationTurn>, MemoryError>> {
        Box::pin(async move {
            let client = self.connect_client().await?;
            let rows = client
                .query(
                    "
                    SELECT turn_id, question, answer, created_at
                    FROM quill_turns
                    WHERE session_id = $1
                    ORDER BY created_at ASC, id ASC
                    ",
                    &[&session_id.as_str()],
                )
                .await
                .map_err(storage_error("query turns"))?;

            Ok(rows
                .iter()
                .map(|row| ConversationTurn {
                    id: TurnId::from(row.get::<_, String>("turn_id")),
                    session_id: session_id.clone(),
                    question: row.get("question"),
                    answer: row.get("answer"),
                    created_at: row.get("created_at"),
                })
                .collect())
        })
    }

    fn append_turn<'a>(
        &'a self,
        turn: ConversationTurn,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            let mut client = self.connect_client().await?;
            let tx = client
                .transaction()
                .await
                .map_err(storage_error("begin tx"))?;

            let touched = tx
                .execute(
                    "
                    UPDATE quill_sessions
                    SET updated_at = GREATEST(updated_at, $2)
                    WHERE session_id = $1
                    ",
                    &[&turn.session_id.as_str(), &turn.created_at],
                )
                .await
                .map_err(storage_error("refresh session timestamp"))?;

            if touched == 0 {
                tx.rollback().await.map_err(storage_error("rollback tx"))?;
                return Err(MemoryError::not_found(format!(
                    "session '{}' does not exist",
                    turn.session_id
                )));
            }

            tx.execute(
                "
                INSERT INTO quill_turns (turn_id, session_id, question, answer, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ",
                &[
                    &turn.id.as_str(),
                    &turn.session_id.as_str(),
                    &turn.question,
                    &turn.answer,
                    &turn.created_at,
                ],
            )
            .await
            .map_err(storage_error("insert turn"))?;

            tx.commit().await.map_err(storage_error("commit tx"))?;
            Ok(())
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<bool, MemoryError>> {
        Box::pin(async move {
            let client = self.connect_client().await?;
            let deleted = client
                .execute(
                    "DELETE FROM quill_sessions WHERE session_id = $1",
                    &[&session_id.as_str()],
                )
                .await
                .map_err(storage_error("delete session"))?;

            Ok(deleted > 0)
        })
    }
}
