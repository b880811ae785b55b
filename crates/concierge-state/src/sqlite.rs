//! SQLite implementation of the durable tier.
//!
//! Uses a single shared connection behind a mutex, bridged to the async
//! world with `spawn_blocking`. WAL mode is enabled so concurrent readers
//! are not serialized behind the writer.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};

use concierge_core::{ConversationId, ConversationTurn, SessionId, SessionRecord, StateError};

use crate::durable::DurableStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    issued_at  TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    revoked    INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS turns (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL,
    payload         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id, seq);
";

/// Durable store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and run schema setup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StateError::durable(format!("open failed: {e}")))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, for tests and the offline CLI.
    pub fn in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StateError::durable(format!("open failed: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StateError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StateError::durable(format!("pragma setup failed: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StateError::durable(format!("schema setup failed: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StateError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StateError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StateError::durable(format!("lock poisoned: {e}")))?;
            f(&guard)
        })
        .await
        .map_err(|e| StateError::durable(format!("blocking task failed: {e}")))?
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, bool)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get::<_, i64>(4)? != 0,
    ))
}

fn parse_session(
    (id, user_id, issued_at, expires_at, revoked): (String, String, String, String, bool),
) -> Result<SessionRecord, StateError> {
    let parse_ts = |s: &str| {
        s.parse::<chrono::DateTime<chrono::Utc>>()
            .map_err(|e| StateError::durable(format!("bad timestamp '{s}': {e}")))
    };
    Ok(SessionRecord {
        id: SessionId::parse(&id).map_err(|e| StateError::durable(format!("bad session id: {e}")))?,
        user_id: concierge_core::UserId::parse(&user_id)
            .map_err(|e| StateError::durable(format!("bad user id: {e}")))?,
        issued_at: parse_ts(&issued_at)?,
        expires_at: parse_ts(&expires_at)?,
        revoked,
    })
}

#[async_trait::async_trait]
impl DurableStore for SqliteStore {
    async fn put_session(&self, session: &SessionRecord) -> Result<(), StateError> {
        let s = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sessions (id, user_id, issued_at, expires_at, revoked)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    s.id.as_str(),
                    s.user_id.as_str(),
                    s.issued_at.to_rfc3339(),
                    s.expires_at.to_rfc3339(),
                    s.revoked as i64,
                ],
            )
            .map_err(|e| StateError::durable(format!("session insert failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StateError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, issued_at, expires_at, revoked
                     FROM sessions WHERE id = ?1",
                    params![id.as_str()],
                    row_to_session,
                )
                .optional()
                .map_err(|e| StateError::durable(format!("session select failed: {e}")))?;
            row.map(parse_session).transpose()
        })
        .await
    }

    async fn revoke_session(&self, id: &SessionId) -> Result<(), StateError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE sessions SET revoked = 1 WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| StateError::durable(format!("session revoke failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), StateError> {
        let payload = serde_json::to_string(turn).map_err(|source| StateError::Serialization {
            context: "conversation turn",
            source,
        })?;
        let conversation_id = turn.conversation_id.clone();
        let created_at = turn.created_at.to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO turns (conversation_id, payload, created_at) VALUES (?1, ?2, ?3)",
                params![conversation_id.as_str(), payload, created_at],
            )
            .map_err(|e| StateError::durable(format!("turn insert failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn recent_turns(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StateError> {
        let conversation_id = conversation_id.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT payload FROM turns
                     WHERE conversation_id = ?1
                     ORDER BY seq DESC LIMIT ?2",
                )
                .map_err(|e| StateError::durable(format!("turn select failed: {e}")))?;
            let payloads = stmt
                .query_map(params![conversation_id.as_str(), limit as i64], |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| StateError::durable(format!("turn select failed: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StateError::durable(format!("turn row read failed: {e}")))?;

            // Query returns newest first; callers expect oldest first.
            let mut turns = payloads
                .into_iter()
                .map(|p| {
                    serde_json::from_str(&p).map_err(|source| StateError::Serialization {
                        context: "conversation turn",
                        source,
                    })
                })
                .collect::<Result<Vec<ConversationTurn>, _>>()?;
            turns.reverse();
            Ok(turns)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{TurnMessage, TurnMetadata, UserId};

    fn sample_session() -> SessionRecord {
        SessionRecord::new(
            SessionId::generate(),
            UserId::parse("user-1").unwrap(),
            chrono::Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn session_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let session = sample_session();
        store.put_session(&session).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.user_id, session.user_id);
        assert!(!loaded.revoked);
    }

    #[tokio::test]
    async fn revoke_is_persistent() {
        let store = SqliteStore::in_memory().unwrap();
        let session = sample_session();
        store.put_session(&session).await.unwrap();
        store.revoke_session(&session.id).await.unwrap();

        let loaded = store.get_session(&session.id).await.unwrap().unwrap();
        assert!(loaded.revoked);
    }

    #[tokio::test]
    async fn missing_session_reads_as_none() {
        let store = SqliteStore::in_memory().unwrap();
        let got = store.get_session(&SessionId::generate()).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn turns_come_back_oldest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let conv = ConversationId::generate();
        for i in 0..5 {
            let turn = ConversationTurn::new(
                conv.clone(),
                vec![TurnMessage::user(format!("msg {i}"))],
                TurnMetadata::default(),
            );
            store.append_turn(&turn).await.unwrap();
        }

        let turns = store.recent_turns(&conv, 3).await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].messages[0].text, "msg 2");
        assert_eq!(turns[2].messages[0].text, "msg 4");
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let session = sample_session();
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_session(&session).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_session(&session.id).await.unwrap();
        assert!(loaded.is_some());
    }
}
