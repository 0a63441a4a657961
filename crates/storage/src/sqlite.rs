//! SQLite session store.
//!
//! One table, one row per session:
//! - `sessions(id TEXT PRIMARY KEY, log TEXT, updated_at TEXT)`
//!
//! The log column holds the same JSON array the file store writes.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::error::StorageError;
use parley_core::message::MessageLog;
use parley_core::session::{SessionId, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed session store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a store from a connection URL (e.g. `sqlite://sessions.db`).
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Database(format!("Invalid SQLite URL: {e}")))?;
        // Every connection to :memory: is its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections).await
    }

    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect(options, 4).await?;
        info!("SQLite session store initialized at {}", path.display());
        Ok(store)
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Database(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY NOT NULL,
                log         TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("sessions table: {e}")))?;

        Ok(())
    }

    /// When the session was last written, if it exists.
    pub async fn updated_at(&self, id: &SessionId) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT updated_at FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(row.map(|r| r.get::<String, _>("updated_at")))
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<MessageLog>, StorageError> {
        let row = sqlx::query("SELECT log FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row.get("log");
                let log = serde_json::from_str(&raw)
                    .map_err(|e| StorageError::Serialization(format!("session {id}: {e}")))?;
                Ok(Some(log))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, id: &SessionId, log: &MessageLog) -> Result<(), StorageError> {
        if id.as_str().is_empty() {
            return Err(StorageError::InvalidSessionId("empty id".into()));
        }
        let raw =
            serde_json::to_string(log).map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, log, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET log = excluded.log, updated_at = excluded.updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(session_id = %id, entries = log.len(), "Session saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM sessions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|r| SessionId(r.get::<String, _>("id")))
            .collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Message;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn save_and_load() {
        let store = test_store().await;
        let id = SessionId::from("42");
        let mut log = MessageLog::seeded("prompt");
        log.push(Message::user("hi"));
        log.push(Message::function("get_only_time", r#"{"time":"09:15:00"}"#));

        store.save(&id, &log).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(log));
        assert!(store.updated_at(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn upsert_replaces_log() {
        let store = test_store().await;
        let id = SessionId::from("42");
        store.save(&id, &MessageLog::seeded("v1")).await.unwrap();
        store.save(&id, &MessageLog::seeded("v2")).await.unwrap();

        let log = store.load(&id).await.unwrap().unwrap();
        assert_eq!(log[0].content.as_text(), "v2");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let store = test_store().await;
        assert!(store.load(&"nobody".into()).await.unwrap().is_none());
        assert!(store.updated_at(&"nobody".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sorted_and_delete() {
        let store = test_store().await;
        store.save(&"b".into(), &MessageLog::new()).await.unwrap();
        store.save(&"a".into(), &MessageLog::new()).await.unwrap();
        assert_eq!(
            store.list().await.unwrap(),
            vec![SessionId::from("a"), SessionId::from("b")]
        );

        assert!(store.delete(&"a".into()).await.unwrap());
        assert!(!store.delete(&"a".into()).await.unwrap());
    }

    #[tokio::test]
    async fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.save(&"s".into(), &MessageLog::seeded("p")).await.unwrap();
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert!(store.load(&"s".into()).await.unwrap().is_some());
    }
}
