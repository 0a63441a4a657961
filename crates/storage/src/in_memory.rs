//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::error::StorageError;
use parley_core::message::MessageLog;
use parley_core::session::{SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store that keeps every session's log in a HashMap.
/// Nothing survives the process.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<SessionId, MessageLog>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<MessageLog>, StorageError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, id: &SessionId, log: &MessageLog) -> Result<(), StorageError> {
        self.sessions.write().await.insert(id.clone(), log.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StorageError> {
        let mut ids: Vec<SessionId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StorageError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }
}
