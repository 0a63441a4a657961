//! Sessions and the storage boundary.
//!
//! A session is one end user's independent conversation. The engine only
//! needs to load and save a session's [`MessageLog`]; how and where it is
//! stored is up to the [`SessionStore`] implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::message::MessageLog;

/// Identifier of one session (e.g. a chat id from the transport).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// A fresh random session id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The storage collaborator.
///
/// Last-write-wins per session. Callers serialize writers per session
/// themselves, so implementations need no transactional semantics.
///
/// Implementations: in-memory (for testing), JSON file directory, SQLite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "memory").
    fn name(&self) -> &str;

    /// Load a session's log. `None` means the session has never been saved.
    async fn load(&self, id: &SessionId) -> std::result::Result<Option<MessageLog>, StorageError>;

    /// Persist a session's log, replacing whatever was stored before.
    async fn save(&self, id: &SessionId, log: &MessageLog) -> std::result::Result<(), StorageError>;

    /// All known session ids.
    async fn list(&self) -> std::result::Result<Vec<SessionId>, StorageError>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> std::result::Result<bool, StorageError>;
}
