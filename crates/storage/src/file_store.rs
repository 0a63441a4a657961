//! File-based session store: one JSON document per session.
//!
//! Each session lives in `<dir>/<encoded id>.json`, holding the message log
//! as a JSON array. Writes go to a sibling temp file first and are renamed
//! into place, so a crash mid-write never leaves a torn log behind.
//!
//! Storage location: `~/.parley/sessions/`

use async_trait::async_trait;
use parley_core::error::StorageError;
use parley_core::message::MessageLog;
use parley_core::session::{SessionId, SessionStore};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// A directory of JSON session files.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> Result<PathBuf, StorageError> {
        if id.as_str().is_empty() {
            return Err(StorageError::InvalidSessionId("empty id".into()));
        }
        Ok(self.dir.join(format!("{}.{EXTENSION}", encode_id(id.as_str()))))
    }
}

/// Percent-encode the id so any id is a safe file name (no `/`, no `%` ambiguity).
fn encode_id(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

fn decode_id(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(|id| id.into_owned())
}

#[async_trait]
impl SessionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<MessageLog>, StorageError> {
        let path = self.path_for(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(format!("{}: {e}", path.display()))),
        };

        let log: MessageLog = serde_json::from_str(&content)
            .map_err(|e| StorageError::Serialization(format!("{}: {e}", path.display())))?;
        Ok(Some(log))
    }

    async fn save(&self, id: &SessionId, log: &MessageLog) -> Result<(), StorageError> {
        let path = self.path_for(id)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::Io(format!("Failed to create session directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(log)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;

        debug!(session_id = %id, entries = log.len(), "Session saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(format!("{}: {e}", self.dir.display()))),
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_id(stem) {
                Some(id) => ids.push(SessionId(id)),
                None => warn!(file = %path.display(), "Skipping file with undecodable name"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StorageError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(format!("{}: {e}", path.display()))),
        }
    }
}
