//! Session storage implementations for Parley.
//!
//! All backends implement `parley_core::SessionStore`.

pub mod file_store;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_store::FileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use parley_config::{StorageBackendKind, StorageConfig};
use parley_core::error::StorageError;
use parley_core::session::SessionStore;
use std::sync::Arc;

/// Open the configured session store.
pub async fn build_from_config(
    config: &StorageConfig,
) -> Result<Arc<dyn SessionStore>, StorageError> {
    match config.backend {
        StorageBackendKind::Memory => Ok(Arc::new(InMemoryStore::new())),
        StorageBackendKind::File => Ok(Arc::new(FileStore::new(config.resolved_path()))),
        #[cfg(feature = "sqlite")]
        StorageBackendKind::Sqlite => {
            let path = config.resolved_path();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::Io(format!("{}: {e}", parent.display())))?;
            }
            let store = SqliteStore::open(&path).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackendKind::Sqlite => Err(StorageError::Database(
            "built without the `sqlite` feature".into(),
        )),
    }
}
