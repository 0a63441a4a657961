//! Per-session mutual exclusion.
//!
//! Two exchanges for the same session, or an exchange and a trimmer pass,
//! never read-modify-write the same stored log concurrently. Different
//! sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::session::SessionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created lock per session.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait until the session is free, then hold it until the guard drops.
    pub async fn acquire(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        self.lock_for(id).await.lock_owned().await
    }

    /// Take the session only if nobody holds it right now.
    pub async fn try_acquire(&self, id: &SessionId) -> Option<OwnedMutexGuard<()>> {
        self.lock_for(id).await.try_lock_owned().ok()
    }

    /// Drop lock entries nobody holds or waits on. Returns how many went.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    /// Drop one session's entry if nobody holds or waits on it.
    pub async fn release(&self, id: &SessionId) -> bool {
        let mut locks = self.locks.lock().await;
        match locks.get(id) {
            Some(lock) if Arc::strong_count(lock) == 1 => locks.remove(id).is_some(),
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
