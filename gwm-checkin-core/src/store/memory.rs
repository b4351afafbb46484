//! In-memory session storage implementation.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{SessionStore, StoreError};
use crate::model::SessionSnapshot;

/// In-memory session store for testing and dry runs.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemorySessionStore {
    data: RwLock<Option<SessionSnapshot>>,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    /// Create a memory store holding an existing snapshot.
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            data: RwLock::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self.data.read().map(|d| d.is_some()).unwrap_or(false);
        f.debug_struct("MemorySessionStore")
            .field("has_snapshot", &present)
            .field("saves", &self.save_count())
            .finish()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StoreError {
    StoreError::BackendError {
        message: format!("lock poisoned: {}", e),
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data
            .as_ref()
            .filter(|snapshot| snapshot.access_token().is_some())
            .cloned())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        *data = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        *data = None;
        Ok(())
    }
}
