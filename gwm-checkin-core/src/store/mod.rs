//! Session persistence.
//!
//! This module provides:
//! - [`SessionStore`] - Trait for session snapshot backends
//! - [`FileSessionStore`] - JSON file on disk, replaced atomically on save
//! - [`MemorySessionStore`] - In-memory implementation for testing
//! - [`KeyringPasswordStore`] - OS keyring holding the account password
//!   (with `keyring-store` feature)
//!
//! Only the session manager talks to a [`SessionStore`]; nothing else looks at
//! the storage medium.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::SessionSnapshot;

mod file;
mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringPasswordStore;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over session snapshot backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the last saved snapshot.
    ///
    /// Returns `Ok(None)` when nothing usable is stored: a missing record and
    /// one that does not parse (or carries no access token) are reported the
    /// same way, as "never logged in".
    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;

    /// Replace the stored snapshot.
    ///
    /// A concurrent or later `load` sees either the old record or the new
    /// one, never a partial write.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    /// Remove the stored snapshot. Succeeds if nothing was stored.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}
