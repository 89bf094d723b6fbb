// SPDX-License-Identifier: Apache-2.0
//! Checkpoint storage contract.

use thiserror::Error;

/// Errors surfaced by checkpoint stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist in the store.
    #[error("checkpoint not found: {0}")]
    NotFound(String),
    /// The backend rejected the operation (I/O, quota, encoding).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Key-value storage for serialized simulation checkpoints.
///
/// The core produces opaque byte blobs via its own `save_state` surface;
/// stores persist and return them verbatim. Keys are caller-chosen (commonly
/// the tick number rendered as a string).
pub trait StateStore: Send + Sync {
    /// Persists `bytes` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the write cannot be completed.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Retrieves the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent and
    /// [`StoreError::Backend`] for backend failures.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}
