//! Storage trait definitions

use async_trait::async_trait;

use super::VaultRecord;
use crate::error::Result;

/// Persistence for the vault record
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Whether a record exists
    fn is_initialized(&self) -> bool;

    /// Load the current record, if any
    async fn load(&self) -> Result<Option<VaultRecord>>;

    /// Replace the record as one unit. Readers observe either the previous
    /// record or the new one, never a mix.
    async fn commit(&self, record: &VaultRecord) -> Result<()>;

    /// Delete the record
    async fn destroy(&self) -> Result<()>;

    /// Get a human-readable name for this backend
    fn backend_name(&self) -> &'static str;
}

/// Platform-secured slot storage (OS keychain and the like)
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a value with the given key
    async fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a value by key
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a value by key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether the backend can be used on this machine
    fn is_available(&self) -> bool;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
