//! Storage backends
//!
//! This module provides:
//! 1. The vault record store (salt, verifier and entries, written atomically)
//! 2. OS keychain slots used for biometric key escrow

mod file_store;
mod keychain;
#[cfg(test)]
pub(crate) mod memory;
mod record;
mod traits;

pub use file_store::FileVaultStore;
pub use keychain::{KeychainStorage, DEFAULT_SERVICE_NAME};
pub use record::{VaultRecord, RECORD_VERSION};
pub use traits::{SecureStorage, VaultStore};
