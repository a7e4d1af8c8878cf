//! Persisted vault record

use serde::{Deserialize, Serialize};

use crate::crypto::KeyDerivationParams;

/// Current on-disk record version
pub const RECORD_VERSION: u32 = 1;

/// The salt, verifier and entry ciphertext, always written together.
///
/// Only ciphertext and public parameters live here; nothing in a record
/// is readable without the derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub version: u32,
    /// KDF parameters the salt was used with
    pub kdf: KeyDerivationParams,
    /// Hex-encoded master salt
    pub salt: String,
    /// Encrypted well-known marker
    pub verifier: String,
    /// Encrypted JSON array of entries
    pub entries: String,
}

impl VaultRecord {
    pub fn new(kdf: KeyDerivationParams, salt: String, verifier: String, entries: String) -> Self {
        Self {
            version: RECORD_VERSION,
            kdf,
            salt,
            verifier,
            entries,
        }
    }

    /// Copy of this record with a new entries blob
    pub fn with_entries(&self, entries: String) -> Self {
        Self {
            entries,
            ..self.clone()
        }
    }
}
