//! Portable backup bundles
//!
//! A bundle carries the persisted ciphertext verbatim. Nothing here ever
//! sees a key or a plaintext entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptedBlob, KeyDerivationParams, MasterSalt};
use crate::error::{Result, VaultError};
use crate::storage::VaultRecord;

/// Format marker written into every bundle
pub const BACKUP_FORMAT: &str = "lockbox-backup";

/// Current bundle version
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBundle {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Absent in entries-only bundles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KeyDerivationParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    pub entries: String,
}

impl BackupBundle {
    /// Full bundle copied from a persisted record
    pub fn from_record(record: &VaultRecord) -> Self {
        Self {
            format: BACKUP_FORMAT.to_string(),
            version: BACKUP_VERSION,
            created_at: Utc::now(),
            kdf: Some(record.kdf),
            salt: Some(record.salt.clone()),
            verifier: Some(record.verifier.clone()),
            entries: record.entries.clone(),
        }
    }

    /// Bundle carrying only the vault blob
    pub fn entries_only(entries: String) -> Self {
        Self {
            format: BACKUP_FORMAT.to_string(),
            version: BACKUP_VERSION,
            created_at: Utc::now(),
            kdf: None,
            salt: None,
            verifier: None,
            entries,
        }
    }

    /// Whether the bundle replaces the salt and verifier too
    pub fn is_full(&self) -> bool {
        self.salt.is_some() && self.verifier.is_some()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse and structurally check a bundle. Decryptability is not checked.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bundle: BackupBundle = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::InvalidBackup(format!("not a backup bundle: {}", e)))?;

        if bundle.format != BACKUP_FORMAT {
            return Err(VaultError::InvalidBackup(format!(
                "unknown format '{}'",
                bundle.format
            )));
        }
        if bundle.version > BACKUP_VERSION {
            return Err(VaultError::InvalidBackup(format!(
                "bundle version {} is newer than supported version {}",
                bundle.version, BACKUP_VERSION
            )));
        }
        if bundle.salt.is_some() != bundle.verifier.is_some() {
            return Err(VaultError::InvalidBackup(
                "salt and verifier must be restored together".to_string(),
            ));
        }

        check_blob(&bundle.entries, "entries")?;
        if let Some(salt) = &bundle.salt {
            MasterSalt::from_hex(salt)
                .map_err(|_| VaultError::InvalidBackup("malformed salt".to_string()))?;
        }
        if let Some(verifier) = &bundle.verifier {
            check_blob(verifier, "verifier")?;
        }
        if let Some(kdf) = &bundle.kdf {
            kdf.check_bounds()
                .map_err(|_| VaultError::InvalidBackup("unusable KDF parameters".to_string()))?;
        }

        Ok(bundle)
    }

    /// Build the record to commit. An entries-only bundle keeps the
    /// current salt and verifier and needs an existing vault.
    pub fn into_record(self, current: Option<&VaultRecord>) -> Result<VaultRecord> {
        match (self.salt, self.verifier) {
            (Some(salt), Some(verifier)) => {
                let kdf = self
                    .kdf
                    .or_else(|| current.map(|record| record.kdf))
                    .unwrap_or_default();
                Ok(VaultRecord::new(kdf, salt, verifier, self.entries))
            }
            _ => {
                let current = current.ok_or_else(|| {
                    VaultError::InvalidBackup(
                        "entries-only backup needs an existing vault".to_string(),
                    )
                })?;
                Ok(current.with_entries(self.entries))
            }
        }
    }
}

fn check_blob(encoded: &str, field: &str) -> Result<()> {
    EncryptedBlob::from_string(encoded)
        .map(|_| ())
        .map_err(|_| VaultError::InvalidBackup(format!("malformed {}", field)))
}
