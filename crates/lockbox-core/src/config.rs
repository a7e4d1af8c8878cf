//! Engine configuration

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::biometric::ESCROW_SLOT;
use crate::crypto::KeyDerivationParams;
use crate::error::{Result, VaultError};
use crate::storage::DEFAULT_SERVICE_NAME;

/// Where the vault lives and how new keys are derived
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding `vault.json` and `settings.json`
    pub storage_dir: PathBuf,
    /// Keychain service name for the escrow slot
    pub keychain_service: String,
    /// KDF parameters for new vaults and password changes
    pub kdf: KeyDerivationParams,
}

impl VaultConfig {
    /// Configuration rooted in the platform data directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(Self::default_dir()?))
    }

    /// Configuration rooted in a custom directory
    pub fn with_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            keychain_service: DEFAULT_SERVICE_NAME.to_string(),
            kdf: KeyDerivationParams::default(),
        }
    }

    /// Get the default storage directory
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "lockbox", "lockbox")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| VaultError::InvalidConfig("Could not determine data directory".to_string()))
    }

    pub fn with_keychain_service(mut self, service: impl Into<String>) -> Self {
        self.keychain_service = service.into();
        self
    }

    pub fn with_kdf(mut self, kdf: KeyDerivationParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Keychain account for this vault's escrowed key, derived from the
    /// canonical storage directory so vaults sharing a service stay apart
    pub fn escrow_account(&self) -> String {
        let dir = std::fs::canonicalize(&self.storage_dir)
            .unwrap_or_else(|_| self.storage_dir.clone());
        let digest = Sha256::digest(dir.to_string_lossy().as_bytes());
        format!("{}-{}", ESCROW_SLOT, hex::encode(&digest[..8]))
    }

    pub fn validate(&self) -> Result<()> {
        if self.keychain_service.trim().is_empty() {
            return Err(VaultError::InvalidConfig(
                "Keychain service name must not be empty".to_string(),
            ));
        }
        self.kdf.validate()
    }
}
