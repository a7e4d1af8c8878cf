//! Error types for lockbox-core

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault is locked - unlock with the master password first")]
    NotReady,

    #[error("Vault is not initialized - set a master password first")]
    NotInitialized,

    #[error("Vault is already initialized")]
    AlreadyInitialized,

    #[error("Invalid master password")]
    InvalidPassword,

    #[error("Master password must not be empty")]
    EmptyPassword,

    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Entry type cannot be changed")]
    EntryKindMismatch,

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    /// Deliberately carries no detail so callers cannot tell padding
    /// failures apart from malformed input.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Vault data cannot be read - it may be corrupted; try restoring a backup")]
    VaultCorrupted,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("Biometric unlock unavailable: {0}")]
    BiometricUnavailable(String),

    #[error("Biometric prompt cancelled")]
    BiometricCancelled,

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether this error is the expected result of a wrong password
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::InvalidPassword)
    }
}
