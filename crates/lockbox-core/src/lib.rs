//! # lockbox-core
//!
//! Local secrets vault engine for Lockbox:
//! - PBKDF2-HMAC-SHA256 key derivation and AES-256-CBC entry encryption
//! - Lock/unlock state machine with verifier-based password checks
//! - Atomic master password rotation
//! - Biometric key escrow in the OS keychain
//! - Backup and restore of the encrypted store

pub mod backup;
pub mod biometric;
pub mod config;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod generator;
pub mod settings;
pub mod storage;
mod vault;

pub use backup::BackupBundle;
pub use biometric::{BiometricPrompt, KeyEscrow, NoBiometrics, PromptOutcome};
pub use config::VaultConfig;
pub use crypto::{DerivedKey, KeyDerivationParams, SecretString};
pub use entry::{
    Entry, EntryForm, EntryKind, EntryPatch, PasswordEntry, PasswordForm, PasswordPatch,
    WalletKeyEntry, WalletKeyForm, WalletKeyPatch,
};
pub use error::{Result, VaultError};
pub use generator::{generate_password, PasswordPolicy};
pub use settings::{Settings, SettingsManager};
pub use storage::{FileVaultStore, KeychainStorage, SecureStorage, VaultRecord, VaultStore};
pub use vault::{Vault, VaultState};
