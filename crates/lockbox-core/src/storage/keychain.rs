//! OS Keychain storage backend
//!
//! Uses the system keychain for secure storage:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use async_trait::async_trait;
use base64::Engine;
use keyring::Entry;
use tracing::{debug, warn};

use super::SecureStorage;
use crate::error::{Result, VaultError};

/// Default service name used for keychain entries
pub const DEFAULT_SERVICE_NAME: &str = "lockbox";

/// OS Keychain storage backend
pub struct KeychainStorage {
    service: String,
    available: bool,
}

impl KeychainStorage {
    /// Create a keychain storage under the given service name
    pub fn new(service: &str) -> Self {
        let available = Self::test_availability(service);

        if available {
            debug!("Keychain storage is available");
        } else {
            warn!("Keychain storage is not available - biometric unlock disabled");
        }

        Self {
            service: service.to_string(),
            available,
        }
    }

    /// Test if the keychain is available by writing and removing a probe entry
    fn test_availability(service: &str) -> bool {
        match Entry::new(service, "__test_availability__") {
            Ok(entry) => {
                if entry.set_password("probe").is_ok() {
                    let _ = entry.delete_password();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    fn get_entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(|e| VaultError::KeychainError(e.to_string()))
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(VaultError::KeychainError("Keychain not available".to_string()))
        }
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_available()?;
        let entry = self.get_entry(key)?;

        // Keychains store strings
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);

        entry
            .set_password(&encoded)
            .map_err(|e| VaultError::KeychainError(e.to_string()))?;

        debug!("Stored keychain item: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_available()?;
        let entry = self.get_entry(key)?;

        match entry.get_password() {
            Ok(encoded) => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| VaultError::KeychainError(format!("Base64 decode error: {}", e)))?;
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("Keychain item not found: {}", key);
                Ok(None)
            }
            Err(e) => Err(VaultError::KeychainError(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_available()?;
        let entry = self.get_entry(key)?;

        match entry.delete_password() {
            Ok(()) => {
                debug!("Deleted keychain item: {}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::KeychainError(e.to_string())),
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_keychain_reports_errors() {
        let storage = KeychainStorage {
            service: "lockbox-test".to_string(),
            available: false,
        };

        assert!(!storage.is_available());
        assert!(matches!(
            storage.store("k", b"v").await,
            Err(VaultError::KeychainError(_))
        ));
        assert!(storage.retrieve("k").await.is_err());
    }

    #[test]
    fn test_keychain_availability_probe() {
        // Only checks that probing does not panic on machines without a keychain
        let storage = KeychainStorage::new("lockbox-test");
        let _ = storage.is_available();
    }
}
