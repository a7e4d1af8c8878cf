//! In-memory storage doubles for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{SecureStorage, VaultRecord, VaultStore};
use crate::error::{Result, VaultError};

/// Vault store held in memory; commits can be made to fail on demand
#[derive(Default)]
pub struct MemoryVaultStore {
    record: Mutex<Option<VaultRecord>>,
    fail_commits: AtomicBool,
}

impl MemoryVaultStore {
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<VaultRecord> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    fn is_initialized(&self) -> bool {
        self.record.lock().unwrap().is_some()
    }

    async fn load(&self) -> Result<Option<VaultRecord>> {
        Ok(self.snapshot())
    }

    async fn commit(&self, record: &VaultRecord) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(VaultError::StorageError("injected commit failure".to_string()));
        }
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Memory"
    }
}

/// Secure slot storage held in memory
pub struct MemorySecureStorage {
    items: Mutex<HashMap<String, Vec<u8>>>,
    available: bool,
}

impl MemorySecureStorage {
    pub fn new(available: bool) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            available,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.lock().unwrap().contains_key(key)
    }

    /// Overwrite a slot directly, bypassing the vault
    pub fn put(&self, key: &str, value: &[u8]) {
        self.items.lock().unwrap().insert(key.to_string(), value.to_vec());
    }
}

#[async_trait]
impl SecureStorage for MemorySecureStorage {
    async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put(key, value);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.items.lock().unwrap().remove(key);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn backend_name(&self) -> &'static str {
        "Memory"
    }
}
