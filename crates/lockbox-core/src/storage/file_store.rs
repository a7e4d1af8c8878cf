//! File-backed vault store
//!
//! The whole record lives in one JSON file. Writes go to a temp file that is
//! synced and then renamed over the live file, so a crash mid-write leaves
//! the previous record intact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{VaultRecord, VaultStore};
use crate::error::{Result, VaultError};

const RECORD_FILE: &str = "vault.json";
const TEMP_FILE: &str = "vault.json.tmp";

/// Vault store backed by a file in the data directory
#[derive(Debug, Clone)]
pub struct FileVaultStore {
    storage_dir: PathBuf,
}

impl FileVaultStore {
    /// Create a store rooted at `storage_dir`, creating the directory if needed
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir).map_err(|e| storage_error(&storage_dir, e))?;

        debug!("Vault file store initialized at: {:?}", storage_dir);
        Ok(Self { storage_dir })
    }

    /// Path of the live record file
    pub fn record_path(&self) -> PathBuf {
        self.storage_dir.join(RECORD_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.storage_dir.join(TEMP_FILE)
    }

    async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl VaultStore for FileVaultStore {
    fn is_initialized(&self) -> bool {
        self.record_path().exists()
    }

    async fn load(&self) -> Result<Option<VaultRecord>> {
        let path = self.record_path();

        if !path.exists() {
            debug!("No vault record found");
            return Ok(None);
        }

        let contents = tokio::fs::read(&path)
            .await
            .map_err(|e| storage_error(&path, e))?;

        match serde_json::from_slice(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Vault record at {:?} is unreadable: {}", path, e);
                Err(VaultError::VaultCorrupted)
            }
        }
    }

    async fn commit(&self, record: &VaultRecord) -> Result<()> {
        let contents = serde_json::to_vec_pretty(record)?;
        let path = self.record_path();
        let temp_path = self.temp_path();

        Self::write_private(&temp_path, &contents)
            .await
            .map_err(|e| storage_error(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| storage_error(&path, e))?;

        // Persist the rename itself; not all platforms allow syncing a directory
        #[cfg(unix)]
        {
            if let Ok(dir) = tokio::fs::File::open(&self.storage_dir).await {
                let _ = dir.sync_all().await;
            }
        }

        debug!("Committed vault record to {:?}", path);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        for path in [self.record_path(), self.temp_path()] {
            if path.exists() {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| storage_error(&path, e))?;
            }
        }

        debug!("Deleted vault record");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Vault File"
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> VaultError {
    VaultError::StorageError(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyDerivationParams;
    use tempfile::TempDir;

    fn sample_record(entries: &str) -> VaultRecord {
        VaultRecord::new(
            KeyDerivationParams::default(),
            "00112233445566778899aabbccddeeff".to_string(),
            "verifier-blob".to_string(),
            entries.to_string(),
        )
    }

    #[tokio::test]
    async fn test_commit_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();

        assert!(!store.is_initialized());
        assert!(store.load().await.unwrap().is_none());

        store.commit(&sample_record("blob-1")).await.unwrap();

        assert!(store.is_initialized());
        assert_eq!(store.load().await.unwrap(), Some(sample_record("blob-1")));
        assert!(!temp_dir.path().join(TEMP_FILE).exists());
    }

    #[tokio::test]
    async fn test_commit_replaces_whole_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();

        store.commit(&sample_record("blob-1")).await.unwrap();
        store.commit(&sample_record("blob-2")).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries, "blob-2");
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileVaultStore::new(temp_dir.path()).unwrap();
            store.commit(&sample_record("persistent")).await.unwrap();
        }

        let store = FileVaultStore::new(temp_dir.path()).unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries, "persistent");
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();

        store.commit(&sample_record("good")).await.unwrap();
        // A crash between write and rename leaves only a temp file behind
        std::fs::write(temp_dir.path().join(TEMP_FILE), b"{\"partial").unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries, "good");
    }

    #[tokio::test]
    async fn test_garbage_record_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();

        std::fs::write(store.record_path(), b"not json").unwrap();

        assert!(matches!(store.load().await, Err(VaultError::VaultCorrupted)));
    }

    #[tokio::test]
    async fn test_destroy() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();

        store.commit(&sample_record("blob")).await.unwrap();
        store.destroy().await.unwrap();
        store.destroy().await.unwrap();

        assert!(!store.is_initialized());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_record_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = FileVaultStore::new(temp_dir.path()).unwrap();
        store.commit(&sample_record("blob")).await.unwrap();

        let mode = std::fs::metadata(store.record_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
