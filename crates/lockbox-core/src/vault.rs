//! Vault orchestration
//!
//! `Vault` owns the lock state. While unlocked it holds the derived key, the
//! record it was checked against and the decrypted entries; locking drops
//! all three. Every mutation commits a complete new record before the
//! in-memory snapshot is replaced, so a failed write changes nothing.
//!
//! Mutations take `&mut self` and reads take `&self`. Callers sharing one
//! vault between tasks wrap it in `Arc<tokio::sync::RwLock<Vault>>`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backup::BackupBundle;
use crate::biometric::{BiometricPrompt, KeyEscrow};
use crate::config::VaultConfig;
use crate::crypto::{
    self, derive_key_blocking, encrypt_string, generate_salt, DerivedKey, KeyDerivationParams,
    MasterSalt,
};
use crate::entry::{Entry, EntryForm, EntryPatch};
use crate::error::{Result, VaultError};
use crate::settings::SettingsManager;
use crate::storage::{FileVaultStore, KeychainStorage, VaultRecord, VaultStore};

/// Marker encrypted into the verifier
const VERIFIER_PLAINTEXT: &str = "lockbox-verifier-v1";

const BIOMETRIC_REASON: &str = "Unlock your Lockbox vault";

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No vault record exists yet
    Uninitialized,
    /// A record exists but no key is held
    Locked,
    /// Key held in memory, entries decrypted
    Unlocked,
}

/// Everything held while unlocked
struct Session {
    key: DerivedKey,
    salt: MasterSalt,
    record: VaultRecord,
    entries: Vec<Entry>,
}

impl Session {
    /// Check `key` against the record's verifier, then decrypt the entries
    fn start(key: DerivedKey, salt: MasterSalt, record: VaultRecord) -> Result<Self> {
        match crypto::decrypt_string(&record.verifier, &key) {
            Ok(marker) if marker.as_str() == VERIFIER_PLAINTEXT => {}
            _ => return Err(VaultError::InvalidPassword),
        }

        let entries: Vec<Entry> = crypto::open(&record.entries, &key).map_err(|_| {
            warn!("Verifier accepted the key but the entries could not be decrypted");
            VaultError::VaultCorrupted
        })?;

        Ok(Self {
            key,
            salt,
            record,
            entries,
        })
    }
}

/// Local secrets vault
pub struct Vault {
    store: Arc<dyn VaultStore>,
    escrow: KeyEscrow,
    settings: SettingsManager,
    /// Parameters for new vaults and rotations
    kdf: KeyDerivationParams,
    session: Option<Session>,
}

impl Vault {
    /// Open the vault described by `config`, backed by the vault file and the
    /// OS keychain
    pub fn open(config: &VaultConfig, prompt: Arc<dyn BiometricPrompt>) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn VaultStore> = Arc::new(FileVaultStore::new(config.storage_dir.clone())?);
        let slot = Arc::new(KeychainStorage::new(&config.keychain_service));
        let settings = SettingsManager::new(&config.storage_dir);

        debug!(
            "Opened vault at {:?} ({} backend)",
            config.storage_dir,
            store.backend_name()
        );
        Ok(Self::assemble(
            store,
            KeyEscrow::new(slot, prompt).with_account(config.escrow_account()),
            settings,
            config.kdf,
        ))
    }

    /// Build a vault from explicit parts, e.g. an alternate store
    pub fn with_parts(
        store: Arc<dyn VaultStore>,
        escrow: KeyEscrow,
        settings: SettingsManager,
        kdf: KeyDerivationParams,
    ) -> Result<Self> {
        kdf.validate()?;
        Ok(Self::assemble(store, escrow, settings, kdf))
    }

    fn assemble(
        store: Arc<dyn VaultStore>,
        escrow: KeyEscrow,
        settings: SettingsManager,
        kdf: KeyDerivationParams,
    ) -> Self {
        Self {
            store,
            escrow,
            settings,
            kdf,
            session: None,
        }
    }

    pub fn state(&self) -> VaultState {
        if self.session.is_some() {
            VaultState::Unlocked
        } else if self.store.is_initialized() {
            VaultState::Locked
        } else {
            VaultState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// True unless a key is held (an uninitialized vault counts as locked)
    pub fn is_locked(&self) -> bool {
        self.session.is_none()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(VaultError::NotReady)
    }

    async fn load_record(&self) -> Result<VaultRecord> {
        self.store.load().await?.ok_or(VaultError::NotInitialized)
    }

    /// Create the vault and leave it unlocked
    pub async fn setup(&mut self, password: &str) -> Result<()> {
        if self.store.is_initialized() {
            return Err(VaultError::AlreadyInitialized);
        }
        if password.is_empty() {
            return Err(VaultError::EmptyPassword);
        }

        info!("Creating new vault");

        let salt = generate_salt();
        let key = derive_key_blocking(password, salt, self.kdf).await?;
        let entries: Vec<Entry> = Vec::new();
        let record = VaultRecord::new(
            self.kdf,
            salt.to_hex(),
            encrypt_string(VERIFIER_PLAINTEXT, &key)?,
            crypto::seal(&entries, &key)?,
        );

        self.store.commit(&record).await?;

        // Anything escrowed for an earlier vault cannot open this one
        self.invalidate_escrow().await;

        self.session = Some(Session {
            key,
            salt,
            record,
            entries,
        });

        info!("Vault created");
        Ok(())
    }

    /// Unlock with the master password.
    ///
    /// The password is always checked against the persisted verifier, even
    /// when a key is already held. Any failure leaves the vault locked.
    pub async fn unlock(&mut self, password: &str) -> Result<()> {
        if self.session.is_some() {
            debug!("Vault already unlocked, checking password again");
        }

        match self.open_session(password).await {
            Ok(session) => {
                self.session = Some(session);
                info!("Vault unlocked");
                Ok(())
            }
            Err(e) => {
                if e.is_authentication_failure() {
                    warn!("Unlock rejected");
                }
                self.lock();
                Err(e)
            }
        }
    }

    async fn open_session(&self, password: &str) -> Result<Session> {
        let record = self.load_record().await?;
        let salt = record_salt(&record)?;
        let key = derive_key_blocking(password, salt, record.kdf).await?;
        Session::start(key, salt, record)
    }

    /// Unlock with the escrowed key after a biometric prompt.
    ///
    /// Returns `Ok(false)` and stays locked when biometrics are not enabled,
    /// the prompt is cancelled or fails, or the escrowed key no longer opens
    /// the vault. In the last case escrow is cleared and must be re-enabled.
    pub async fn unlock_with_biometrics(&mut self) -> Result<bool> {
        if self.session.is_some() {
            debug!("Vault already unlocked");
            return Ok(true);
        }

        let record = self.load_record().await?;
        if !self.settings.biometrics_enabled() {
            debug!("Biometric unlock is not enabled");
            return Ok(false);
        }
        let salt = record_salt(&record)?;

        let key = match self.escrow.withdraw(BIOMETRIC_REASON).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                warn!("No usable escrowed key; biometric unlock needs to be re-enabled");
                self.invalidate_escrow().await;
                return Ok(false);
            }
            Err(VaultError::BiometricCancelled) => {
                info!("Biometric prompt cancelled");
                return Ok(false);
            }
            Err(e) => {
                warn!("Biometric unlock failed: {}", e);
                return Ok(false);
            }
        };

        match Session::start(key, salt, record) {
            Ok(session) => {
                self.session = Some(session);
                info!("Vault unlocked with biometrics");
                Ok(true)
            }
            Err(VaultError::InvalidPassword) => {
                warn!("Escrowed key is stale; biometric unlock needs to be re-enabled");
                self.invalidate_escrow().await;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the key and decrypted entries
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            info!("Vault locked");
        }
    }

    pub fn list_entries(&self) -> Result<&[Entry]> {
        Ok(&self.session()?.entries)
    }

    pub fn entry(&self, id: Uuid) -> Result<Option<&Entry>> {
        Ok(self.session()?.entries.iter().find(|entry| entry.id() == id))
    }

    /// Add an entry; id and timestamps are assigned here
    pub async fn add_entry(&mut self, form: impl Into<EntryForm>) -> Result<Entry> {
        let session = self.session()?;
        let entry = form.into().into_entry(Uuid::new_v4(), Utc::now())?;

        let mut entries = session.entries.clone();
        entries.push(entry.clone());
        self.commit_entries(entries).await?;

        info!("Added {} entry {}", entry.kind(), entry.id());
        Ok(entry)
    }

    pub async fn update_entry(&mut self, id: Uuid, patch: impl Into<EntryPatch>) -> Result<Entry> {
        let session = self.session()?;
        let index = session
            .entries
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or(VaultError::EntryNotFound(id))?;

        let updated = patch.into().apply(&session.entries[index], Utc::now())?;
        let mut entries = session.entries.clone();
        entries[index] = updated.clone();
        self.commit_entries(entries).await?;

        info!("Updated entry {}", id);
        Ok(updated)
    }

    /// Delete an entry. Unknown ids are ignored.
    pub async fn delete_entry(&mut self, id: Uuid) -> Result<()> {
        let session = self.session()?;
        if !session.entries.iter().any(|entry| entry.id() == id) {
            debug!("Entry {} not found, nothing to delete", id);
            return Ok(());
        }

        let entries = session
            .entries
            .iter()
            .filter(|entry| entry.id() != id)
            .cloned()
            .collect();
        self.commit_entries(entries).await?;

        info!("Deleted entry {}", id);
        Ok(())
    }

    /// Re-encrypt `entries` under the current key, commit, then swap
    async fn commit_entries(&mut self, entries: Vec<Entry>) -> Result<()> {
        let session = self.session()?;
        let record = session
            .record
            .with_entries(crypto::seal(&entries, &session.key)?);

        self.store.commit(&record).await?;

        let session = self.session.as_mut().ok_or(VaultError::NotReady)?;
        session.record = record;
        session.entries = entries;
        Ok(())
    }

    /// Check that `password` derives the key currently held
    async fn verify_password(&self, password: &str) -> Result<()> {
        let session = self.session()?;
        let candidate = derive_key_blocking(password, session.salt, session.record.kdf).await?;
        if candidate != session.key {
            warn!("Master password check failed");
            return Err(VaultError::InvalidPassword);
        }
        Ok(())
    }

    /// Re-key the vault under a new password and a fresh salt.
    ///
    /// The new salt, verifier and entries are committed as one record; on
    /// any failure the old password keeps working. Biometric escrow holds
    /// the old key, so it is cleared afterwards.
    pub async fn change_master_password(
        &mut self,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.verify_password(current_password).await?;
        if new_password.is_empty() {
            return Err(VaultError::EmptyPassword);
        }

        info!("Changing master password");

        let salt = generate_salt();
        let key = derive_key_blocking(new_password, salt, self.kdf).await?;

        let session = self.session()?;
        let record = VaultRecord::new(
            self.kdf,
            salt.to_hex(),
            encrypt_string(VERIFIER_PLAINTEXT, &key)?,
            crypto::seal(&session.entries, &key)?,
        );

        self.store.commit(&record).await?;

        let session = self.session.as_mut().ok_or(VaultError::NotReady)?;
        session.key = key;
        session.salt = salt;
        session.record = record;

        self.invalidate_escrow().await;

        info!("Master password changed");
        Ok(())
    }

    /// Escrow the current key behind the biometric prompt
    pub async fn enable_biometrics(&mut self, current_password: &str) -> Result<()> {
        self.verify_password(current_password).await?;

        let session = self.session()?;
        self.escrow.deposit(&session.key).await?;

        if let Err(e) = self.settings.set_biometrics_enabled(true).await {
            if let Err(clear_err) = self.escrow.clear().await {
                warn!("Failed to roll back escrowed key: {}", clear_err);
            }
            return Err(e);
        }

        info!("Biometric unlock enabled");
        Ok(())
    }

    /// Remove the escrowed key and clear the flag. Idempotent.
    pub async fn disable_biometrics(&mut self) -> Result<()> {
        self.escrow.clear().await?;
        self.settings.set_biometrics_enabled(false).await?;
        info!("Biometric unlock disabled");
        Ok(())
    }

    pub fn is_biometrics_supported(&self) -> bool {
        self.escrow.is_supported()
    }

    pub fn is_biometrics_enabled(&self) -> bool {
        self.settings.biometrics_enabled()
    }

    /// Best-effort escrow teardown after the key changed underneath it
    async fn invalidate_escrow(&mut self) {
        if let Err(e) = self.escrow.clear().await {
            warn!("Failed to clear escrowed key: {}", e);
        }
        if let Err(e) = self.settings.set_biometrics_enabled(false).await {
            warn!("Failed to reset biometrics flag: {}", e);
        }
    }

    /// Serialize the persisted ciphertext into a backup bundle. Works while
    /// locked.
    pub async fn backup(&self) -> Result<Vec<u8>> {
        let record = self.load_record().await?;
        let bytes = BackupBundle::from_record(&record).to_bytes()?;
        info!("Created backup ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Replace the persisted ciphertext with a backup bundle.
    ///
    /// The bundle is not decrypted; the next unlock is what proves it
    /// usable. The vault is locked afterwards. A bundle with its own salt
    /// and verifier needs the password that produced it.
    pub async fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let bundle = BackupBundle::from_bytes(bytes)?;

        let current = match self.store.load().await {
            Ok(record) => record,
            Err(VaultError::VaultCorrupted) => {
                warn!("Current vault record is unreadable; it will be replaced");
                None
            }
            Err(e) => return Err(e),
        };

        let record = bundle.into_record(current.as_ref())?;
        self.store.commit(&record).await?;

        self.lock();

        let key_changed = current.map_or(true, |current| {
            current.salt != record.salt || current.verifier != record.verifier
        });
        if key_changed {
            self.invalidate_escrow().await;
        }

        info!("Vault restored from backup");
        Ok(())
    }

    /// Delete the vault, the escrowed key and the settings
    pub async fn wipe(&mut self) -> Result<()> {
        warn!("Wiping vault - all entries will be deleted");

        self.session = None;
        self.store.destroy().await?;
        if let Err(e) = self.escrow.clear().await {
            warn!("Failed to clear escrowed key: {}", e);
        }
        self.settings.reset().await?;

        info!("Vault wiped");
        Ok(())
    }
}

/// Salt of a persisted record, which must also carry usable KDF parameters
fn record_salt(record: &VaultRecord) -> Result<MasterSalt> {
    if let Err(e) = record.kdf.check_bounds() {
        warn!("Vault record has unusable KDF parameters: {}", e);
        return Err(VaultError::VaultCorrupted);
    }
    MasterSalt::from_hex(&record.salt).map_err(|_| VaultError::VaultCorrupted)
}
