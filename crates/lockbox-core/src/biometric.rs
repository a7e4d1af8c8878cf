//! Biometric key escrow
//!
//! A copy of the current derived key is kept in a platform-secured slot and
//! released only after the platform's biometric prompt succeeds. The slot
//! holds the raw key, so any change of key (password rotation, restore,
//! wipe) must clear it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::DerivedKey;
use crate::error::{Result, VaultError};
use crate::storage::SecureStorage;

/// Default slot name for the escrowed key
pub(crate) const ESCROW_SLOT: &str = "derived-key";

/// Result of a biometric prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Authenticated,
    /// The user dismissed the prompt
    Cancelled,
    /// The platform could not complete the prompt
    Failed(String),
}

/// Platform biometric / passcode prompt
#[async_trait]
pub trait BiometricPrompt: Send + Sync {
    /// Whether the device has enrolled biometrics (or an equivalent gate)
    fn is_supported(&self) -> bool;

    /// Show the prompt. May wait indefinitely for the user; only the user
    /// can cancel it.
    async fn authenticate(&self, reason: &str) -> PromptOutcome;
}

/// Prompt for platforms without biometric hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBiometrics;

#[async_trait]
impl BiometricPrompt for NoBiometrics {
    fn is_supported(&self) -> bool {
        false
    }

    async fn authenticate(&self, _reason: &str) -> PromptOutcome {
        PromptOutcome::Failed("biometrics not supported".to_string())
    }
}

/// Keeps the derived key behind the biometric prompt
pub struct KeyEscrow {
    slot: Arc<dyn SecureStorage>,
    prompt: Arc<dyn BiometricPrompt>,
    /// Slot name; distinct per vault when several share one keychain service
    account: String,
}

impl KeyEscrow {
    pub fn new(slot: Arc<dyn SecureStorage>, prompt: Arc<dyn BiometricPrompt>) -> Self {
        Self {
            slot,
            prompt,
            account: ESCROW_SLOT.to_string(),
        }
    }

    /// Use a different slot name
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    /// Both the prompt and the secure slot are usable
    pub fn is_supported(&self) -> bool {
        self.prompt.is_supported() && self.slot.is_available()
    }

    /// Store a copy of `key` in the secure slot
    pub async fn deposit(&self, key: &DerivedKey) -> Result<()> {
        if !self.is_supported() {
            return Err(VaultError::BiometricUnavailable(format!(
                "no biometric prompt or secure storage ({})",
                self.slot.backend_name()
            )));
        }

        self.slot.store(&self.account, key.as_bytes()).await?;
        debug!("Escrowed derived key in {}", self.slot.backend_name());
        Ok(())
    }

    /// Prompt the user and read the escrowed key.
    ///
    /// `Ok(None)` means the prompt succeeded but the slot is empty or holds
    /// something that is not a key.
    pub async fn withdraw(&self, reason: &str) -> Result<Option<DerivedKey>> {
        if !self.is_supported() {
            return Err(VaultError::BiometricUnavailable(
                "biometric unlock is not supported on this device".to_string(),
            ));
        }

        match self.prompt.authenticate(reason).await {
            PromptOutcome::Authenticated => {}
            PromptOutcome::Cancelled => return Err(VaultError::BiometricCancelled),
            PromptOutcome::Failed(reason) => return Err(VaultError::BiometricUnavailable(reason)),
        }

        let Some(bytes) = self.slot.retrieve(&self.account).await?.map(Zeroizing::new) else {
            warn!("No escrowed key found");
            return Ok(None);
        };

        let key = DerivedKey::from_slice(&bytes);
        if key.is_none() {
            warn!("Escrowed key has unexpected length {}", bytes.len());
        }
        Ok(key)
    }

    /// Remove the escrowed key. Succeeds if nothing is stored.
    pub async fn clear(&self) -> Result<()> {
        if !self.slot.is_available() {
            return Ok(());
        }
        self.slot.delete(&self.account).await?;
        debug!("Cleared escrowed key");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::memory::MemorySecureStorage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Prompt that replays queued outcomes, then authenticates
    #[derive(Default)]
    pub(crate) struct ScriptedPrompt {
        outcomes: Mutex<VecDeque<PromptOutcome>>,
        shown: Mutex<usize>,
    }

    impl ScriptedPrompt {
        pub(crate) fn push(&self, outcome: PromptOutcome) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        pub(crate) fn times_shown(&self) -> usize {
            *self.shown.lock().unwrap()
        }
    }

    #[async_trait]
    impl BiometricPrompt for ScriptedPrompt {
        fn is_supported(&self) -> bool {
            true
        }

        async fn authenticate(&self, _reason: &str) -> PromptOutcome {
            *self.shown.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PromptOutcome::Authenticated)
        }
    }

    fn escrow() -> (KeyEscrow, Arc<MemorySecureStorage>, Arc<ScriptedPrompt>) {
        let slot = Arc::new(MemorySecureStorage::new(true));
        let prompt = Arc::new(ScriptedPrompt::default());
        (KeyEscrow::new(slot.clone(), prompt.clone()), slot, prompt)
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let (escrow, slot, prompt) = escrow();
        let key = DerivedKey::new([9u8; 32]);

        escrow.deposit(&key).await.unwrap();
        assert!(slot.contains(ESCROW_SLOT));

        let withdrawn = escrow.withdraw("unlock").await.unwrap();
        assert_eq!(withdrawn, Some(key));
        assert_eq!(prompt.times_shown(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_prompt_releases_nothing() {
        let (escrow, _slot, prompt) = escrow();
        escrow.deposit(&DerivedKey::new([1u8; 32])).await.unwrap();

        prompt.push(PromptOutcome::Cancelled);
        assert!(matches!(
            escrow.withdraw("unlock").await,
            Err(VaultError::BiometricCancelled)
        ));

        prompt.push(PromptOutcome::Failed("sensor error".to_string()));
        assert!(matches!(
            escrow.withdraw("unlock").await,
            Err(VaultError::BiometricUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (escrow, slot, _prompt) = escrow();
        escrow.deposit(&DerivedKey::new([1u8; 32])).await.unwrap();

        escrow.clear().await.unwrap();
        escrow.clear().await.unwrap();

        assert!(!slot.contains(ESCROW_SLOT));
        assert!(escrow.withdraw("unlock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_slot_contents_rejected() {
        let (escrow, slot, _prompt) = escrow();
        slot.put(ESCROW_SLOT, b"short");

        assert!(escrow.withdraw("unlock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_do_not_share_a_slot() {
        let slot = Arc::new(MemorySecureStorage::new(true));
        let prompt = Arc::new(ScriptedPrompt::default());
        let first = KeyEscrow::new(slot.clone(), prompt.clone()).with_account("derived-key-a");
        let second = KeyEscrow::new(slot.clone(), prompt.clone()).with_account("derived-key-b");

        let key = DerivedKey::new([4u8; 32]);
        first.deposit(&key).await.unwrap();
        second.clear().await.unwrap();

        assert!(slot.contains("derived-key-a"));
        assert!(!slot.contains(ESCROW_SLOT));
        assert_eq!(first.withdraw("unlock").await.unwrap(), Some(key));
        assert!(second.withdraw("unlock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let escrow = KeyEscrow::new(
            Arc::new(MemorySecureStorage::new(true)),
            Arc::new(NoBiometrics),
        );

        assert!(!escrow.is_supported());
        assert!(matches!(
            escrow.deposit(&DerivedKey::new([1u8; 32])).await,
            Err(VaultError::BiometricUnavailable(_))
        ));
    }
}
