//! Password-based key derivation using PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::secure_memory::{DerivedKey, KEY_LEN};
use crate::error::{Result, VaultError};

/// Salt length in bytes (128 bits)
pub const SALT_LEN: usize = 16;

/// Lowest iteration count accepted for new vaults
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Highest iteration count a persisted record or backup may ask for
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

/// Per-installation salt. Not secret, persisted verbatim (hex encoded).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MasterSalt([u8; SALT_LEN]);

impl MasterSalt {
    /// Wrap raw salt bytes
    pub fn new(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw salt bytes
    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Hex encoding used in the persisted record
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the persisted hex form
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| VaultError::KeyDerivationError(format!("Invalid salt hex: {}", e)))?;
        let bytes: [u8; SALT_LEN] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::KeyDerivationError(format!(
                "Invalid salt length: expected {}, got {}",
                SALT_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for MasterSalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterSalt").field(&self.to_hex()).finish()
    }
}

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// HMAC-SHA256 iterations (default: 100,000)
    pub iterations: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl KeyDerivationParams {
    /// Reject parameters weaker than the vault minimum
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_PBKDF2_ITERATIONS {
            return Err(VaultError::InvalidConfig(format!(
                "PBKDF2 iterations must be at least {}, got {}",
                MIN_PBKDF2_ITERATIONS, self.iterations
            )));
        }
        self.check_bounds()
            .map_err(|e| VaultError::InvalidConfig(e.to_string()))
    }

    /// Looser check for parameters read back from disk: non-zero and not
    /// so large that deriving would stall the unlock
    pub fn check_bounds(&self) -> Result<()> {
        if self.iterations == 0 || self.iterations > MAX_PBKDF2_ITERATIONS {
            return Err(VaultError::KeyDerivationError(format!(
                "PBKDF2 iterations must be between 1 and {}, got {}",
                MAX_PBKDF2_ITERATIONS, self.iterations
            )));
        }
        Ok(())
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> MasterSalt {
    let mut bytes = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut bytes);
    MasterSalt(bytes)
}

/// Derive a 256-bit key from a password using PBKDF2-HMAC-SHA256
///
/// Deterministic: the same password, salt and iteration count always yield
/// the same key, which is what lets the key be re-derived at every unlock
/// instead of being stored.
pub fn derive_key(
    password: &str,
    salt: &MasterSalt,
    params: &KeyDerivationParams,
) -> Result<DerivedKey> {
    if params.iterations == 0 {
        return Err(VaultError::KeyDerivationError(
            "Iteration count must be non-zero".to_string(),
        ));
    }

    let mut key_bytes = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        &mut *key_bytes,
    );

    Ok(DerivedKey::new(*key_bytes))
}

/// Run [`derive_key`] on the blocking thread pool.
///
/// If the returned future is dropped the derivation still finishes in the
/// background, but its key is discarded without being observed.
pub async fn derive_key_blocking(
    password: &str,
    salt: MasterSalt,
    params: KeyDerivationParams,
) -> Result<DerivedKey> {
    let password = Zeroizing::new(password.to_owned());
    tokio::task::spawn_blocking(move || derive_key(&password, &salt, &params))
        .await
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?
}
