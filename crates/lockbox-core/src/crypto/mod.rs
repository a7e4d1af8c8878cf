//! Cryptographic primitives for the vault
//!
//! This module provides:
//! - AES-256-CBC encryption with PKCS#7 padding and per-call random IVs
//! - PBKDF2-HMAC-SHA256 key derivation from the master password
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{
    decrypt, decrypt_string, encrypt, encrypt_string, open, seal, EncryptedBlob, IV_LEN,
};
pub use key_derivation::{
    derive_key, derive_key_blocking, generate_salt, KeyDerivationParams, MasterSalt,
    MAX_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS, SALT_LEN,
};
pub use secure_memory::{DerivedKey, SecretString, KEY_LEN};
