//! AES-256-CBC encryption with PKCS#7 padding
//!
//! Encoded format: `base64(iv || ciphertext)`
//! - IV: 16 bytes, freshly random per call
//! - Ciphertext: whole AES blocks (PKCS#7 padded)
//!
//! All decryption failures are reported as the same opaque
//! [`VaultError::DecryptionFailed`] to avoid acting as a padding oracle.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use zeroize::Zeroizing;

use super::DerivedKey;
use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV length in bytes (one AES block)
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// Encrypted payload with its IV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Initialization vector
    pub iv: [u8; IV_LEN],
    /// Padded ciphertext
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut raw = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.ciphertext);
        f.write_str(&base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

impl EncryptedBlob {
    /// Parse the encoded `base64(iv || ciphertext)` form
    pub fn from_string(s: &str) -> Result<Self> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(s.trim())
            .map_err(|_| VaultError::DecryptionFailed)?;

        if raw.len() < IV_LEN + BLOCK_LEN || (raw.len() - IV_LEN) % BLOCK_LEN != 0 {
            return Err(VaultError::DecryptionFailed);
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&raw[..IV_LEN]);

        Ok(Self {
            iv,
            ciphertext: raw[IV_LEN..].to_vec(),
        })
    }
}

/// Encrypt plaintext using AES-256-CBC with a fresh random IV
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<EncryptedBlob> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(EncryptedBlob { iv, ciphertext })
}

/// Decrypt an [`EncryptedBlob`]
pub fn decrypt(encrypted: &EncryptedBlob, key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.ciphertext.is_empty() || encrypted.ciphertext.len() % BLOCK_LEN != 0 {
        return Err(VaultError::DecryptionFailed);
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &encrypted.iv)
        .map_err(|_| VaultError::DecryptionFailed)?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&encrypted.ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Encrypt a string and return the encoded form
pub fn encrypt_string(plaintext: &str, key: &DerivedKey) -> Result<String> {
    Ok(encrypt(plaintext.as_bytes(), key)?.to_string())
}

/// Decrypt from the encoded form and return as string
pub fn decrypt_string(encoded: &str, key: &DerivedKey) -> Result<Zeroizing<String>> {
    let blob = EncryptedBlob::from_string(encoded)?;
    let plaintext = decrypt(&blob, key)?;
    std::str::from_utf8(&plaintext)
        .map(|s| Zeroizing::new(s.to_owned()))
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Serialize a value to JSON and encrypt it
pub fn seal<T: Serialize + ?Sized>(value: &T, key: &DerivedKey) -> Result<String> {
    let json = Zeroizing::new(serde_json::to_vec(value)?);
    Ok(encrypt(&json, key)?.to_string())
}

/// Decrypt an encoded blob and deserialize its JSON payload
pub fn open<T: DeserializeOwned>(encoded: &str, key: &DerivedKey) -> Result<T> {
    let blob = EncryptedBlob::from_string(encoded)?;
    let plaintext = decrypt(&blob, key)?;
    serde_json::from_slice(&plaintext).map_err(|_| VaultError::DecryptionFailed)
}
