//! Caller-supplied entry data for creating and editing entries
//!
//! Forms never carry an id or timestamps; those are assigned by the vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Entry, PasswordEntry, WalletKeyEntry};
use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// Fields for a new password entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordForm {
    pub app_name: String,
    pub username: String,
    pub password_value: SecretString,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Fields for a new wallet-key entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKeyForm {
    pub label: String,
    pub wallet_name: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub secret_phrase: Option<SecretString>,
    #[serde(default)]
    pub secret_key: Option<SecretString>,
    #[serde(default)]
    pub pin_code: Option<SecretString>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Data for a new entry; the variant decides the entry type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryForm {
    Password(PasswordForm),
    WalletKey(WalletKeyForm),
}

impl EntryForm {
    /// Build the stored entry with engine-assigned id and timestamps
    pub(crate) fn into_entry(self, id: Uuid, now: DateTime<Utc>) -> Result<Entry> {
        let entry = match self {
            Self::Password(form) => Entry::Password(PasswordEntry {
                id,
                app_name: form.app_name,
                username: form.username,
                password_value: form.password_value,
                website_url: normalize(form.website_url),
                category: normalize(form.category),
                created_at: now,
                updated_at: now,
            }),
            Self::WalletKey(form) => Entry::WalletKey(WalletKeyEntry {
                id,
                label: form.label,
                wallet_name: form.wallet_name,
                project_name: normalize(form.project_name),
                secret_phrase: normalize_secret(form.secret_phrase),
                secret_key: normalize_secret(form.secret_key),
                pin_code: normalize_secret(form.pin_code),
                website_url: normalize(form.website_url),
                category: normalize(form.category),
                created_at: now,
                updated_at: now,
            }),
        };
        validate(&entry)?;
        Ok(entry)
    }
}

impl From<PasswordForm> for EntryForm {
    fn from(form: PasswordForm) -> Self {
        Self::Password(form)
    }
}

impl From<WalletKeyForm> for EntryForm {
    fn from(form: WalletKeyForm) -> Self {
        Self::WalletKey(form)
    }
}

/// Partial update of a password entry. `None` leaves a field unchanged;
/// `Some(None)` clears an optional field. In JSON an absent key leaves the
/// field alone and `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPatch {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password_value: Option<SecretString>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub website_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
}

/// Partial update of a wallet-key entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKeyPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub wallet_name: Option<String>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub project_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub secret_phrase: Option<Option<SecretString>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<Option<SecretString>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<Option<SecretString>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub website_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
}

/// Partial update; must match the kind of the entry it is applied to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryPatch {
    Password(PasswordPatch),
    WalletKey(WalletKeyPatch),
}

impl EntryPatch {
    /// Merge into a copy of `entry`, leaving id, type and createdAt untouched
    pub(crate) fn apply(self, entry: &Entry, now: DateTime<Utc>) -> Result<Entry> {
        let mut updated = entry.clone();

        match (&mut updated, self) {
            (Entry::Password(e), Self::Password(p)) => {
                if let Some(v) = p.app_name {
                    e.app_name = v;
                }
                if let Some(v) = p.username {
                    e.username = v;
                }
                if let Some(v) = p.password_value {
                    e.password_value = v;
                }
                if let Some(v) = p.website_url {
                    e.website_url = normalize(v);
                }
                if let Some(v) = p.category {
                    e.category = normalize(v);
                }
            }
            (Entry::WalletKey(e), Self::WalletKey(p)) => {
                if let Some(v) = p.label {
                    e.label = v;
                }
                if let Some(v) = p.wallet_name {
                    e.wallet_name = v;
                }
                if let Some(v) = p.project_name {
                    e.project_name = normalize(v);
                }
                if let Some(v) = p.secret_phrase {
                    e.secret_phrase = normalize_secret(v);
                }
                if let Some(v) = p.secret_key {
                    e.secret_key = normalize_secret(v);
                }
                if let Some(v) = p.pin_code {
                    e.pin_code = normalize_secret(v);
                }
                if let Some(v) = p.website_url {
                    e.website_url = normalize(v);
                }
                if let Some(v) = p.category {
                    e.category = normalize(v);
                }
            }
            _ => return Err(VaultError::EntryKindMismatch),
        }

        updated.touch(now);
        validate(&updated)?;
        Ok(updated)
    }
}

impl From<PasswordPatch> for EntryPatch {
    fn from(patch: PasswordPatch) -> Self {
        Self::Password(patch)
    }
}

impl From<WalletKeyPatch> for EntryPatch {
    fn from(patch: WalletKeyPatch) -> Self {
        Self::WalletKey(patch)
    }
}

/// Present-but-null deserializes to `Some(None)`; absent keys fall back to
/// the `None` default
fn clearable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate(entry: &Entry) -> Result<()> {
    let missing = match entry {
        Entry::Password(e) if e.app_name.trim().is_empty() => Some("app name"),
        Entry::Password(e) if e.username.trim().is_empty() => Some("username"),
        Entry::WalletKey(e) if e.label.trim().is_empty() => Some("label"),
        Entry::WalletKey(e) if e.wallet_name.trim().is_empty() => Some("wallet name"),
        _ => None,
    };

    match missing {
        Some(field) => Err(VaultError::InvalidEntry(format!("{} is required", field))),
        None => Ok(()),
    }
}

// Blank optional fields are stored as absent
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_secret(value: Option<SecretString>) -> Option<SecretString> {
    value.filter(|v| !v.is_blank())
}
