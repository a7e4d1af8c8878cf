//! Entry type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::SecretString;

/// Kind of entry, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Website or app login
    Password,
    /// Crypto wallet recovery material
    WalletKey,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password => write!(f, "password"),
            Self::WalletKey => write!(f, "wallet_key"),
        }
    }
}

/// Login credentials for an app or website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordEntry {
    pub id: Uuid,
    /// Name of the app or website
    pub app_name: String,
    pub username: String,
    pub password_value: SecretString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recovery material for a crypto wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKeyEntry {
    pub id: Uuid,
    /// User label (e.g. "Main ETH wallet")
    pub label: String,
    /// Wallet provider (e.g. "MetaMask")
    pub wallet_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_phrase: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A vault entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Password(PasswordEntry),
    WalletKey(WalletKeyEntry),
}

impl Entry {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Password(e) => e.id,
            Self::WalletKey(e) => e.id,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Password(_) => EntryKind::Password,
            Self::WalletKey(_) => EntryKind::WalletKey,
        }
    }

    /// Name shown in listings (app name or wallet label)
    pub fn display_name(&self) -> &str {
        match self {
            Self::Password(e) => &e.app_name,
            Self::WalletKey(e) => &e.label,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Password(e) => e.category.as_deref(),
            Self::WalletKey(e) => e.category.as_deref(),
        }
    }

    pub fn website_url(&self) -> Option<&str> {
        match self {
            Self::Password(e) => e.website_url.as_deref(),
            Self::WalletKey(e) => e.website_url.as_deref(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Password(e) => e.created_at,
            Self::WalletKey(e) => e.created_at,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Self::Password(e) => e.updated_at,
            Self::WalletKey(e) => e.updated_at,
        }
    }

    /// Stamp a modification time, never earlier than creation
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        let (created_at, updated_at) = match self {
            Self::Password(e) => (e.created_at, &mut e.updated_at),
            Self::WalletKey(e) => (e.created_at, &mut e.updated_at),
        };
        *updated_at = now.max(created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_password() -> Entry {
        let now = Utc::now();
        Entry::Password(PasswordEntry {
            id: Uuid::new_v4(),
            app_name: "GitHub".to_string(),
            username: "dev".to_string(),
            password_value: SecretString::new("s3cr3t"),
            website_url: None,
            category: Some("Work".to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let entry = sample_password();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["type"], "password");
        assert_eq!(json["appName"], "GitHub");
        assert_eq!(json["passwordValue"], "s3cr3t");
        assert!(json.get("websiteUrl").is_none());

        let parsed: Entry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_wallet_key_optional_secrets_default_to_none() {
        let json = serde_json::json!({
            "type": "wallet_key",
            "id": Uuid::new_v4(),
            "label": "Main",
            "walletName": "MetaMask",
            "createdAt": Utc::now(),
            "updatedAt": Utc::now(),
        });

        let entry: Entry = serde_json::from_value(json).unwrap();
        match entry {
            Entry::WalletKey(w) => {
                assert!(w.secret_phrase.is_none());
                assert!(w.pin_code.is_none());
            }
            Entry::Password(_) => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_touch_never_precedes_creation() {
        let mut entry = sample_password();
        let created = entry.created_at();

        entry.touch(created - Duration::hours(1));
        assert_eq!(entry.updated_at(), created);

        let later = created + Duration::seconds(5);
        entry.touch(later);
        assert_eq!(entry.updated_at(), later);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", sample_password());
        assert!(!debug.contains("s3cr3t"));
    }
}
