//! Vault entries: the stored password / wallet-key records and the form
//! and patch types callers use to create and edit them.

mod form;
mod types;

pub use form::{EntryForm, EntryPatch, PasswordForm, PasswordPatch, WalletKeyForm, WalletKeyPatch};
pub use types::{Entry, EntryKind, PasswordEntry, WalletKeyEntry};
