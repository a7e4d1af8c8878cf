//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// Lockbox - local vault for passwords and wallet keys
#[derive(Parser, Debug)]
#[command(name = "lockbox")]
#[command(version)]
#[command(about = "Lockbox - local vault for passwords and wallet keys")]
pub struct Args {
    /// Vault directory (defaults to the platform data directory)
    #[arg(long, env = "LOCKBOX_DIR", global = true)]
    pub dir: Option<PathBuf>,

    /// OS keychain service holding the biometric escrow slot
    #[arg(long, env = "LOCKBOX_KEYCHAIN_SERVICE", global = true)]
    pub keychain_service: Option<String>,

    /// Master password. Prompted for when omitted.
    #[arg(long, env = "LOCKBOX_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Try biometric unlock before asking for the master password
    #[arg(long, global = true)]
    pub biometric: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new vault
    Init,

    /// List entries
    List {
        /// Include secret values
        #[arg(long)]
        reveal: bool,
    },

    /// Show one entry including its secrets
    Show {
        id: Uuid,

        /// Print the entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add an entry
    #[command(subcommand)]
    Add(AddCommand),

    /// Edit an entry
    Edit(EditArgs),

    /// Delete an entry
    Delete { id: Uuid },

    /// Change the master password
    ChangePassword,

    /// Manage biometric unlock
    #[command(subcommand)]
    Biometrics(BiometricsCommand),

    /// Write an encrypted backup
    Backup { file: PathBuf },

    /// Replace the vault with an encrypted backup
    Restore { file: PathBuf },

    /// Generate a random password
    Generate(GenerateArgs),

    /// Delete the vault and everything in it
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AddCommand {
    /// Add a website or app login
    Password(PasswordArgs),
    /// Add crypto wallet recovery material
    WalletKey(WalletKeyArgs),
}

#[derive(clap::Args, Debug)]
pub struct PasswordArgs {
    /// App or website name
    #[arg(long)]
    pub app: String,

    #[arg(long)]
    pub username: String,

    /// Generate the password instead of prompting for it
    #[arg(long)]
    pub generate: bool,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub category: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct WalletKeyArgs {
    #[arg(long)]
    pub label: String,

    /// Wallet provider, e.g. MetaMask
    #[arg(long)]
    pub wallet: String,

    #[arg(long)]
    pub project: Option<String>,

    /// Secrets to prompt for
    #[arg(long = "with", value_enum)]
    pub secrets: Vec<WalletSecret>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub category: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    pub id: Uuid,

    #[arg(long)]
    pub app: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub label: Option<String>,

    #[arg(long)]
    pub wallet: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Secrets to prompt for new values of
    #[arg(long = "set", value_enum)]
    pub set: Vec<SecretField>,

    /// Optional fields to clear
    #[arg(long, value_enum)]
    pub clear: Vec<ClearField>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletSecret {
    Phrase,
    SecretKey,
    Pin,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretField {
    Password,
    Phrase,
    SecretKey,
    Pin,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearField {
    Url,
    Category,
    Project,
    Phrase,
    SecretKey,
    Pin,
}

#[derive(Subcommand, Debug)]
pub enum BiometricsCommand {
    /// Escrow the vault key behind the biometric prompt
    Enable,
    /// Remove the escrowed key
    Disable,
    /// Show whether biometric unlock is supported and enabled
    Status,
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 16)]
    pub length: usize,

    #[arg(long)]
    pub no_uppercase: bool,

    #[arg(long)]
    pub no_digits: bool,

    #[arg(long)]
    pub no_symbols: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_password() {
        let args = Args::try_parse_from([
            "lockbox", "add", "password", "--app", "GitHub", "--username", "dev", "--generate",
        ])
        .unwrap();

        match args.command {
            Command::Add(AddCommand::Password(add)) => {
                assert_eq!(add.app, "GitHub");
                assert_eq!(add.username, "dev");
                assert!(add.generate);
                assert!(add.url.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_wallet_key_secrets() {
        let args = Args::try_parse_from([
            "lockbox", "add", "wallet-key", "--label", "Main", "--wallet", "MetaMask", "--with",
            "phrase", "--with", "pin",
        ])
        .unwrap();

        match args.command {
            Command::Add(AddCommand::WalletKey(add)) => {
                assert_eq!(add.secrets, vec![WalletSecret::Phrase, WalletSecret::Pin]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["lockbox", "list", "--reveal", "--dir", "/tmp/v", "--biometric"])
                .unwrap();

        assert_eq!(args.dir, Some(PathBuf::from("/tmp/v")));
        assert!(args.keychain_service.is_none());
        assert!(args.biometric);
        assert!(matches!(args.command, Command::List { reveal: true }));
    }

    #[test]
    fn test_rejects_bad_id() {
        assert!(Args::try_parse_from(["lockbox", "delete", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_edit_clear_fields() {
        let id = Uuid::new_v4().to_string();
        let args = Args::try_parse_from([
            "lockbox", "edit", &id, "--clear", "url", "--set", "password",
        ])
        .unwrap();

        match args.command {
            Command::Edit(edit) => {
                assert_eq!(edit.clear, vec![ClearField::Url]);
                assert_eq!(edit.set, vec![SecretField::Password]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_defaults() {
        let args = Args::try_parse_from(["lockbox", "generate"]).unwrap();
        match args.command {
            Command::Generate(generate) => {
                assert_eq!(generate.length, 16);
                assert!(!generate.no_symbols);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
