//! Subcommand handlers

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use lockbox_core::{
    generate_password, Entry, EntryKind, EntryPatch, PasswordForm, PasswordPatch, PasswordPolicy,
    SecretString, Vault, VaultConfig, VaultError, WalletKeyForm, WalletKeyPatch,
};

use crate::args::{
    AddCommand, Args, BiometricsCommand, ClearField, Command, EditArgs, GenerateArgs,
    PasswordArgs, SecretField, WalletKeyArgs, WalletSecret,
};
use crate::prompt::{check_new_master_password, read_new_master_password, read_secret, TerminalPrompt};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Run one subcommand
pub async fn run(args: Args) -> CliResult<()> {
    let Args {
        dir,
        keychain_service,
        password,
        biometric,
        command,
        ..
    } = args;

    // Needs no vault
    if let Command::Generate(generate) = &command {
        return generate_cmd(generate);
    }

    let mut config = match dir {
        Some(dir) => VaultConfig::with_dir(dir),
        None => VaultConfig::new()?,
    };
    if let Some(service) = keychain_service {
        config = config.with_keychain_service(service);
    }
    let vault = Vault::open(&config, Arc::new(TerminalPrompt))
        .map_err(|e| format!("Failed to open vault: {}", e))?;

    let mut cli = Cli {
        vault,
        password: password.map(SecretString::from),
        biometric,
        storage_dir: config.storage_dir,
    };

    match command {
        Command::Init => cli.init().await,
        Command::List { reveal } => cli.list(reveal).await,
        Command::Show { id, json } => cli.show(id, json).await,
        Command::Add(AddCommand::Password(add)) => cli.add_password(add).await,
        Command::Add(AddCommand::WalletKey(add)) => cli.add_wallet_key(add).await,
        Command::Edit(edit) => cli.edit(edit).await,
        Command::Delete { id } => cli.delete(id).await,
        Command::ChangePassword => cli.change_password().await,
        Command::Biometrics(command) => cli.biometrics(command).await,
        Command::Backup { file } => cli.backup(file).await,
        Command::Restore { file } => cli.restore(file).await,
        Command::Wipe { yes } => cli.wipe(yes).await,
        Command::Generate(_) => Ok(()),
    }
}

fn generate_cmd(args: &GenerateArgs) -> CliResult<()> {
    let policy = PasswordPolicy {
        length: args.length,
        uppercase: !args.no_uppercase,
        digits: !args.no_digits,
        symbols: !args.no_symbols,
    };
    let password = generate_password(&policy)?;
    println!("{}", password.expose());
    Ok(())
}

struct Cli {
    vault: Vault,
    password: Option<SecretString>,
    biometric: bool,
    storage_dir: PathBuf,
}

impl Cli {
    fn master_password(&self) -> CliResult<SecretString> {
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => Ok(read_secret("Master password")?),
        }
    }

    fn ensure_initialized(&self) -> CliResult<()> {
        if !self.vault.is_initialized() {
            return Err(format!(
                "No vault in {} - run `lockbox init` first",
                self.storage_dir.display()
            )
            .into());
        }
        Ok(())
    }

    /// Unlock for reading or editing entries, trying biometrics first when asked
    async fn unlock(&mut self) -> CliResult<()> {
        self.ensure_initialized()?;

        if self.biometric {
            if self.vault.unlock_with_biometrics().await? {
                return Ok(());
            }
            info!("Biometric unlock unavailable, falling back to the master password");
        }

        let password = self.master_password()?;
        self.vault.unlock(password.expose()).await?;
        Ok(())
    }

    /// Unlock with the master password and keep it for a second check
    async fn unlock_with_password(&mut self) -> CliResult<SecretString> {
        self.ensure_initialized()?;
        let password = self.master_password()?;
        self.vault.unlock(password.expose()).await?;
        Ok(password)
    }

    fn find(&self, id: Uuid) -> CliResult<&Entry> {
        Ok(self
            .vault
            .entry(id)?
            .ok_or(VaultError::EntryNotFound(id))?)
    }

    async fn init(&mut self) -> CliResult<()> {
        if self.vault.is_initialized() {
            return Err(format!("A vault already exists in {}", self.storage_dir.display()).into());
        }

        let password = match &self.password {
            Some(password) => {
                check_new_master_password(password)?;
                password.clone()
            }
            None => read_new_master_password()?,
        };

        self.vault.setup(password.expose()).await?;
        println!("Vault created in {}", self.storage_dir.display());
        Ok(())
    }

    async fn list(&mut self, reveal: bool) -> CliResult<()> {
        self.unlock().await?;

        let entries = self.vault.list_entries()?;
        if entries.is_empty() {
            println!("No entries");
        }
        for entry in entries {
            println!("{}", summary_line(entry));
            if reveal {
                for (name, value) in secret_fields(entry) {
                    println!("    {}: {}", name, value);
                }
            }
        }
        Ok(())
    }

    async fn show(&mut self, id: Uuid, json: bool) -> CliResult<()> {
        self.unlock().await?;
        let entry = self.find(id)?;

        if json {
            println!("{}", serde_json::to_string_pretty(entry)?);
            return Ok(());
        }

        for (name, value) in detail_fields(entry) {
            println!("{:<14} {}", format!("{}:", name), value);
        }
        for (name, value) in secret_fields(entry) {
            println!("{:<14} {}", format!("{}:", name), value);
        }
        Ok(())
    }

    async fn add_password(&mut self, args: PasswordArgs) -> CliResult<()> {
        self.unlock().await?;

        let password_value = if args.generate {
            let generated = generate_password(&PasswordPolicy::default())?;
            println!("Generated password: {}", generated.expose());
            generated
        } else {
            read_secret("Password")?
        };

        let entry = self
            .vault
            .add_entry(PasswordForm {
                app_name: args.app,
                username: args.username,
                password_value,
                website_url: args.url,
                category: args.category,
            })
            .await?;

        println!("Added {}", entry.id());
        Ok(())
    }

    async fn add_wallet_key(&mut self, args: WalletKeyArgs) -> CliResult<()> {
        self.unlock().await?;

        let prompt_for = |secret: WalletSecret, label: &str| -> CliResult<Option<SecretString>> {
            if args.secrets.contains(&secret) {
                Ok(Some(read_secret(label)?))
            } else {
                Ok(None)
            }
        };
        let secret_phrase = prompt_for(WalletSecret::Phrase, "Recovery phrase")?;
        let secret_key = prompt_for(WalletSecret::SecretKey, "Secret key")?;
        let pin_code = prompt_for(WalletSecret::Pin, "PIN")?;

        let entry = self
            .vault
            .add_entry(WalletKeyForm {
                label: args.label,
                wallet_name: args.wallet,
                project_name: args.project,
                secret_phrase,
                secret_key,
                pin_code,
                website_url: args.url,
                category: args.category,
            })
            .await?;

        println!("Added {}", entry.id());
        Ok(())
    }

    async fn edit(&mut self, args: EditArgs) -> CliResult<()> {
        self.unlock().await?;

        let kind = self.find(args.id)?.kind();
        let patch = build_patch(kind, &args, read_secret)?;
        self.vault.update_entry(args.id, patch).await?;

        println!("Updated {}", args.id);
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> CliResult<()> {
        self.unlock().await?;

        if self.vault.entry(id)?.is_none() {
            println!("No entry {}", id);
            return Ok(());
        }
        self.vault.delete_entry(id).await?;
        println!("Deleted {}", id);
        Ok(())
    }

    async fn change_password(&mut self) -> CliResult<()> {
        let current = self.unlock_with_password().await?;
        let new_password = read_new_master_password()?;
        let had_biometrics = self.vault.is_biometrics_enabled();

        self.vault
            .change_master_password(current.expose(), new_password.expose())
            .await?;

        println!("Master password changed");
        if had_biometrics {
            println!("Biometric unlock was turned off; run `lockbox biometrics enable` to turn it back on");
        }
        Ok(())
    }

    async fn biometrics(&mut self, command: BiometricsCommand) -> CliResult<()> {
        match command {
            BiometricsCommand::Enable => {
                if !self.vault.is_biometrics_supported() {
                    return Err("Biometric unlock needs an interactive terminal and a reachable OS keychain".into());
                }
                let password = self.unlock_with_password().await?;
                self.vault.enable_biometrics(password.expose()).await?;
                println!("Biometric unlock enabled");
            }
            BiometricsCommand::Disable => {
                self.vault.disable_biometrics().await?;
                println!("Biometric unlock disabled");
            }
            BiometricsCommand::Status => {
                println!("supported: {}", self.vault.is_biometrics_supported());
                println!("enabled:   {}", self.vault.is_biometrics_enabled());
            }
        }
        Ok(())
    }

    async fn backup(&mut self, file: PathBuf) -> CliResult<()> {
        self.ensure_initialized()?;

        let bytes = self.vault.backup().await?;
        tokio::fs::write(&file, &bytes)
            .await
            .map_err(|e| format!("Failed to write {}: {}", file.display(), e))?;

        println!("Backup written to {}", file.display());
        Ok(())
    }

    async fn restore(&mut self, file: PathBuf) -> CliResult<()> {
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

        self.vault.restore(&bytes).await?;
        debug!("Restored {} bytes from {:?}", bytes.len(), file);

        println!("Vault restored. Unlock it with the master password in use when the backup was made.");
        Ok(())
    }

    async fn wipe(&mut self, yes: bool) -> CliResult<()> {
        if !yes {
            return Err("Refusing to wipe the vault without --yes".into());
        }
        self.vault.wipe().await?;
        println!("Vault wiped");
        Ok(())
    }
}

fn summary_line(entry: &Entry) -> String {
    let detail = match entry {
        Entry::Password(e) => e.username.as_str(),
        Entry::WalletKey(e) => e.wallet_name.as_str(),
    };
    let mut line = format!(
        "{}  {:<10}  {} ({})",
        entry.id(),
        entry.kind(),
        entry.display_name(),
        detail
    );
    if let Some(category) = entry.category() {
        line.push_str(&format!(" [{}]", category));
    }
    line
}

/// Non-secret fields, in display order
fn detail_fields(entry: &Entry) -> Vec<(&'static str, String)> {
    let mut fields = vec![("id", entry.id().to_string()), ("type", entry.kind().to_string())];

    match entry {
        Entry::Password(e) => {
            fields.push(("app", e.app_name.clone()));
            fields.push(("username", e.username.clone()));
        }
        Entry::WalletKey(e) => {
            fields.push(("label", e.label.clone()));
            fields.push(("wallet", e.wallet_name.clone()));
            if let Some(project) = &e.project_name {
                fields.push(("project", project.clone()));
            }
        }
    }
    if let Some(url) = entry.website_url() {
        fields.push(("url", url.to_string()));
    }
    if let Some(category) = entry.category() {
        fields.push(("category", category.to_string()));
    }
    fields.push(("created", entry.created_at().to_rfc3339()));
    fields.push(("updated", entry.updated_at().to_rfc3339()));
    fields
}

fn secret_fields(entry: &Entry) -> Vec<(&'static str, &str)> {
    match entry {
        Entry::Password(e) => vec![("password", e.password_value.expose())],
        Entry::WalletKey(e) => [
            ("phrase", &e.secret_phrase),
            ("secret key", &e.secret_key),
            ("pin", &e.pin_code),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name, v.expose())))
        .collect(),
    }
}

/// Turn edit flags into a patch for an entry of `kind`. `read` supplies
/// new secret values.
fn build_patch<F>(kind: EntryKind, args: &EditArgs, mut read: F) -> CliResult<EntryPatch>
where
    F: FnMut(&str) -> std::io::Result<SecretString>,
{
    let cleared = |field: ClearField| args.clear.contains(&field);
    let set = |field: SecretField| args.set.contains(&field);

    match kind {
        EntryKind::Password => {
            reject(args.label.is_some(), "--label", kind)?;
            reject(args.wallet.is_some(), "--wallet", kind)?;
            reject(args.project.is_some(), "--project", kind)?;
            reject(
                args.set.iter().any(|field| *field != SecretField::Password),
                "--set phrase/secret-key/pin",
                kind,
            )?;
            reject(
                args.clear
                    .iter()
                    .any(|field| !matches!(field, ClearField::Url | ClearField::Category)),
                "--clear project/phrase/secret-key/pin",
                kind,
            )?;

            let password_value = if set(SecretField::Password) {
                Some(read("New password")?)
            } else {
                None
            };

            Ok(PasswordPatch {
                app_name: args.app.clone(),
                username: args.username.clone(),
                password_value,
                website_url: optional_field(&args.url, cleared(ClearField::Url), "url")?,
                category: optional_field(&args.category, cleared(ClearField::Category), "category")?,
            }
            .into())
        }
        EntryKind::WalletKey => {
            reject(args.app.is_some(), "--app", kind)?;
            reject(args.username.is_some(), "--username", kind)?;
            reject(set(SecretField::Password), "--set password", kind)?;

            let mut secret = |field: SecretField, clear: ClearField, label: &str| {
                secret_field(set(field), cleared(clear), label, &mut read)
            };
            let secret_phrase = secret(SecretField::Phrase, ClearField::Phrase, "New recovery phrase")?;
            let secret_key = secret(SecretField::SecretKey, ClearField::SecretKey, "New secret key")?;
            let pin_code = secret(SecretField::Pin, ClearField::Pin, "New PIN")?;

            Ok(WalletKeyPatch {
                label: args.label.clone(),
                wallet_name: args.wallet.clone(),
                project_name: optional_field(&args.project, cleared(ClearField::Project), "project")?,
                secret_phrase,
                secret_key,
                pin_code,
                website_url: optional_field(&args.url, cleared(ClearField::Url), "url")?,
                category: optional_field(&args.category, cleared(ClearField::Category), "category")?,
            }
            .into())
        }
    }
}

fn reject(present: bool, flag: &str, kind: EntryKind) -> CliResult<()> {
    if present {
        return Err(format!("{} does not apply to {} entries", flag, kind).into());
    }
    Ok(())
}

fn optional_field(
    value: &Option<String>,
    cleared: bool,
    name: &str,
) -> CliResult<Option<Option<String>>> {
    match (value, cleared) {
        (Some(_), true) => Err(format!("--{} and --clear {} conflict", name, name).into()),
        (Some(value), false) => Ok(Some(Some(value.clone()))),
        (None, true) => Ok(Some(None)),
        (None, false) => Ok(None),
    }
}

fn secret_field<F>(
    set: bool,
    cleared: bool,
    label: &str,
    read: &mut F,
) -> CliResult<Option<Option<SecretString>>>
where
    F: FnMut(&str) -> std::io::Result<SecretString>,
{
    match (set, cleared) {
        (true, true) => Err(format!("Cannot both set and clear: {}", label).into()),
        (true, false) => Ok(Some(Some(read(label)?))),
        (false, true) => Ok(Some(None)),
        (false, false) => Ok(None),
    }
}
