//! Terminal input: master password prompts and the confirmation gate that
//! stands in for a platform biometric prompt

use async_trait::async_trait;
use lockbox_core::{BiometricPrompt, PromptOutcome, SecretString};
use std::io::{BufRead, IsTerminal, Write};

/// Shortest master password accepted for new vaults
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Biometric gate for terminals: the user confirms with `y` on an
/// interactive terminal. Anything else cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl BiometricPrompt for TerminalPrompt {
    fn is_supported(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    async fn authenticate(&self, reason: &str) -> PromptOutcome {
        let reason = reason.to_string();
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            write!(stderr, "{} - confirm [y/N]: ", reason)?;
            stderr.flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => confirmation_outcome(&line),
            Ok(Err(e)) => PromptOutcome::Failed(e.to_string()),
            Err(e) => PromptOutcome::Failed(e.to_string()),
        }
    }
}

fn confirmation_outcome(line: &str) -> PromptOutcome {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => PromptOutcome::Authenticated,
        _ => PromptOutcome::Cancelled,
    }
}

/// Read a secret without echo
pub fn read_secret(label: &str) -> std::io::Result<SecretString> {
    rpassword::prompt_password(format!("{}: ", label)).map(SecretString::from)
}

/// Read a new master password twice and check it
pub fn read_new_master_password() -> Result<SecretString, String> {
    let first = read_secret("New master password").map_err(|e| e.to_string())?;
    check_new_master_password(&first)?;
    let second = read_secret("Confirm master password").map_err(|e| e.to_string())?;
    if first != second {
        return Err("Passwords do not match".to_string());
    }
    Ok(first)
}

pub fn check_new_master_password(password: &SecretString) -> Result<(), String> {
    if password.expose().chars().count() < MIN_MASTER_PASSWORD_LEN {
        return Err(format!(
            "Master password must be at least {} characters",
            MIN_MASTER_PASSWORD_LEN
        ));
    }
    Ok(())
}
