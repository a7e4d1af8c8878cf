//! Random password generation

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Character classes and length for generated passwords.
/// Lowercase letters are always included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    pub length: usize,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordPolicy {
    fn classes(&self) -> Vec<&'static [u8]> {
        let mut classes = vec![LOWERCASE];
        if self.uppercase {
            classes.push(UPPERCASE);
        }
        if self.digits {
            classes.push(DIGITS);
        }
        if self.symbols {
            classes.push(SYMBOLS);
        }
        classes
    }
}

/// Generate a password from the OS RNG. Every enabled character class
/// appears at least once.
pub fn generate_password(policy: &PasswordPolicy) -> Result<SecretString> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&policy.length) {
        return Err(VaultError::InvalidConfig(format!(
            "Password length must be between {} and {}, got {}",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH, policy.length
        )));
    }

    let classes = policy.classes();
    let alphabet: Vec<u8> = classes.concat();
    let mut rng = OsRng;

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < policy.length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    chars.shuffle(&mut rng);

    // Alphabets are ASCII
    let password: String = chars.iter().map(|&b| b as char).collect();
    Ok(SecretString::new(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_any(password: &str, class: &[u8]) -> bool {
        password.bytes().any(|b| class.contains(&b))
    }

    #[test]
    fn test_default_policy_covers_all_classes() {
        let password = generate_password(&PasswordPolicy::default()).unwrap();
        let value = password.expose();

        assert_eq!(value.len(), 16);
        assert!(has_any(value, LOWERCASE));
        assert!(has_any(value, UPPERCASE));
        assert!(has_any(value, DIGITS));
        assert!(has_any(value, SYMBOLS));
    }

    #[test]
    fn test_disabled_classes_are_absent() {
        let policy = PasswordPolicy {
            length: 64,
            uppercase: false,
            digits: true,
            symbols: false,
        };
        let password = generate_password(&policy).unwrap();
        let value = password.expose();

        assert!(!has_any(value, UPPERCASE));
        assert!(!has_any(value, SYMBOLS));
        assert!(value.bytes().all(|b| LOWERCASE.contains(&b) || DIGITS.contains(&b)));
    }

    #[test]
    fn test_length_bounds() {
        for length in [0, 7, 129] {
            let policy = PasswordPolicy {
                length,
                ..Default::default()
            };
            assert!(generate_password(&policy).is_err());
        }
    }

    #[test]
    fn test_passwords_differ() {
        let a = generate_password(&PasswordPolicy::default()).unwrap();
        let b = generate_password(&PasswordPolicy::default()).unwrap();
        assert_ne!(a, b);
    }
}
