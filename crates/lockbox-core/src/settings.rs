//! Vault settings
//!
//! Stores non-sensitive flags in a plain JSON file next to the vault record.
//! Settings are readable while the vault is locked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, VaultError};

const SETTINGS_VERSION: u32 = 1;

/// Persisted settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Whether a derived key is escrowed for biometric unlock
    #[serde(default)]
    pub biometrics_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            biometrics_enabled: false,
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings from `storage_dir`, falling back to defaults
    pub fn new(storage_dir: &Path) -> Self {
        let settings_file = storage_dir.join("settings.json");
        let settings = match Self::load_from_file(&settings_file) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file: {}", e);
                Settings::default()
            }
        };

        Self {
            settings_file,
            settings,
        }
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        self.write(&self.settings).await
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        let contents = serde_json::to_string_pretty(settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| VaultError::StorageError(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.settings_file)
            .await
            .map_err(|e| VaultError::StorageError(e.to_string()))?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn biometrics_enabled(&self) -> bool {
        self.settings.biometrics_enabled
    }

    /// Set the biometrics flag and save. No write happens if unchanged, and
    /// the held flag only changes once the file is written.
    pub async fn set_biometrics_enabled(&mut self, enabled: bool) -> Result<()> {
        if self.settings.biometrics_enabled == enabled {
            return Ok(());
        }
        let updated = Settings {
            biometrics_enabled: enabled,
            ..self.settings.clone()
        };
        self.write(&updated).await?;
        self.settings = updated;
        Ok(())
    }

    /// Reset settings to defaults and delete the settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file)
                .await
                .map_err(|e| VaultError::StorageError(e.to_string()))?;
        }

        Ok(())
    }
}
