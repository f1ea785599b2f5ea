//! Settings persistence (settings.json).

use super::{ConfigError, Settings};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SETTINGS_FILE: &str = "settings.json";

/// Source of the settings snapshot.
///
/// The engine reads a fresh snapshot per operation and writes back through
/// `set` + `persist`.
pub trait SettingsStore {
    fn get(&self) -> Settings;

    fn set(&mut self, settings: Settings);

    /// Write the current snapshot to durable storage.
    fn persist(&mut self) -> Result<(), ConfigError>;
}

/// Settings stored as pretty-printed JSON in the user config directory.
pub struct JsonSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl JsonSettingsStore {
    /// Open the store in the standard per-user config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(&Self::default_dir()?)
    }

    /// Per-user directory holding settings and logs.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", "voicemeeter-windows-volume")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Open the store in `dir`. A missing file yields defaults.
    pub fn open(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(SETTINGS_FILE);
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("No settings at {:?}, using defaults", path);
            Settings::default()
        };

        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self) -> Settings {
        self.settings.clone()
    }

    fn set(&mut self, settings: Settings) {
        self.settings = settings;
    }

    fn persist(&mut self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, content)?;
        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}
