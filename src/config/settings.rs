//! Application settings
//!
//! JSON file in the home directory. Every field has a serde default so older
//! or hand-edited files with missing keys still load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::constants::{paths, tool, validation};
use crate::display::Displayplacer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_displayplacer_path")]
    pub displayplacer_path: PathBuf,

    /// Upper bound for a single tool invocation
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Defaults to `~/.monitor_layouts.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts_file: Option<PathBuf>,

    /// Defaults to `~/.monitor_layout_backups`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

fn default_displayplacer_path() -> PathBuf {
    PathBuf::from(tool::DEFAULT_PATH)
}

fn default_command_timeout_secs() -> u64 {
    tool::DEFAULT_TIMEOUT_SECS
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            displayplacer_path: default_displayplacer_path(),
            command_timeout_secs: default_command_timeout_secs(),
            layouts_file: None,
            backup_dir: None,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        home_dir().join(paths::SETTINGS_FILENAME)
    }

    /// Load from the default location, see [`Self::load_from`]
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Missing file: defaults are written out. Unreadable or malformed file:
    /// the error is logged and defaults are used for this run.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, creating default");
            let settings = Self::default();
            if let Err(err) = settings.save_to(path) {
                warn!(error = ?err, "Could not write default settings");
            }
            return settings;
        }

        let loaded = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))
            .and_then(|contents| {
                serde_json::from_str::<Settings>(&contents)
                    .with_context(|| format!("Failed to parse settings JSON from {}", path.display()))
            });

        match loaded {
            Ok(mut settings) => {
                settings.validate_and_clamp();
                settings
            }
            Err(err) => {
                error!(error = ?err, "Using default settings");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {}", path.display()))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    fn validate_and_clamp(&mut self) {
        use validation::*;

        if self.command_timeout_secs < MIN_TIMEOUT_SECS {
            warn!(command_timeout_secs = self.command_timeout_secs, min = MIN_TIMEOUT_SECS, "command_timeout_secs below minimum, clamping");
            self.command_timeout_secs = MIN_TIMEOUT_SECS;
        } else if self.command_timeout_secs > MAX_TIMEOUT_SECS {
            warn!(command_timeout_secs = self.command_timeout_secs, max = MAX_TIMEOUT_SECS, "command_timeout_secs exceeds maximum, clamping");
            self.command_timeout_secs = MAX_TIMEOUT_SECS;
        }
    }

    pub fn layouts_file(&self) -> PathBuf {
        self.layouts_file
            .clone()
            .unwrap_or_else(|| home_dir().join(paths::LAYOUTS_FILENAME))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(paths::BACKUP_DIRNAME))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn tool(&self) -> Displayplacer {
        Displayplacer::new(&self.displayplacer_path, self.command_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings::load_from(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"displayplacer_path": "/usr/local/bin/displayplacer", "layouts_file": "/tmp/l.json"}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.displayplacer_path, PathBuf::from("/usr/local/bin/displayplacer"));
        assert_eq!(settings.layouts_file(), PathBuf::from("/tmp/l.json"));
        assert_eq!(settings.command_timeout_secs, tool::DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.backup_dir, None);
    }

    #[test]
    fn test_timeout_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, r#"{"command_timeout_secs": 0}"#).unwrap();
        assert_eq!(Settings::load_from(&path).command_timeout_secs, validation::MIN_TIMEOUT_SECS);

        fs::write(&path, r#"{"command_timeout_secs": 9000}"#).unwrap();
        assert_eq!(Settings::load_from(&path).command_timeout_secs, validation::MAX_TIMEOUT_SECS);
    }

    #[test]
    fn test_malformed_file_uses_defaults_without_overwriting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "displayplacer_path = 'toml?'").unwrap();

        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "displayplacer_path = 'toml?'");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        // GUI-era keys from older settings files
        let settings: Settings = serde_json::from_str(r#"{"show_grid": true, "grid_size": 20, "theme": "dark"}"#).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
