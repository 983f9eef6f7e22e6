//! Raw display report backups
//!
//! A backup stores the unparsed `list` output with a timestamp. It is a
//! record of what the tool reported, not a layout: restoring from it is not
//! supported and [`restore_backup`] says so explicitly.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::constants::paths;
use crate::display::DisplayTool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayBackup {
    pub timestamp: NaiveDateTime,
    pub displayplacer_output: String,
    #[serde(default = "default_backup_type")]
    pub backup_type: String,
}

const MAX_NAME_ATTEMPTS: usize = 1000;

fn default_backup_type() -> String {
    "automatic".to_string()
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup from {timestamp} was read, but restoring displays from a raw report is not supported")]
    RestoreUnsupported { timestamp: NaiveDateTime },
}

/// Query the tool and write `layout_backup_<ts>.json` into `dir`
pub fn create_backup(tool: &impl DisplayTool, dir: &Path) -> Result<PathBuf> {
    let output = tool.list().context("Failed to query displays for backup")?;
    let now = Local::now();
    let backup = DisplayBackup {
        timestamp: now.naive_local(),
        displayplacer_output: output,
        backup_type: default_backup_type(),
    };

    fs::create_dir_all(dir).with_context(|| format!("Failed to create backup directory {}", dir.display()))?;
    let json = serde_json::to_string_pretty(&backup).context("Failed to serialize backup")?;
    let stem = format!("layout_backup_{}", now.format(paths::FILE_TIMESTAMP_FORMAT));
    let (path, mut file) = create_unique(dir, &stem)?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write backup {}", path.display()))?;

    info!(path = %path.display(), "Created display backup");
    Ok(path)
}

/// `<stem>.json`, or `<stem>_<n>.json` when earlier backups in the same
/// second already exist. Existing files are never overwritten.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}_{attempt}.json")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err).with_context(|| format!("Failed to create backup {}", path.display())),
        }
    }
    bail!("Too many backups named {stem} in {}", dir.display())
}

pub fn read_backup(path: &Path) -> Result<DisplayBackup> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read backup {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse backup {}", path.display()))
}

/// Always fails: either the file can't be read, or with
/// [`BackupError::RestoreUnsupported`] carrying the backup's timestamp.
pub fn restore_backup(path: &Path) -> Result<()> {
    let backup = read_backup(path)?;
    info!(path = %path.display(), timestamp = %backup.timestamp, "Loaded display backup");
    Err(BackupError::RestoreUnsupported {
        timestamp: backup.timestamp,
    }
    .into())
}
