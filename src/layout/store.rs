//! JSON-backed collection of layout profiles
//!
//! The file is a single object mapping layout name → profile. It is read once
//! when the store is opened and rewritten in full after every mutation.
//! There is no locking: two processes saving at once is last-writer-wins.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::LayoutError;
use super::profile::LayoutProfile;
use crate::constants::paths;

type Collection = IndexMap<String, LayoutProfile>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing layouts; ask per conflicting name whether to overwrite
    Merge,
    /// Back up the current file, then replace the whole collection
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub kept_existing: Vec<String>,
    pub rejected: Vec<String>,
    pub backup: Option<PathBuf>,
}

#[derive(Debug)]
pub struct LayoutStore {
    path: PathBuf,
    layouts: Collection,
    load_error: Option<String>,
}

impl LayoutStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or malformed file is reported through [`Self::load_error`]
    /// and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_collection(&path) {
            Ok(layouts) => {
                info!(path = %path.display(), count = layouts.len(), "Loaded layouts");
                Self {
                    path,
                    layouts,
                    load_error: None,
                }
            }
            Err(err) => {
                error!(path = %path.display(), error = ?err, "Failed to load layouts, starting empty");
                preserve_unreadable(&path);
                Self {
                    path,
                    layouts: Collection::new(),
                    load_error: Some(format!("{err:#}")),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Names in stored order
    pub fn names(&self) -> Vec<&str> {
        self.layouts.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&LayoutProfile> {
        self.layouts.get(name)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &LayoutProfile> {
        self.layouts.values()
    }

    /// Like [`Self::get`], with close names attached when missing
    pub fn require(&self, name: &str) -> Result<&LayoutProfile, LayoutError> {
        self.layouts.get(name).ok_or_else(|| LayoutError::NotFound {
            name: name.to_string(),
            suggestions: self.suggestions(name),
        })
    }

    /// Stored names containing `query`, case-insensitively
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.layouts
            .keys()
            .filter(|name| name.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// Insert or overwrite a profile by name, then rewrite the file.
    ///
    /// When the write fails the profile stays in memory and the error is
    /// returned; disk and memory differ until the next successful write.
    pub fn save(&mut self, profile: LayoutProfile) -> Result<()> {
        profile.validate()?;
        let name = profile.name.clone();
        let replaced = self.layouts.insert(name.clone(), profile).is_some();
        info!(layout = %name, replaced, "Saved layout");
        self.persist()
    }

    /// Returns false when no layout had that name
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        if self.layouts.shift_remove(name).is_none() {
            return Ok(false);
        }
        info!(layout = %name, "Deleted layout");
        self.persist()?;
        Ok(true)
    }

    pub fn mark_used(&mut self, name: &str, at: NaiveDateTime) -> Result<()> {
        let Some(profile) = self.layouts.get_mut(name) else {
            return Err(LayoutError::NotFound {
                name: name.to_string(),
                suggestions: Vec::new(),
            }
            .into());
        };
        profile.last_used_at = Some(at);
        self.persist()
    }

    /// Rewrite the whole file (temp file + rename)
    pub fn persist(&self) -> Result<()> {
        write_collection(&self.path, &self.layouts)
            .inspect_err(|err| error!(path = %self.path.display(), error = ?err, "Failed to write layouts"))
    }

    /// Write every layout to `path` in the store file format
    pub fn export_to(&self, path: &Path) -> Result<usize> {
        write_collection(path, &self.layouts)?;
        info!(path = %path.display(), count = self.layouts.len(), "Exported layouts");
        Ok(self.layouts.len())
    }

    /// Import layouts from a file in the store format.
    ///
    /// `overwrite` is asked once per conflicting name in [`ImportMode::Merge`].
    /// Entries that fail validation are skipped and listed in the summary.
    pub fn import_from(
        &mut self,
        path: &Path,
        mode: ImportMode,
        backup_dir: &Path,
        mut overwrite: impl FnMut(&str) -> bool,
    ) -> Result<ImportSummary> {
        let incoming = read_collection(path)
            .with_context(|| format!("Failed to import layouts from {}", path.display()))?;
        let mut summary = ImportSummary::default();

        if mode == ImportMode::Replace {
            summary.backup = self.backup_file(backup_dir)?;
            self.layouts.clear();
        }

        for (name, mut profile) in incoming {
            profile.name = name.clone();
            if let Err(err) = profile.validate() {
                warn!(layout = %name, error = %err, "Skipping invalid imported layout");
                summary.rejected.push(name);
                continue;
            }
            if mode == ImportMode::Merge && self.layouts.contains_key(&name) && !overwrite(&name) {
                summary.kept_existing.push(name);
                continue;
            }
            self.layouts.insert(name, profile);
            summary.imported += 1;
        }

        info!(
            path = %path.display(),
            imported = summary.imported,
            kept = summary.kept_existing.len(),
            rejected = summary.rejected.len(),
            "Imported layouts"
        );
        self.persist()?;
        Ok(summary)
    }

    /// Copy the current store file into `dir` with a timestamped name.
    /// Returns None when there is no file yet.
    fn backup_file(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;
        let stamp = Local::now().format(paths::FILE_TIMESTAMP_FORMAT);
        let target = dir.join(format!("layouts_backup_{stamp}.json"));
        fs::copy(&self.path, &target)
            .with_context(|| format!("Failed to back up {} to {}", self.path.display(), target.display()))?;
        info!(backup = %target.display(), "Backed up layouts before replacing");
        Ok(Some(target))
    }
}

fn read_collection(path: &Path) -> Result<Collection> {
    if !path.exists() {
        return Ok(Collection::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read layouts from {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Collection::new());
    }
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse layouts JSON from {}", path.display()))
}

fn write_collection(path: &Path, layouts: &Collection) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(layouts).context("Failed to serialize layouts")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Keep a copy of a file we could not parse, so the next write doesn't lose it
fn preserve_unreadable(path: &Path) {
    if !path.exists() {
        return;
    }
    let mut copy = path.as_os_str().to_owned();
    copy.push(".unreadable");
    if let Err(e) = fs::copy(path, &copy) {
        warn!(path = %path.display(), error = %e, "Could not keep a copy of the unreadable layouts file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::profile::DisplaySettings;
    use crate::types::Resolution;
    use tempfile::tempdir;

    fn profile(name: &str) -> LayoutProfile {
        let mut p = LayoutProfile::new(name, format!("{name} setup"), NaiveDateTime::default());
        p.display_configs.insert(
            "AAAA".to_string(),
            DisplaySettings {
                resolution: Some(Resolution::new(2560, 1440)),
                ..Default::default()
            },
        );
        p
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = LayoutStore::open(dir.path().join("layouts.json"));
        assert!(store.is_empty());
        assert!(store.load_error().is_none());
    }

    #[test]
    fn test_open_malformed_file_starts_empty_and_reports() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layouts.json");
        fs::write(&path, "{ not json").unwrap();

        let store = LayoutStore::open(&path);
        assert!(store.is_empty());
        assert!(store.load_error().is_some());
        assert!(dir.path().join("layouts.json.unreadable").exists());
    }

    #[test]
    fn test_save_persists_and_reloads_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layouts.json");

        let mut store = LayoutStore::open(&path);
        store.save(profile("work")).unwrap();
        store.save(profile("home")).unwrap();
        store.save(profile("arzopa")).unwrap();

        let reloaded = LayoutStore::open(&path);
        assert_eq!(reloaded.names(), vec!["work", "home", "arzopa"]);
        assert_eq!(reloaded.get("home"), Some(&profile("home")));
        assert!(!dir.path().join("layouts.json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_same_name() {
        let dir = tempdir().unwrap();
        let mut store = LayoutStore::open(dir.path().join("layouts.json"));
        store.save(profile("work")).unwrap();

        let mut updated = profile("work");
        updated.description = "second".to_string();
        store.save(updated).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("work").unwrap().description, "second");
    }

    #[test]
    fn test_delete_and_missing_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layouts.json");
        let mut store = LayoutStore::open(&path);
        store.save(profile("work")).unwrap();
        store.save(profile("home")).unwrap();

        assert!(store.delete("work").unwrap());
        assert!(!store.delete("work").unwrap());
        assert_eq!(LayoutStore::open(&path).names(), vec!["home"]);
    }

    #[test]
    fn test_require_suggests_case_insensitive_substrings() {
        let dir = tempdir().unwrap();
        let mut store = LayoutStore::open(dir.path().join("layouts.json"));
        store.save(profile("Home Office")).unwrap();
        store.save(profile("home-travel")).unwrap();
        store.save(profile("work")).unwrap();

        let err = store.require("HOME").unwrap_err();
        match err {
            LayoutError::NotFound { name, suggestions } => {
                assert_eq!(name, "HOME");
                assert_eq!(suggestions, vec!["Home Office", "home-travel"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(store.require("work").is_ok());
    }

    #[test]
    fn test_mark_used_persists_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layouts.json");
        let mut store = LayoutStore::open(&path);
        store.save(profile("work")).unwrap();

        let at = Local::now().naive_local();
        store.mark_used("work", at).unwrap();
        assert_eq!(LayoutStore::open(&path).get("work").unwrap().last_used_at, Some(at));
        assert!(store.mark_used("nope", at).is_err());
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let dir = tempdir().unwrap();
        // parent "directory" is a regular file, so every write fails
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut store = LayoutStore::open(blocker.join("layouts.json"));
        assert!(store.save(profile("work")).is_err());
        assert_eq!(store.names(), vec!["work"]);
    }

    #[test]
    fn test_export_then_import_merge_asks_per_conflict() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("export.json");

        let mut source = LayoutStore::open(dir.path().join("a.json"));
        source.save(profile("work")).unwrap();
        source.save(profile("home")).unwrap();
        assert_eq!(source.export_to(&export).unwrap(), 2);

        let mut target = LayoutStore::open(dir.path().join("b.json"));
        let mut existing = profile("work");
        existing.description = "keep me".to_string();
        target.save(existing).unwrap();

        let mut asked = Vec::new();
        let summary = target
            .import_from(&export, ImportMode::Merge, &dir.path().join("backups"), |name| {
                asked.push(name.to_string());
                false
            })
            .unwrap();

        assert_eq!(asked, vec!["work"]);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.kept_existing, vec!["work"]);
        assert_eq!(target.get("work").unwrap().description, "keep me");
        assert!(target.get("home").is_some());
        assert!(summary.backup.is_none());
    }

    #[test]
    fn test_import_replace_backs_up_existing_file() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        let export = dir.path().join("export.json");

        let mut source = LayoutStore::open(dir.path().join("a.json"));
        source.save(profile("home")).unwrap();
        source.export_to(&export).unwrap();

        let mut target = LayoutStore::open(dir.path().join("b.json"));
        target.save(profile("old")).unwrap();

        let summary = target
            .import_from(&export, ImportMode::Replace, &backups, |_| unreachable!())
            .unwrap();

        assert_eq!(target.names(), vec!["home"]);
        let backup = summary.backup.expect("backup path");
        assert!(backup.starts_with(&backups));
        let saved: Collection = serde_json::from_str(&fs::read_to_string(backup).unwrap()).unwrap();
        assert!(saved.contains_key("old"));
    }

    #[test]
    fn test_import_rejects_invalid_profiles() {
        let dir = tempdir().unwrap();
        let import = dir.path().join("import.json");
        fs::write(
            &import,
            r#"{
                "twin": {"name": "twin", "description": "", "created_at": "2025-01-01T00:00:00",
                         "displays": {"A": {"is_main": true}, "B": {"is_main": true}}},
                "solo": {"name": "renamed", "description": "", "created_at": "2025-01-01T00:00:00",
                         "displays": {"A": {"is_main": true}}}
            }"#,
        )
        .unwrap();

        let mut store = LayoutStore::open(dir.path().join("layouts.json"));
        let summary = store
            .import_from(&import, ImportMode::Merge, dir.path(), |_| true)
            .unwrap();

        assert_eq!(summary.rejected, vec!["twin"]);
        assert_eq!(store.names(), vec!["solo"]);
        assert_eq!(store.get("solo").unwrap().name, "solo");
    }
}
