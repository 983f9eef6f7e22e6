//! Detect → save / reconcile → apply
//!
//! [`LayoutManager`] owns the tool and the store. It never prints; every
//! operation returns a result for the front end to render.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::backup;
use crate::display::{self, DisplayRecord, DisplayTool, ParsedReport, ToolError};
use crate::layout::reconcile::{self, ApplyPlan, ApplyReport};
use crate::layout::{LayoutError, LayoutProfile, LayoutStore};

pub struct LayoutManager<T: DisplayTool> {
    tool: T,
    store: LayoutStore,
    backup_dir: PathBuf,
}

impl<T: DisplayTool> LayoutManager<T> {
    pub fn new(tool: T, store: LayoutStore, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            store,
            backup_dir: backup_dir.into(),
        }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn store(&self) -> &LayoutStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LayoutStore {
        &mut self.store
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Query the tool and parse its report. Nothing is cached between calls.
    /// A tool failure is an error, never a partial result.
    pub fn detect(&self) -> Result<ParsedReport, ToolError> {
        let raw = self
            .tool
            .list()
            .inspect_err(|err| error!(error = %err, "Display detection failed"))?;
        let parsed = display::parse(&raw);
        for rejected in &parsed.errors {
            warn!(error = %rejected, "Ignoring unparseable display section");
        }
        info!(displays = parsed.displays.len(), "Detected displays");
        Ok(parsed)
    }

    /// Snapshot the enabled displays under `name`, replacing any layout with
    /// that name. Nothing is written when no enabled display is detected.
    pub fn save_layout(&mut self, name: &str, description: &str) -> Result<&LayoutProfile> {
        let detected = self.detect().context("Failed to detect displays")?;
        if !detected.displays.values().any(|r| r.enabled) {
            return Err(LayoutError::NoDisplays.into());
        }

        let profile = LayoutProfile::snapshot(name, description, &detected.displays, Local::now().naive_local());
        info!(layout = %name, displays = profile.display_configs.len(), "Saving layout");
        self.store.save(profile)?;
        self.store.get(name).context("Saved layout missing from store")
    }

    /// Commands `name` would run against the displays connected right now
    pub fn plan_layout(&self, name: &str) -> Result<ApplyPlan> {
        let profile = self.store.require(name)?;
        let detected = self.detect().context("Failed to detect displays")?;
        Ok(reconcile::plan(profile, &detected.displays))
    }

    /// Apply a stored layout to the connected displays.
    ///
    /// Returns Ok with a report once commands were attempted; check
    /// [`ApplyReport::succeeded`]. A failed report may still have changed some
    /// displays (see [`ApplyReport::executed`]), since nothing is rolled back.
    pub fn apply_layout(&mut self, name: &str) -> Result<ApplyReport> {
        let plan = self.plan_layout(name)?;
        for (id, reason) in &plan.skipped {
            info!(layout = %name, display = %id, ?reason, "Skipping display");
        }

        let report = reconcile::execute(&plan, &self.tool);
        if report.succeeded() {
            info!(layout = %name, commands = report.executed.len(), "Layout applied");
            if let Err(err) = self.store.mark_used(name, Local::now().naive_local()) {
                warn!(layout = %name, error = ?err, "Layout applied but last-used time was not saved");
            }
        } else {
            error!(
                layout = %name,
                executed = report.executed.len(),
                not_attempted = report.not_attempted.len(),
                "Layout only partially applied"
            );
        }
        Ok(report)
    }

    pub fn delete_layout(&mut self, name: &str) -> Result<bool> {
        self.store.delete(name)
    }

    /// Live records with the layout's settings overlaid
    pub fn preview_layout(&self, name: &str) -> Result<Vec<DisplayRecord>> {
        let profile = self.store.require(name)?;
        let detected = self.detect().context("Failed to detect displays")?;
        Ok(reconcile::preview(profile, &detected.displays))
    }

    pub fn backup(&self) -> Result<PathBuf> {
        backup::create_backup(&self.tool, &self.backup_dir)
    }
}
