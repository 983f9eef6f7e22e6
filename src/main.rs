#![forbid(unsafe_code)]

mod backup;
mod config;
mod constants;
mod display;
mod layout;
mod manager;
mod types;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level as TraceLevel, debug, warn};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use constants::{paths, tool, validation};
use display::{DisplayRecord, DisplayTool, ToolError};
use layout::arrangement::{self, Bounds};
use layout::command::build_command;
use layout::reconcile::SkipReason;
use layout::{DisplaySettings, ImportMode, LayoutStore};
use manager::LayoutManager;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Parser)]
#[command(name = "monitor-layout", version, about = "Save and restore monitor arrangements with displayplacer")]
struct Cli {
    /// Log at debug level (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    debug: bool,

    /// Path to the displayplacer binary
    #[arg(long, global = true, value_name = "PATH")]
    tool: Option<PathBuf>,

    /// Layouts file to use instead of the configured one
    #[arg(long, global = true, value_name = "FILE")]
    layouts_file: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(validation::MIN_TIMEOUT_SECS..=validation::MAX_TIMEOUT_SECS)
    )]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the connected displays
    Detect {
        /// Include available modes and arrangement bounds
        #[arg(short, long)]
        detailed: bool,
        /// Print the parsed records as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Save the current arrangement as a named layout
    Save {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Apply a saved layout
    #[command(alias = "load")]
    Apply {
        name: String,
        /// Print the commands without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved layouts
    List,
    /// Show a saved layout and how it maps onto the connected displays
    Show { name: String },
    /// Delete a saved layout
    Delete {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Write all layouts to a file
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read layouts from an exported file
    Import {
        file: PathBuf,
        /// Keep existing layouts and ask before overwriting
        #[arg(short, long)]
        merge: bool,
        /// Overwrite conflicting layouts without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Save the raw display report to the backup directory
    Backup,
    /// Inspect a backup file
    Restore { file: PathBuf },
    /// Print commands for a left-to-right arrangement of the connected displays
    Suggest,
    /// Check the tool, the layouts file and detection
    Doctor,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        TraceLevel::DEBUG
    } else {
        match std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "warn".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => TraceLevel::TRACE,
            "debug" => TraceLevel::DEBUG,
            "info" => TraceLevel::INFO,
            "error" => TraceLevel::ERROR,
            _ => TraceLevel::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {err}");
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("✗ {err:#}");
            if err
                .chain()
                .any(|cause| matches!(cause.downcast_ref::<ToolError>(), Some(ToolError::NotFound(_))))
            {
                eprintln!("  Install displayplacer with: {}", tool::INSTALL_HINT);
            }
            ExitCode::FAILURE
        }
    }
}

/// Ok(false) means the command ran but did not fully succeed
fn run(cli: Cli) -> Result<bool> {
    let mut settings = Settings::load();
    if let Some(path) = cli.tool {
        settings.displayplacer_path = path;
    }
    if let Some(path) = cli.layouts_file {
        settings.layouts_file = Some(path);
    }
    if let Some(dir) = cli.backup_dir {
        settings.backup_dir = Some(dir);
    }
    if let Some(secs) = cli.timeout {
        settings.command_timeout_secs = secs;
    }
    debug!(?settings, "Resolved settings");

    let store = LayoutStore::open(settings.layouts_file());
    if let Some(problem) = store.load_error() {
        eprintln!("⚠ {problem}");
        eprintln!("  Starting with an empty layout collection.");
    }
    let mut mgr = LayoutManager::new(settings.tool(), store, settings.backup_dir());

    match cli.command {
        Command::Detect { detailed, json } => detect(&mgr, detailed, json),
        Command::Save { name, description } => {
            let profile = mgr.save_layout(&name, &description)?;
            println!("✓ Saved layout '{}' ({} displays)", profile.name, profile.display_configs.len());
            Ok(true)
        }
        Command::Apply { name, dry_run } => apply(&mut mgr, &name, dry_run),
        Command::List => {
            list(&mgr);
            Ok(true)
        }
        Command::Show { name } => show(&mgr, &name),
        Command::Delete { name, yes } => {
            mgr.store().require(&name)?;
            if !yes && !confirm(&format!("Delete layout '{name}'?"))? {
                println!("Cancelled");
                return Ok(true);
            }
            mgr.delete_layout(&name)?;
            println!("✓ Deleted layout '{name}'");
            Ok(true)
        }
        Command::Export { output } => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "monitor_layouts_export_{}.json",
                    Local::now().format(paths::FILE_TIMESTAMP_FORMAT)
                ))
            });
            let count = mgr.store().export_to(&path)?;
            println!("✓ Exported {count} layouts to {}", path.display());
            Ok(true)
        }
        Command::Import { file, merge, yes } => import(&mut mgr, &file, merge, yes),
        Command::Backup => {
            let path = mgr.backup()?;
            println!("✓ Backup written to {}", path.display());
            Ok(true)
        }
        Command::Restore { file } => {
            let backup = backup::read_backup(&file)?;
            println!("Backup from {}:", backup.timestamp.format(TIME_FORMAT));
            println!("{}", backup.displayplacer_output.trim_end());
            backup::restore_backup(&file)?;
            Ok(true)
        }
        Command::Suggest => suggest(&mgr),
        Command::Doctor => Ok(doctor(&mgr, &settings)),
    }
}

fn detect<T: DisplayTool>(mgr: &LayoutManager<T>, detailed: bool, json: bool) -> Result<bool> {
    let report = mgr.detect()?;
    if !report.is_clean() {
        eprintln!("⚠ {} display sections could not be parsed:", report.errors.len());
        for rejected in &report.errors {
            eprintln!("  {rejected}");
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.displays)?);
        return Ok(true);
    }

    if report.displays.is_empty() {
        println!("No displays detected");
        return Ok(false);
    }

    println!("Detected {} displays:", report.displays.len());
    for record in report.displays.values() {
        print_record(record, detailed);
    }

    if detailed {
        let records: Vec<DisplayRecord> = report.displays.values().filter(|r| r.enabled).cloned().collect();
        println!();
        println!("Arrangement: {}", arrangement::arrangement_kind(&records).label());
        print_bounds(&arrangement::bounds(&records));
    }
    Ok(true)
}

fn print_record(record: &DisplayRecord, detailed: bool) {
    let main = if record.is_main { " [main]" } else { "" };
    let disabled = if record.enabled { "" } else { " (disabled)" };
    println!("  {}{main}{disabled}", record.name);
    println!("    id:         {}", record.id);
    println!("    type:       {}", record.kind.label());
    println!("    resolution: {} @ {}Hz", record.resolution, record.refresh_hz);
    println!("    origin:     {}", record.position);
    println!(
        "    rotation:   {}°  scaling: {}",
        record.rotation.degrees(),
        if record.scaling { "on" } else { "off" }
    );
    if detailed {
        println!("    color depth: {}", record.color_depth);
        let modes: Vec<String> = record.available_resolutions.iter().map(ToString::to_string).collect();
        println!("    modes:      {}", modes.join(", "));
    }
}

fn print_bounds(bounds: &Bounds) {
    println!(
        "Bounds: ({},{}) to ({},{}), {}x{}",
        bounds.min_x,
        bounds.min_y,
        bounds.max_x,
        bounds.max_y,
        bounds.width(),
        bounds.height()
    );
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NotConnected => "not connected",
        SkipReason::Disabled => "disabled",
    }
}

fn apply<T: DisplayTool>(mgr: &mut LayoutManager<T>, name: &str, dry_run: bool) -> Result<bool> {
    if dry_run {
        let plan = mgr.plan_layout(name)?;
        println!("Layout '{name}' would run {} commands:", plan.commands.len());
        for command in plan.command_strings() {
            println!("  displayplacer \"{command}\"");
        }
        for (id, reason) in &plan.skipped {
            println!("  skip {id} ({})", skip_label(*reason));
        }
        let preview = mgr.preview_layout(name)?;
        println!("Resulting arrangement: {}", arrangement::arrangement_kind(&preview).label());
        print_bounds(&arrangement::bounds(&preview));
        return Ok(true);
    }

    let report = mgr.apply_layout(name)?;
    for (id, reason) in &report.skipped {
        println!("  - skipped {id} ({})", skip_label(*reason));
    }
    for command in &report.executed {
        println!("  ✓ {command}");
    }

    match &report.failure {
        None if report.executed.is_empty() => {
            println!("⚠ Layout '{name}' matched no connected displays, nothing was changed");
            Ok(true)
        }
        None => {
            println!("✓ Applied layout '{name}'");
            Ok(true)
        }
        Some(failure) => {
            eprintln!("  ✗ {}", failure.command);
            eprintln!("    {}", failure.error);
            for command in &report.not_attempted {
                eprintln!("  · not attempted: {command}");
            }
            if report.is_partial() {
                eprintln!("⚠ Layout '{name}' was only partially applied; earlier changes were not rolled back");
            } else {
                eprintln!("✗ Layout '{name}' was not applied");
            }
            Ok(false)
        }
    }
}

fn format_time(at: Option<NaiveDateTime>) -> String {
    at.map_or_else(|| "never".to_string(), |t| t.format(TIME_FORMAT).to_string())
}

fn list<T: DisplayTool>(mgr: &LayoutManager<T>) {
    let store = mgr.store();
    if store.is_empty() {
        println!("No saved layouts");
        return;
    }

    println!("{} saved layouts:", store.len());
    for profile in store.profiles() {
        println!("  {}", profile.name);
        if !profile.description.is_empty() {
            println!("    {}", profile.description);
        }
        println!(
            "    displays: {}  created: {}  last used: {}",
            profile.display_configs.len(),
            profile.created_at.format(TIME_FORMAT),
            format_time(profile.last_used_at)
        );
    }
}

fn show<T: DisplayTool>(mgr: &LayoutManager<T>, name: &str) -> Result<bool> {
    let profile = mgr.store().require(name)?;
    println!("Layout '{}'", profile.name);
    if !profile.description.is_empty() {
        println!("  {}", profile.description);
    }
    println!("  created:   {}", profile.created_at.format(TIME_FORMAT));
    println!("  last used: {}", format_time(profile.last_used_at));
    for (id, settings) in &profile.display_configs {
        let main = if settings.is_main == Some(true) { " [main]" } else { "" };
        println!("  {}{main}", build_command(id, settings));
    }

    match mgr.preview_layout(name) {
        Ok(preview) => {
            println!();
            println!("With the connected displays:");
            for record in &preview {
                println!("  {} [{}] {} at {}", record.name, record.short_id(), record.resolution, record.position);
            }
            println!("Arrangement: {}", arrangement::arrangement_kind(&preview).label());
            print_bounds(&arrangement::bounds(&preview));
        }
        Err(err) => {
            warn!(error = ?err, "Preview unavailable");
            println!();
            println!("(no preview: {err:#})");
        }
    }
    Ok(true)
}

fn import<T: DisplayTool>(mgr: &mut LayoutManager<T>, file: &Path, merge: bool, yes: bool) -> Result<bool> {
    let mode = if merge { ImportMode::Merge } else { ImportMode::Replace };
    if mode == ImportMode::Replace
        && !yes
        && !mgr.store().is_empty()
        && !confirm(&format!("Replace all {} saved layouts?", mgr.store().len()))?
    {
        println!("Cancelled");
        return Ok(true);
    }

    let backup_dir = mgr.backup_dir().to_path_buf();
    let mut prompt_error = None;
    let summary = mgr.store_mut().import_from(file, mode, &backup_dir, |name| {
        if yes {
            return true;
        }
        confirm(&format!("Layout '{name}' already exists. Overwrite?")).unwrap_or_else(|err| {
            prompt_error.get_or_insert(err);
            false
        })
    })?;
    if let Some(err) = prompt_error {
        warn!(error = ?err, "Could not read answer, kept existing layouts");
    }

    if let Some(path) = &summary.backup {
        println!("  previous layouts backed up to {}", path.display());
    }
    for name in &summary.kept_existing {
        println!("  - kept existing '{name}'");
    }
    for name in &summary.rejected {
        println!("  ✗ rejected invalid layout '{name}'");
    }
    println!("✓ Imported {} layouts", summary.imported);
    Ok(summary.rejected.is_empty())
}

fn suggest<T: DisplayTool>(mgr: &LayoutManager<T>) -> Result<bool> {
    let report = mgr.detect()?;
    let records: Vec<DisplayRecord> = report.displays.values().filter(|r| r.enabled).cloned().collect();
    if records.is_empty() {
        println!("No displays detected");
        return Ok(false);
    }

    let suggested = arrangement::suggest_horizontal(&records);
    println!("Left to right:");
    for record in &suggested {
        let settings = DisplaySettings {
            position: Some(record.position),
            ..Default::default()
        };
        println!("  {} ({})", record.name, record.resolution);
        println!("    displayplacer \"{}\"", build_command(&record.id, &settings));
    }
    print_bounds(&arrangement::bounds(&suggested));
    Ok(true)
}

fn doctor<T: DisplayTool>(mgr: &LayoutManager<T>, settings: &Settings) -> bool {
    let mut issues = 0;

    let tool_path = settings.displayplacer_path.display();
    match mgr.tool().version() {
        Ok(version) => println!("✓ displayplacer at {tool_path}: {}", version.trim()),
        Err(err) => {
            issues += 1;
            println!("✗ displayplacer at {tool_path}: {err}");
            println!("  Install with: {}", tool::INSTALL_HINT);
        }
    }

    let store_path = mgr.store().path();
    match check_writable(store_path) {
        Ok(()) if mgr.store().is_empty() => println!("✓ layouts file {} (no layouts)", store_path.display()),
        Ok(()) => println!(
            "✓ layouts file {} ({} layouts: {})",
            store_path.display(),
            mgr.store().len(),
            mgr.store().names().join(", ")
        ),
        Err(err) => {
            issues += 1;
            println!("✗ layouts file {}: {err:#}", store_path.display());
        }
    }
    if let Some(problem) = mgr.store().load_error() {
        issues += 1;
        println!("✗ {problem}");
    }

    match mgr.detect() {
        Ok(report) if report.displays.is_empty() => {
            issues += 1;
            println!("✗ no displays detected");
        }
        Ok(report) => {
            println!("✓ detected {} displays", report.displays.len());
            for rejected in &report.errors {
                issues += 1;
                println!("  ✗ {rejected}");
            }
        }
        Err(err) => {
            issues += 1;
            println!("✗ detection failed: {err}");
        }
    }

    if issues == 0 {
        println!("No issues found");
    } else {
        println!("{issues} issue(s) found");
    }
    issues == 0
}

/// Existing file: opened for append without modifying it.
/// Missing file: the parent directory must exist.
fn check_writable(path: &Path) -> Result<()> {
    if path.exists() {
        OpenOptions::new()
            .append(true)
            .open(path)
            .context("not writable")?;
        return Ok(());
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let meta = fs::metadata(parent).with_context(|| format!("directory {} is not accessible", parent.display()))?;
    if meta.permissions().readonly() {
        bail!("directory {} is read-only", parent.display());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::tool::fake::ScriptedTool;
    use crate::layout::LayoutProfile;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_is_alias_for_apply() {
        let cli = Cli::try_parse_from(["monitor-layout", "load", "home", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Apply { ref name, dry_run: true } if name == "home"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["monitor-layout", "list", "--layouts-file", "/tmp/x.json", "--timeout", "3"]).unwrap();
        assert_eq!(cli.layouts_file, Some(PathBuf::from("/tmp/x.json")));
        assert_eq!(cli.timeout, Some(3));
    }

    #[test]
    fn test_timeout_flag_is_bounded() {
        for bad in ["0", "121"] {
            assert!(Cli::try_parse_from(["monitor-layout", "list", "--timeout", bad]).is_err());
        }
        let cli = Cli::try_parse_from(["monitor-layout", "list", "--timeout", "120"]).unwrap();
        assert_eq!(cli.timeout, Some(validation::MAX_TIMEOUT_SECS));
    }

    #[test]
    fn test_apply_with_no_connected_displays_succeeds() {
        let dir = tempdir().unwrap();
        let mut store = LayoutStore::open(dir.path().join("layouts.json"));
        let mut profile = LayoutProfile::new("travel", "", NaiveDateTime::default());
        profile.display_configs.insert("GONE".to_string(), DisplaySettings::default());
        store.save(profile).unwrap();

        let tool = ScriptedTool::with_report("Persistent screen id: LIVE\n");
        let mut mgr = LayoutManager::new(tool, store, dir.path().join("backups"));

        assert!(apply(&mut mgr, "travel", false).unwrap());
        assert!(mgr.tool().applied().is_empty());
        assert!(mgr.store().get("travel").unwrap().last_used_at.is_some());
    }

    #[test]
    fn test_save_requires_name() {
        assert!(Cli::try_parse_from(["monitor-layout", "save"]).is_err());
    }

    #[test]
    fn test_check_writable() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("layouts.json");
        fs::write(&existing, "{}").unwrap();
        assert!(check_writable(&existing).is_ok());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "{}");

        assert!(check_writable(&dir.path().join("new.json")).is_ok());
        assert!(check_writable(&dir.path().join("missing").join("new.json")).is_err());
    }
}
