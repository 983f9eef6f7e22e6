//! Reconciliation of a stored profile against live displays
//!
//! Profile entries whose display is not connected, or is connected but
//! disabled, are skipped without failing the apply. Commands run in profile
//! order and stop at the first failure; commands that already ran are not
//! rolled back, so a failed apply can leave a mix of old and new settings.

use tracing::{info, warn};

use super::command::build_command;
use super::profile::LayoutProfile;
use crate::display::{DisplayMap, DisplayRecord, DisplayTool, ToolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub display_id: String,
    pub command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    pub commands: Vec<PlannedCommand>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl ApplyPlan {
    pub fn command_strings(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.command.as_str()).collect()
    }
}

/// Build the command list for `profile` given what is connected right now
pub fn plan(profile: &LayoutProfile, live: &DisplayMap) -> ApplyPlan {
    let mut plan = ApplyPlan::default();

    for (id, settings) in &profile.display_configs {
        match live.get(id) {
            None => plan.skipped.push((id.clone(), SkipReason::NotConnected)),
            Some(record) if !record.enabled => plan.skipped.push((id.clone(), SkipReason::Disabled)),
            Some(_) => plan.commands.push(PlannedCommand {
                display_id: id.clone(),
                command: build_command(id, settings),
            }),
        }
    }

    let live_main = live.values().find(|r| r.is_main).map(|r| r.id.as_str());
    if let (Some(wanted), Some(current)) = (profile.main_display(), live_main) {
        if wanted != current && live.contains_key(wanted) {
            warn!(
                layout = %profile.name,
                wanted = %wanted,
                current = %current,
                "Layout main display differs from the live one; main follows the display placed at origin (0,0)"
            );
        }
    }

    plan
}

#[derive(Debug)]
pub struct CommandFailure {
    pub command: String,
    pub error: ToolError,
}

/// What happened when a plan was executed
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub executed: Vec<String>,
    pub failure: Option<CommandFailure>,
    pub not_attempted: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// True when some commands ran before the failure
    pub fn is_partial(&self) -> bool {
        self.failure.is_some() && !self.executed.is_empty()
    }
}

/// Run planned commands one at a time, stopping at the first failure
pub fn execute(plan: &ApplyPlan, tool: &impl DisplayTool) -> ApplyReport {
    let mut report = ApplyReport {
        skipped: plan.skipped.clone(),
        ..Default::default()
    };

    let mut commands = plan.commands.iter();
    for planned in commands.by_ref() {
        info!(display = %planned.display_id, command = %planned.command, "Applying display settings");
        match tool.apply(&planned.command) {
            Ok(()) => report.executed.push(planned.command.clone()),
            Err(error) => {
                warn!(display = %planned.display_id, %error, "Display command failed, stopping");
                report.failure = Some(CommandFailure {
                    command: planned.command.clone(),
                    error,
                });
                break;
            }
        }
    }
    report.not_attempted = commands.map(|c| c.command.clone()).collect();
    report
}

/// The arrangement `profile` would produce, as copies of the live records
pub fn preview(profile: &LayoutProfile, live: &DisplayMap) -> Vec<DisplayRecord> {
    profile
        .display_configs
        .iter()
        .filter_map(|(id, settings)| live.get(id).map(|record| settings.overlay(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::parse;
    use crate::display::parser::fixtures::*;
    use crate::display::tool::fake::ScriptedTool;
    use crate::layout::profile::DisplaySettings;
    use crate::types::Position;
    use chrono::NaiveDateTime;

    fn epoch() -> NaiveDateTime {
        NaiveDateTime::default()
    }

    fn three_display_profile() -> LayoutProfile {
        let mut profile = LayoutProfile::new("three", "", epoch());
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            profile.display_configs.insert(
                id.to_string(),
                DisplaySettings {
                    position: Some(Position::new(i as i32 * 1920, 0)),
                    ..Default::default()
                },
            );
        }
        profile
    }

    fn live(ids: &[&str]) -> DisplayMap {
        let raw: String = ids
            .iter()
            .map(|id| format!("Persistent screen id: {id}\n\n"))
            .collect();
        parse(&raw).displays
    }

    #[test]
    fn test_save_then_plan_reproduces_detected_values() {
        let displays = parse(TWO_DISPLAY_REPORT).displays;
        let profile = LayoutProfile::snapshot("home", "", &displays, epoch());

        let plan = plan(&profile, &displays);
        assert!(plan.skipped.is_empty());
        assert_eq!(
            plan.command_strings(),
            vec![
                format!("id:{MACBOOK_ID} res:1680x1050 hz:60 color_depth:8 scaling:on origin:(0,1440) degree:0"),
                format!("id:{DELL_ID} res:2560x1440 hz:60 color_depth:8 scaling:on origin:(0,0) degree:0"),
            ]
        );
    }

    #[test]
    fn test_plan_skips_missing_and_disabled() {
        let mut displays = live(&["A", "C"]);
        displays["C"].enabled = false;

        let plan = plan(&three_display_profile(), &displays);
        assert_eq!(plan.command_strings(), vec!["id:A origin:(0,0)"]);
        assert_eq!(
            plan.skipped,
            vec![
                ("B".to_string(), SkipReason::NotConnected),
                ("C".to_string(), SkipReason::Disabled),
            ]
        );
    }

    #[test]
    fn test_execute_missing_display_is_not_a_failure() {
        let tool = ScriptedTool::default();
        let report = execute(&plan(&three_display_profile(), &live(&["A", "C"])), &tool);

        assert!(report.succeeded());
        assert_eq!(tool.applied(), vec!["id:A origin:(0,0)", "id:C origin:(3840,0)"]);
        assert!(tool.applied().iter().all(|c| !c.starts_with("id:B")));
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let tool = ScriptedTool {
            fail_on: Some(1),
            ..Default::default()
        };
        let report = execute(&plan(&three_display_profile(), &live(&["A", "B", "C"])), &tool);

        assert!(!report.succeeded());
        assert!(report.is_partial());
        assert_eq!(report.executed, vec!["id:A origin:(0,0)"]);
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.command, "id:B origin:(1920,0)");
        assert!(matches!(failure.error, ToolError::Failed { code: Some(1), .. }));
        assert_eq!(report.not_attempted, vec!["id:C origin:(3840,0)"]);
        // third command never reached the tool
        assert_eq!(tool.applied().len(), 2);
    }

    #[test]
    fn test_preview_overlays_live_records() {
        let displays = live(&["A", "B"]);
        let records = preview(&three_display_profile(), &displays);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "B");
        assert_eq!(records[1].position, Position::new(1920, 0));
        assert_eq!(records[1].resolution, displays["B"].resolution);
    }
}
