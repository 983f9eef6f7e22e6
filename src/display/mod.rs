//! Live display state
//!
//! - **parser**: turns the tool's text report into [`DisplayRecord`]s
//! - **tool**: runs the external display tool

pub mod parser;
pub mod tool;

pub use parser::{ParsedReport, parse};
pub use tool::{DisplayTool, Displayplacer, ToolError};

use indexmap::IndexMap;
use serde::Serialize;

use crate::constants::report;
use crate::types::{Position, Resolution, Rotation};

/// Detected displays keyed by persistent screen id, in report order
pub type DisplayMap = IndexMap<String, DisplayRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    BuiltIn,
    External,
}

impl DisplayKind {
    pub fn label(self) -> &'static str {
        match self {
            DisplayKind::BuiltIn => "Built-in",
            DisplayKind::External => "External",
        }
    }
}

/// One output surface as reported by a single detection pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub id: String,
    /// Heuristic label derived from the `Type:` line
    pub name: String,
    pub kind: DisplayKind,
    pub resolution: Resolution,
    pub available_resolutions: Vec<Resolution>,
    pub position: Position,
    pub rotation: Rotation,
    pub scaling: bool,
    pub refresh_hz: u32,
    pub color_depth: u8,
    pub enabled: bool,
    pub is_main: bool,
}

impl DisplayRecord {
    /// Record with every field at its report default
    pub fn with_defaults(id: impl Into<String>) -> Self {
        let resolution = Resolution::new(report::DEFAULT_WIDTH, report::DEFAULT_HEIGHT);
        Self {
            id: id.into(),
            name: "External Display".to_string(),
            kind: DisplayKind::External,
            resolution,
            available_resolutions: vec![resolution],
            position: Position::default(),
            rotation: Rotation::Deg0,
            scaling: false,
            refresh_hz: report::DEFAULT_REFRESH_HZ,
            color_depth: report::DEFAULT_COLOR_DEPTH,
            enabled: true,
            is_main: false,
        }
    }

    /// First 8 characters of the id, for compact listings
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}
