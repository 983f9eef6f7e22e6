//! Scraper for the `displayplacer list` report
//!
//! The report is human-oriented text: one section per display, each opened by
//! a `Persistent screen id:` line, followed by `Key: value` lines and a list of
//! supported modes. Fields are recognized by exact prefix through [`FIELDS`];
//! anything else is ignored so new lines in future tool versions are harmless.
//!
//! A bad value in a recognized field rejects that section only. Sibling
//! sections still produce records.

use thiserror::Error;
use tracing::{debug, warn};

use super::{DisplayKind, DisplayMap, DisplayRecord};
use crate::constants::report;
use crate::types::{Position, Resolution, Rotation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

fn invalid(field: &'static str, value: &str) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

/// A report section that was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("section {section} ({}): {error}", .id.as_deref().unwrap_or("no id"))]
pub struct SectionError {
    /// Zero-based position of the section in the report
    pub section: usize,
    /// Persistent screen id, if the sentinel line was read before the failure
    pub id: Option<String>,
    pub error: ParseError,
}

/// Result of scraping one report
#[derive(Debug, Clone, Default)]
pub struct ParsedReport {
    pub displays: DisplayMap,
    pub errors: Vec<SectionError>,
}

impl ParsedReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-section accumulator the field handlers write into
struct Section {
    id: Option<String>,
    record: DisplayRecord,
    modes: Vec<Resolution>,
}

type FieldHandler = fn(&mut Section, &str) -> Result<(), ParseError>;

/// Recognized line prefixes. New fields are added here.
const FIELDS: &[(&str, FieldHandler)] = &[
    (report::SECTION_SENTINEL, parse_id),
    ("Type:", parse_type),
    ("Resolution:", parse_resolution),
    ("Hertz:", parse_hertz),
    ("Color Depth:", parse_color_depth),
    ("Scaling:", parse_scaling),
    ("Origin:", parse_origin),
    ("Rotation:", parse_rotation),
    ("Enabled:", parse_enabled),
    ("mode ", parse_mode),
];

/// Parse a full report into display records keyed by persistent screen id.
///
/// Never fails: empty or unrecognizable input yields an empty map, and
/// rejected sections are listed in [`ParsedReport::errors`].
pub fn parse(raw: &str) -> ParsedReport {
    let mut parsed = ParsedReport::default();

    for (index, lines) in split_sections(raw).into_iter().enumerate() {
        match parse_section(&lines) {
            Ok(Some(record)) => {
                if parsed.displays.contains_key(&record.id) {
                    warn!(display = %record.id, "Duplicate display id in report, keeping the later section");
                }
                parsed.displays.insert(record.id.clone(), record);
            }
            Ok(None) => {
                debug!(section = index, lines = lines.len(), "Dropping report section without a screen id");
            }
            Err((id, error)) => {
                warn!(section = index, id = ?id, %error, "Rejected display section");
                parsed.errors.push(SectionError {
                    section: index,
                    id,
                    error,
                });
            }
        }
    }

    debug!(
        displays = parsed.displays.len(),
        rejected = parsed.errors.len(),
        "Parsed display report"
    );
    parsed
}

/// Group trimmed, non-blank lines into sections. A new section starts at
/// every sentinel line; lines before the first sentinel form their own
/// section, which is later dropped for lacking an id.
fn split_sections(raw: &str) -> Vec<Vec<&str>> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with(report::SECTION_SENTINEL) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

fn parse_section(lines: &[&str]) -> Result<Option<DisplayRecord>, (Option<String>, ParseError)> {
    let mut section = Section {
        id: None,
        record: DisplayRecord::with_defaults(String::new()),
        modes: Vec::new(),
    };

    for line in lines {
        let Some((prefix, handler)) = FIELDS.iter().find(|(prefix, _)| line.starts_with(prefix)) else {
            continue;
        };
        let value = line[prefix.len()..].trim();
        handler(&mut section, value).map_err(|e| (section.id.clone(), e))?;
    }

    let Some(id) = section.id else {
        return Ok(None);
    };

    let mut record = section.record;
    record.id = id;
    record.available_resolutions = section.modes;
    if !record.available_resolutions.contains(&record.resolution) {
        record.available_resolutions.push(record.resolution);
    }
    Ok(Some(record))
}

fn first_token(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or("")
}

fn parse_id(section: &mut Section, value: &str) -> Result<(), ParseError> {
    if !value.is_empty() {
        section.id = Some(value.to_string());
    }
    Ok(())
}

fn parse_type(section: &mut Section, value: &str) -> Result<(), ParseError> {
    let record = &mut section.record;
    if value.contains("MacBook") {
        record.kind = DisplayKind::BuiltIn;
        record.name = "MacBook Display".to_string();
    } else if value.contains("built in") {
        record.kind = DisplayKind::BuiltIn;
        record.name = "Built-in Display".to_string();
    } else if value.contains("inch external") {
        record.kind = DisplayKind::External;
        record.name = format!("External Display ({} inch)", first_token(value));
    } else {
        record.kind = DisplayKind::External;
        record.name = "External Display".to_string();
    }
    Ok(())
}

fn parse_resolution(section: &mut Section, value: &str) -> Result<(), ParseError> {
    section.record.resolution = Resolution::parse(value).ok_or_else(|| invalid("Resolution", value))?;
    Ok(())
}

fn parse_hertz(section: &mut Section, value: &str) -> Result<(), ParseError> {
    if value == report::UNKNOWN_HERTZ {
        section.record.refresh_hz = report::DEFAULT_REFRESH_HZ;
        return Ok(());
    }
    section.record.refresh_hz = value.parse().map_err(|_| invalid("Hertz", value))?;
    Ok(())
}

fn parse_color_depth(section: &mut Section, value: &str) -> Result<(), ParseError> {
    section.record.color_depth = value.parse().map_err(|_| invalid("Color Depth", value))?;
    Ok(())
}

fn parse_scaling(section: &mut Section, value: &str) -> Result<(), ParseError> {
    section.record.scaling = first_token(value) == "on";
    Ok(())
}

/// `(x,y)` optionally followed by ` - main display`
fn parse_origin(section: &mut Section, value: &str) -> Result<(), ParseError> {
    let (coords, annotation) = value.split_once(" - ").unwrap_or((value, ""));
    section.record.position = Position::parse(coords).ok_or_else(|| invalid("Origin", value))?;
    section.record.is_main = annotation.contains(report::MAIN_DISPLAY_MARKER);
    Ok(())
}

fn parse_rotation(section: &mut Section, value: &str) -> Result<(), ParseError> {
    let degrees = first_token(value);
    section.record.rotation = degrees
        .parse::<u16>()
        .ok()
        .and_then(|d| Rotation::try_from(d).ok())
        .ok_or_else(|| invalid("Rotation", degrees))?;
    Ok(())
}

fn parse_enabled(section: &mut Section, value: &str) -> Result<(), ParseError> {
    section.record.enabled = first_token(value) == "true";
    Ok(())
}

/// `mode 3: res:1920x1080 hz:60 color_depth:8 scaling:on <-- current mode`
///
/// Lines without a well-formed `res:` token are skipped.
fn parse_mode(section: &mut Section, value: &str) -> Result<(), ParseError> {
    let resolution = value
        .split_whitespace()
        .find_map(|token| token.strip_prefix("res:"))
        .and_then(Resolution::parse);

    if let Some(resolution) = resolution {
        if !section.modes.contains(&resolution) {
            section.modes.push(resolution);
        }
    }
    Ok(())
}
