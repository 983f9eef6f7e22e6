//! Layout profiles
//!
//! A profile maps persistent screen ids to partial settings. Every setting is
//! optional: an absent field means "leave the display as it is", which is a
//! different thing from a field set to the display's current value.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::LayoutError;
use crate::display::{DisplayMap, DisplayRecord};
use crate::types::{Position, Resolution, Rotation};

/// Desired state for one display; `None` fields are left untouched on apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<bool>,
    #[serde(rename = "hz", default, skip_serializing_if = "Option::is_none")]
    pub refresh_hz: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_depth: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_main: Option<bool>,
}

impl DisplaySettings {
    /// Every field set from a detected record
    pub fn from_record(record: &DisplayRecord) -> Self {
        Self {
            resolution: Some(record.resolution),
            position: Some(record.position),
            rotation: Some(record.rotation),
            scaling: Some(record.scaling),
            refresh_hz: Some(record.refresh_hz),
            color_depth: Some(record.color_depth),
            is_main: Some(record.is_main),
        }
    }

    /// Copy of `record` with every present field applied on top
    pub fn overlay(&self, record: &DisplayRecord) -> DisplayRecord {
        let mut out = record.clone();
        if let Some(resolution) = self.resolution {
            out.resolution = resolution;
        }
        if let Some(position) = self.position {
            out.position = position;
        }
        if let Some(rotation) = self.rotation {
            out.rotation = rotation;
        }
        if let Some(scaling) = self.scaling {
            out.scaling = scaling;
        }
        if let Some(hz) = self.refresh_hz {
            out.refresh_hz = hz;
        }
        if let Some(depth) = self.color_depth {
            out.color_depth = depth;
        }
        if let Some(is_main) = self.is_main {
            out.is_main = is_main;
        }
        out
    }
}

/// Named, persisted display arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Persistent screen id → settings, applied in this order
    #[serde(rename = "displays", default)]
    pub display_configs: IndexMap<String, DisplaySettings>,
    pub created_at: NaiveDateTime,
    /// Older layout files store "never used" as an empty string
    #[serde(
        rename = "last_used",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub last_used_at: Option<NaiveDateTime>,
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl LayoutProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>, created_at: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            display_configs: IndexMap::new(),
            created_at,
            last_used_at: None,
        }
    }

    /// Snapshot the enabled displays of one detection pass.
    ///
    /// When the report flags several displays as main, the first one in
    /// report order keeps the flag.
    pub fn snapshot(
        name: impl Into<String>,
        description: impl Into<String>,
        displays: &DisplayMap,
        created_at: NaiveDateTime,
    ) -> Self {
        let mut profile = Self::new(name, description, created_at);
        let mut main_seen = false;

        for (id, record) in displays.iter().filter(|(_, r)| r.enabled) {
            let mut settings = DisplaySettings::from_record(record);
            if record.is_main {
                if main_seen {
                    warn!(layout = %profile.name, display = %id, "Several main displays detected, clearing extra main flag");
                    settings.is_main = Some(false);
                }
                main_seen = true;
            }
            profile.display_configs.insert(id.clone(), settings);
        }
        profile
    }

    /// Id of the display this profile marks as main
    pub fn main_display(&self) -> Option<&str> {
        self.display_configs
            .iter()
            .find(|(_, s)| s.is_main == Some(true))
            .map(|(id, _)| id.as_str())
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.name.trim().is_empty() {
            return Err(LayoutError::EmptyName);
        }
        let count = self
            .display_configs
            .values()
            .filter(|s| s.is_main == Some(true))
            .count();
        if count > 1 {
            return Err(LayoutError::MultipleMain {
                name: self.name.clone(),
                count,
            });
        }
        Ok(())
    }
}
