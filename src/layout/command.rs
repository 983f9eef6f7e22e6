//! displayplacer command strings
//!
//! Token order is fixed: `id res hz color_depth scaling origin degree`. Only
//! fields present in the settings produce a token, so the tool keeps the
//! display's current value for everything else. `is_main` never produces a
//! token; the tool makes whichever display sits at origin (0,0) the main one.

use super::profile::DisplaySettings;

pub fn build_command(display_id: &str, settings: &DisplaySettings) -> String {
    let mut tokens = vec![format!("id:{display_id}")];

    if let Some(res) = settings.resolution {
        tokens.push(format!("res:{}x{}", res.width, res.height));
    }
    if let Some(hz) = settings.refresh_hz {
        tokens.push(format!("hz:{hz}"));
    }
    if let Some(depth) = settings.color_depth {
        tokens.push(format!("color_depth:{depth}"));
    }
    if let Some(scaling) = settings.scaling {
        tokens.push(format!("scaling:{}", if scaling { "on" } else { "off" }));
    }
    if let Some(origin) = settings.position {
        tokens.push(format!("origin:({},{})", origin.x, origin.y));
    }
    if let Some(rotation) = settings.rotation {
        tokens.push(format!("degree:{}", rotation.degrees()));
    }

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Resolution, Rotation};

    #[test]
    fn test_full_settings_token_order() {
        let settings = DisplaySettings {
            resolution: Some(Resolution::new(2560, 1440)),
            position: Some(Position::new(-1280, 200)),
            rotation: Some(Rotation::Deg90),
            scaling: Some(true),
            refresh_hz: Some(60),
            color_depth: Some(8),
            is_main: Some(true),
        };
        assert_eq!(
            build_command("AAAA", &settings),
            "id:AAAA res:2560x1440 hz:60 color_depth:8 scaling:on origin:(-1280,200) degree:90"
        );
    }

    #[test]
    fn test_empty_settings_only_id() {
        assert_eq!(build_command("AAAA", &DisplaySettings::default()), "id:AAAA");
    }

    #[test]
    fn test_partial_settings_omit_absent_tokens() {
        let settings = DisplaySettings {
            scaling: Some(false),
            rotation: Some(Rotation::Deg0),
            ..Default::default()
        };
        assert_eq!(build_command("BBBB", &settings), "id:BBBB scaling:off degree:0");
    }
}
