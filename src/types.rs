//! Geometry value types shared by the parser, profiles and command builder
//!
//! Resolution and position serialize as 2-element arrays (`[w, h]`, `[x, y]`)
//! to stay compatible with existing layout files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel dimensions of a display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Parse `WxH` (e.g. `1920x1080`)
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once('x')?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl From<Resolution> for (u32, u32) {
    fn from(r: Resolution) -> Self {
        (r.width, r.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Origin of a display in global desktop coordinates (may be negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Parse `(x,y)`, tolerating whitespace inside the parentheses
    pub fn parse(s: &str) -> Option<Self> {
        let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?;
        let (x, y) = inner.split_once(',')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<Position> for (i32, i32) {
    fn from(p: Position) -> Self {
        (p.x, p.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Display rotation, serialized as plain degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("unsupported rotation {other} (expected 0, 90, 180 or 270)")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        assert_eq!(Resolution::parse("2560x1440"), Some(Resolution::new(2560, 1440)));
        assert_eq!(Resolution::parse(" 1280x800 "), Some(Resolution::new(1280, 800)));
        assert_eq!(Resolution::parse("1280"), None);
        assert_eq!(Resolution::parse("axb"), None);
    }

    #[test]
    fn test_position_parse_negative() {
        assert_eq!(Position::parse("(-1280,200)"), Some(Position::new(-1280, 200)));
        assert_eq!(Position::parse("( 0 , 1440 )"), Some(Position::new(0, 1440)));
        assert_eq!(Position::parse("0,0"), None);
        assert_eq!(Position::parse("(x,0)"), None);
    }

    #[test]
    fn test_geometry_serializes_as_arrays() {
        let json = serde_json::to_string(&Resolution::new(1920, 1080)).unwrap();
        assert_eq!(json, "[1920,1080]");
        let json = serde_json::to_string(&Position::new(-1280, 200)).unwrap();
        assert_eq!(json, "[-1280,200]");

        let pos: Position = serde_json::from_str("[5, -7]").unwrap();
        assert_eq!(pos, Position::new(5, -7));
    }

    #[test]
    fn test_rotation_rejects_odd_degrees() {
        assert_eq!(Rotation::try_from(270u16), Ok(Rotation::Deg270));
        assert!(Rotation::try_from(45u16).is_err());
        assert!(serde_json::from_str::<Rotation>("45").is_err());
        assert_eq!(serde_json::to_string(&Rotation::Deg90).unwrap(), "90");
    }
}
