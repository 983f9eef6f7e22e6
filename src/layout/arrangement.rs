use crate::display::{DisplayKind, DisplayRecord};
use crate::types::Position;

/// Display frame in desktop coordinates, widened so edges can't overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn of(record: &DisplayRecord) -> Self {
        Self {
            x: record.position.x.into(),
            y: record.position.y.into(),
            width: record.resolution.width.into(),
            height: record.resolution.height.into(),
        }
    }

    pub fn left(&self) -> i64 {
        self.x
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn top(&self) -> i64 {
        self.y
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }
}

/// Smallest box containing every display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl Bounds {
    pub fn width(&self) -> u64 {
        self.max_x.abs_diff(self.min_x)
    }

    pub fn height(&self) -> u64 {
        self.max_y.abs_diff(self.min_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrangementKind {
    Single,
    Horizontal,
    Vertical,
    Complex,
}

impl ArrangementKind {
    pub fn label(self) -> &'static str {
        match self {
            ArrangementKind::Single => "single",
            ArrangementKind::Horizontal => "horizontal",
            ArrangementKind::Vertical => "vertical",
            ArrangementKind::Complex => "complex",
        }
    }
}

/// Returns all-zero bounds for an empty set
pub fn bounds(records: &[DisplayRecord]) -> Bounds {
    let mut rects = records.iter().map(Rect::of);
    let Some(first) = rects.next() else {
        return Bounds::default();
    };

    rects.fold(
        Bounds {
            min_x: first.left(),
            min_y: first.top(),
            max_x: first.right(),
            max_y: first.bottom(),
        },
        |b, r| Bounds {
            min_x: b.min_x.min(r.left()),
            min_y: b.min_y.min(r.top()),
            max_x: b.max_x.max(r.right()),
            max_y: b.max_y.max(r.bottom()),
        },
    )
}

/// Same top edge for all → horizontal, same left edge for all → vertical
pub fn arrangement_kind(records: &[DisplayRecord]) -> ArrangementKind {
    let Some(first) = records.first() else {
        return ArrangementKind::Single;
    };
    if records.len() == 1 {
        return ArrangementKind::Single;
    }
    if records.iter().all(|r| r.position.y == first.position.y) {
        ArrangementKind::Horizontal
    } else if records.iter().all(|r| r.position.x == first.position.x) {
        ArrangementKind::Vertical
    } else {
        ArrangementKind::Complex
    }
}

/// Left-to-right row starting at x = 0: external displays first, then
/// larger area first
pub fn suggest_horizontal(records: &[DisplayRecord]) -> Vec<DisplayRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| (r.kind != DisplayKind::External, std::cmp::Reverse(r.resolution.area())));

    let mut next_x = 0i32;
    for record in &mut sorted {
        record.position = Position::new(next_x, 0);
        let width = i32::try_from(record.resolution.width).unwrap_or(i32::MAX);
        next_x = next_x.saturating_add(width);
    }
    sorted
}
