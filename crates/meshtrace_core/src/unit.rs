//! Unit addressing, arrival links, and grid mapping.

use serde::{Deserialize, Serialize};

/// One processing element in the simulated grid, addressed by (x, y).
///
/// Trace coordinates have y increasing upward; see [`Unit::to_grid`] for the
/// display-space mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Unit {
    /// Column in trace space.
    pub x: u16,
    /// Row in trace space, increasing upward.
    pub y: u16,
}

impl Unit {
    /// Create a unit address.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Map to display coordinates: row = dim_y - 1 - y, col = x.
    #[must_use]
    pub const fn to_grid(&self, dim_y: u16) -> GridPos {
        GridPos {
            row: dim_y as i32 - 1 - self.y as i32,
            col: self.x as i32,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}.{}", self.x, self.y)
    }
}

/// Display-space position: row 0 at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPos {
    /// Display row.
    pub row: i32,
    /// Display column.
    pub col: i32,
}

/// Arrival link of a landing packet.
///
/// The letter denotes the link the packet arrived on, not the compass bearing
/// to its source. `Local` (trace letter `R`) means locally originated, no
/// source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    /// Arrived on the west link; implied source at (x - 1, y).
    West,
    /// Arrived on the east link; implied source at (x + 1, y).
    East,
    /// Arrived on the north link; implied source at (x, y - 1).
    North,
    /// Arrived on the south link; implied source at (x, y + 1).
    South,
    /// Locally originated.
    Local,
}

impl Link {
    /// Parse the single-letter trace form.
    #[must_use]
    pub const fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'W' => Some(Self::West),
            b'E' => Some(Self::East),
            b'N' => Some(Self::North),
            b'S' => Some(Self::South),
            b'R' => Some(Self::Local),
            _ => None,
        }
    }

    /// The trace letter for this link.
    #[must_use]
    pub const fn letter(&self) -> char {
        match self {
            Self::West => 'W',
            Self::East => 'E',
            Self::North => 'N',
            Self::South => 'S',
            Self::Local => 'R',
        }
    }

    /// Implied source coordinates for a packet landing at `unit`.
    ///
    /// This is a property of the trace format and is preserved exactly; the
    /// result may be off-grid at the edges, callers clamp or drop. `None` for
    /// locally originated packets.
    #[must_use]
    pub const fn source_of(&self, unit: Unit) -> Option<(i32, i32)> {
        let (x, y) = (unit.x as i32, unit.y as i32);
        match self {
            Self::West => Some((x - 1, y)),
            Self::East => Some((x + 1, y)),
            Self::North => Some((x, y - 1)),
            Self::South => Some((x, y + 1)),
            Self::Local => None,
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_letters() {
        for letter in [b'W', b'E', b'N', b'S', b'R'] {
            let link = Link::from_letter(letter).unwrap();
            assert_eq!(link.letter() as u8, letter);
        }
        assert!(Link::from_letter(b'X').is_none());
    }

    #[test]
    fn test_source_mapping() {
        let unit = Unit::new(1, 0);
        assert_eq!(Link::West.source_of(unit), Some((0, 0)));
        assert_eq!(Link::East.source_of(unit), Some((2, 0)));
        assert_eq!(Link::North.source_of(unit), Some((1, -1)));
        assert_eq!(Link::South.source_of(unit), Some((1, 1)));
        assert_eq!(Link::Local.source_of(unit), None);
    }

    #[test]
    fn test_source_off_grid() {
        // Edge units may imply off-grid sources; the mapping is never clamped
        // here.
        assert_eq!(Link::West.source_of(Unit::new(0, 0)), Some((-1, 0)));
    }

    #[test]
    fn test_grid_mapping() {
        // y grows upward in the trace, rows grow downward on screen.
        assert_eq!(Unit::new(1, 0).to_grid(2), GridPos { row: 1, col: 1 });
        assert_eq!(Unit::new(0, 0).to_grid(2), GridPos { row: 1, col: 0 });
        assert_eq!(Unit::new(0, 1).to_grid(2), GridPos { row: 0, col: 0 });
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(Unit::new(3, 9).to_string(), "P3.9");
    }

    use proptest::prelude::*;

    proptest::proptest! {
        #[test]
        fn prop_grid_mapping_in_bounds(x in 0u16..64, y in 0u16..64, slack in 0u16..8) {
            let dim_y = y + 1 + slack;
            let pos = Unit::new(x, y).to_grid(dim_y);
            prop_assert!(pos.row >= 0);
            prop_assert!(pos.row < i32::from(dim_y));
            prop_assert_eq!(pos.col, i32::from(x));
        }

        #[test]
        fn prop_link_letter_roundtrip(letter in proptest::sample::select(vec![b'W', b'E', b'N', b'S', b'R'])) {
            let link = Link::from_letter(letter).unwrap();
            prop_assert_eq!(link.letter() as u8, letter);
        }
    }
}
