//! Logical time of the simulated hardware.
//!
//! A cycle is the ordering unit of the trace. Playback positions use `i64`
//! because the playhead ranges over `[min_cycle - 1, max_cycle]`.

use serde::{Deserialize, Serialize};

/// One discrete time step of the simulated grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cycle(u32);

impl Cycle {
    /// Cycle zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Create from raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get raw value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Widen to a playhead position.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// The following cycle.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u32> for Cycle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_ordering() {
        assert!(Cycle::from_raw(3) < Cycle::from_raw(7));
        assert_eq!(Cycle::zero().as_u32(), 0);
    }

    #[test]
    fn test_cycle_next() {
        assert_eq!(Cycle::from_raw(4).next(), Cycle::from_raw(5));
        assert_eq!(Cycle::from_raw(u32::MAX).next(), Cycle::from_raw(u32::MAX));
    }

    #[test]
    fn test_cycle_display() {
        assert_eq!(Cycle::from_raw(42).to_string(), "@42");
    }
}
