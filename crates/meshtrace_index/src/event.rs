//! Parsed trace events.

use meshtrace_core::{Cycle, Link, Unit};
use serde::{Deserialize, Serialize};

/// A packet arriving at a unit during a cycle via a specific link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingEvent {
    /// Cycle the packet landed.
    pub cycle: Cycle,
    /// Destination unit.
    pub unit: Unit,
    /// Packet color channel.
    pub color: u32,
    /// Link the packet arrived on.
    pub link: Link,
}

impl LandingEvent {
    /// Implied source coordinates, `None` for locally originated packets.
    #[must_use]
    pub const fn source_coords(&self) -> Option<(i32, i32)> {
        self.link.source_of(self.unit)
    }
}

/// A busy/opcode observation for one unit during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStateEvent {
    /// Cycle of the observation.
    pub cycle: Cycle,
    /// Observed unit.
    pub unit: Unit,
    /// Whether the execution pipeline was occupied.
    pub busy: bool,
    /// Executing opcode, absent when idle.
    pub opcode: Option<String>,
}

impl ExecStateEvent {
    /// Whether the unit counts as active. `NOP` is busy in the pipeline sense
    /// but not for activity purposes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.busy && self.opcode.as_deref() != Some("NOP")
    }
}

/// All qualifying events of one cycle, as produced by the range loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEvents {
    /// Packet landings during the cycle.
    pub landings: Vec<LandingEvent>,
    /// Busy/opcode transitions during the cycle.
    pub exec_changes: Vec<ExecStateEvent>,
}

impl CycleEvents {
    /// Whether the cycle carries no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landings.is_empty() && self.exec_changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_source() {
        let event = LandingEvent {
            cycle: Cycle::from_raw(5),
            unit: Unit::new(1, 0),
            color: 3,
            link: Link::West,
        };
        assert_eq!(event.source_coords(), Some((0, 0)));
    }

    #[test]
    fn test_nop_not_active() {
        let mut event = ExecStateEvent {
            cycle: Cycle::zero(),
            unit: Unit::new(0, 0),
            busy: true,
            opcode: Some("NOP".to_string()),
        };
        assert!(!event.is_active());
        event.opcode = Some("FADDS".to_string());
        assert!(event.is_active());
        event.busy = false;
        assert!(!event.is_active());
    }
}
