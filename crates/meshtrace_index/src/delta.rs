//! Per-unit busy/opcode transition logs.
//!
//! The trace may report execution state densely, once per cycle per unit.
//! The tracker run-length compresses that into a sparse transition log, which
//! later supports O(log n) state reconstruction at any cycle.

use crate::event::ExecStateEvent;
use indexmap::IndexMap;
use meshtrace_core::{Cycle, Unit};
use serde::{Deserialize, Serialize};

/// Busy/opcode state of one unit at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Whether the execution pipeline is occupied.
    pub busy: bool,
    /// Executing opcode, absent when idle.
    pub opcode: Option<String>,
}

impl UnitState {
    /// The default state of every unit before its first transition.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            busy: false,
            opcode: None,
        }
    }

    /// Whether the unit counts as active (`NOP` does not).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.busy && self.opcode.as_deref() != Some("NOP")
    }
}

/// One recorded transition in a unit's delta log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTransition {
    /// Cycle the state changed.
    pub cycle: Cycle,
    /// New state from this cycle onward.
    pub state: UnitState,
}

/// Per-unit delta logs: strictly increasing cycle, no two consecutive entries
/// with the same state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStateLog {
    log: IndexMap<Unit, Vec<UnitTransition>>,
}

impl UnitStateLog {
    /// Units with at least one recorded transition.
    pub fn units(&self) -> impl Iterator<Item = Unit> + '_ {
        self.log.keys().copied()
    }

    /// The transition log of one unit.
    #[must_use]
    pub fn transitions(&self, unit: Unit) -> &[UnitTransition] {
        self.log.get(&unit).map_or(&[], Vec::as_slice)
    }

    /// Total recorded transitions across all units.
    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.log.values().map(Vec::len).sum()
    }

    /// State of `unit` at playhead position `at`: the latest transition with
    /// cycle <= `at`, idle if none.
    #[must_use]
    pub fn state_at(&self, unit: Unit, at: i64) -> UnitState {
        let transitions = self.transitions(unit);
        let pos = transitions.partition_point(|t| t.cycle.as_i64() <= at);
        pos.checked_sub(1)
            .map_or_else(UnitState::idle, |idx| transitions[idx].state.clone())
    }

    /// Reconstructed state of every tracked unit at playhead position `at`.
    ///
    /// Units absent here never left the idle default.
    #[must_use]
    pub fn snapshot_at(&self, at: i64) -> IndexMap<Unit, UnitState> {
        self.log
            .keys()
            .map(|unit| (*unit, self.state_at(*unit, at)))
            .collect()
    }
}

/// Builds a [`UnitStateLog`] during the initial scan.
#[derive(Debug, Default)]
pub struct StateDeltaTracker {
    last: IndexMap<Unit, UnitState>,
    log: UnitStateLog,
}

impl StateDeltaTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one execution-state event; returns whether it was an actual
    /// transition and got recorded.
    pub fn observe(&mut self, event: &ExecStateEvent) -> bool {
        let state = UnitState {
            busy: event.busy,
            opcode: event.opcode.clone(),
        };
        if self.last.get(&event.unit) == Some(&state) {
            return false;
        }
        self.last.insert(event.unit, state.clone());
        self.log
            .log
            .entry(event.unit)
            .or_default()
            .push(UnitTransition {
                cycle: event.cycle,
                state,
            });
        true
    }

    /// Drop the transient last-known-state table and keep the log.
    #[must_use]
    pub fn finish(self) -> UnitStateLog {
        self.log
    }
}
