//! Random-access reparse of indexed cycle ranges.

use crate::build::TraceIndex;
use crate::event::CycleEvents;
use crate::scan::{LineEvent, LineScanner};
use indexmap::IndexMap;
use meshtrace_core::{Cycle, TraceResult};
use std::collections::BTreeMap;

/// Load the events of the indexed cycles `[from_idx, to_idx]`.
///
/// Slices exactly that byte range from the backing source and reparses it
/// with the same classification rules as the indexing scan. Execution-state
/// duplicate suppression is recomputed locally, seeded from an empty previous
/// state, so two independent loads of the same range are identical: this is a
/// pure function over the immutable index.
///
/// Out-of-bounds or reversed index ranges return an empty map, never an
/// error.
///
/// # Errors
///
/// Returns `TraceError::Io` if reading the source fails.
pub fn load_cycle_range(
    index: &TraceIndex,
    from_idx: usize,
    to_idx: usize,
) -> TraceResult<BTreeMap<Cycle, CycleEvents>> {
    let Some((byte_start, byte_end)) = index.cycle_index().byte_range(from_idx, to_idx) else {
        return Ok(BTreeMap::new());
    };

    let bytes = index.source().read_range(byte_start, byte_end)?;
    let text = String::from_utf8_lossy(&bytes);

    let mut scanner = LineScanner::new();
    let mut result: BTreeMap<Cycle, CycleEvents> = BTreeMap::new();
    let mut prev_state = IndexMap::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match scanner.scan(line).event {
            Some(LineEvent::Landing(event)) => {
                result.entry(event.cycle).or_default().landings.push(event);
            }
            Some(LineEvent::Exec(event)) => {
                let state = (event.busy, event.opcode.clone());
                if prev_state.get(&event.unit) != Some(&state) {
                    prev_state.insert(event.unit, state);
                    result
                        .entry(event.cycle)
                        .or_default()
                        .exec_changes
                        .push(event);
                }
            }
            Some(LineEvent::Dimensions { .. }) | None => {}
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_index;
    use crate::source::MemorySource;
    use meshtrace_core::{Link, Unit};
    use std::sync::Arc;

    const SAMPLE: &str = "\
@0 dimX=2, dimY=2
@3 P0.0 router push east
@5 P1.0 (x) landing C3 from link W, flit 0
@5 P0.0:[EX OP] T0 FADDS
@6 P0.0:[EX OP] T0 FADDS
@9 P0.0:[EX OP] IDLE
@9 P1.0 (q) landing C1 from link R, flit 2
";

    fn sample_index() -> TraceIndex {
        build_index(Arc::new(MemorySource::new(SAMPLE.as_bytes().to_vec()))).unwrap()
    }

    #[test]
    fn test_load_single_cycle() {
        let index = sample_index();
        let pos = index.cycle_index().find(Cycle::from_raw(5)).unwrap();
        let events = load_cycle_range(&index, pos, pos).unwrap();
        assert_eq!(events.len(), 1);

        let cycle = &events[&Cycle::from_raw(5)];
        assert_eq!(cycle.landings.len(), 1);
        assert_eq!(cycle.landings[0].unit, Unit::new(1, 0));
        assert_eq!(cycle.landings[0].color, 3);
        assert_eq!(cycle.landings[0].link, Link::West);
        assert_eq!(cycle.exec_changes.len(), 1);
        assert_eq!(cycle.exec_changes[0].opcode.as_deref(), Some("FADDS"));
    }

    #[test]
    fn test_local_suppression_seeded_empty() {
        let index = sample_index();
        // Cycle 6 alone: its duplicate FADDS is the first exec event the
        // loader sees, so it is reported.
        let pos = index.cycle_index().find(Cycle::from_raw(6)).unwrap();
        let events = load_cycle_range(&index, pos, pos).unwrap();
        assert_eq!(events[&Cycle::from_raw(6)].exec_changes.len(), 1);

        // Loaded together with cycle 5, the duplicate is suppressed.
        let from = index.cycle_index().find(Cycle::from_raw(5)).unwrap();
        let events = load_cycle_range(&index, from, pos).unwrap();
        assert!(!events.contains_key(&Cycle::from_raw(6)));
    }

    #[test]
    fn test_full_range() {
        let index = sample_index();
        let last = index.cycle_index().len() - 1;
        let events = load_cycle_range(&index, 0, last).unwrap();
        let cycles: Vec<u32> = events.keys().map(Cycle::as_u32).collect();
        assert_eq!(cycles, vec![5, 9]);
        assert_eq!(events[&Cycle::from_raw(9)].landings[0].link, Link::Local);
        assert_eq!(events[&Cycle::from_raw(9)].landings[0].source_coords(), None);
    }

    #[test]
    fn test_idempotent() {
        let index = sample_index();
        let last = index.cycle_index().len() - 1;
        let first = load_cycle_range(&index, 0, last).unwrap();
        let second = load_cycle_range(&index, 0, last).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_ranges_empty() {
        let index = sample_index();
        assert!(load_cycle_range(&index, 2, 1).unwrap().is_empty());
        assert!(load_cycle_range(&index, 0, 99).unwrap().is_empty());
    }
}
