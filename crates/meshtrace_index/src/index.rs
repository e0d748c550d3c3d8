//! Cycle-to-byte-range index.
//!
//! One entry per cycle that contains at least one qualifying event; empty
//! blocks are omitted so lookups skip gaps in O(log n). Stored as parallel
//! vectors (structure-of-arrays) since traces can index millions of cycles.

use meshtrace_core::Cycle;
use serde::{Deserialize, Serialize};

/// One indexed cycle: the byte range containing exactly its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleIndexEntry {
    /// The indexed cycle.
    pub cycle: Cycle,
    /// First byte of the cycle's block.
    pub byte_start: u64,
    /// One past the last byte of the cycle's block.
    pub byte_end: u64,
}

/// Sorted list of (cycle, byte range) entries with strictly increasing cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleIndex {
    cycles: Vec<Cycle>,
    starts: Vec<u64>,
    ends: Vec<u64>,
}

impl CycleIndex {
    /// Number of indexed cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Whether no cycle carries events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// The entry at a position.
    #[must_use]
    pub fn entry(&self, idx: usize) -> Option<CycleIndexEntry> {
        Some(CycleIndexEntry {
            cycle: *self.cycles.get(idx)?,
            byte_start: self.starts[idx],
            byte_end: self.ends[idx],
        })
    }

    /// The cycle at a position.
    #[must_use]
    pub fn cycle_at(&self, idx: usize) -> Option<Cycle> {
        self.cycles.get(idx).copied()
    }

    /// Position of an exact cycle, `None` if the cycle carries no events.
    #[must_use]
    pub fn find(&self, cycle: Cycle) -> Option<usize> {
        self.cycles.binary_search(&cycle).ok()
    }

    /// Position of the first indexed cycle >= `cycle`; `len()` if none.
    #[must_use]
    pub fn find_ge(&self, cycle: Cycle) -> usize {
        self.cycles.partition_point(|c| *c < cycle)
    }

    /// Position of the last indexed cycle <= `cycle`.
    #[must_use]
    pub fn find_le(&self, cycle: Cycle) -> Option<usize> {
        self.cycles.partition_point(|c| *c <= cycle).checked_sub(1)
    }

    /// Position of the first indexed cycle strictly after a playhead position.
    #[must_use]
    pub fn find_after(&self, playhead: i64) -> usize {
        self.cycles.partition_point(|c| c.as_i64() <= playhead)
    }

    /// Contiguous byte range spanning the entries `[from_idx, to_idx]`.
    #[must_use]
    pub fn byte_range(&self, from_idx: usize, to_idx: usize) -> Option<(u64, u64)> {
        if from_idx > to_idx || to_idx >= self.len() {
            return None;
        }
        Some((self.starts[from_idx], self.ends[to_idx]))
    }

    fn push(&mut self, cycle: Cycle, byte_start: u64, byte_end: u64) -> bool {
        if let Some(last) = self.cycles.last() {
            if *last >= cycle {
                return false;
            }
        }
        self.cycles.push(cycle);
        self.starts.push(byte_start);
        self.ends.push(byte_end);
        true
    }
}

/// Builds a [`CycleIndex`] from the single streaming scan.
///
/// Tracks one "open" block: its cycle, starting offset, and whether it has
/// accumulated any qualifying event. A differing cycle tag closes the block;
/// blocks without events are dropped.
#[derive(Debug, Default)]
pub struct CycleIndexBuilder {
    open: Option<OpenBlock>,
    index: CycleIndex,
}

#[derive(Debug)]
struct OpenBlock {
    cycle: Cycle,
    byte_start: u64,
    has_events: bool,
}

impl CycleIndexBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a line's cycle tag at its starting offset.
    pub fn observe_tag(&mut self, cycle: Cycle, line_start: u64) {
        match &self.open {
            Some(block) if block.cycle == cycle => {}
            _ => {
                self.close(line_start);
                self.open = Some(OpenBlock {
                    cycle,
                    byte_start: line_start,
                    has_events: false,
                });
            }
        }
    }

    /// Mark the open block as carrying at least one qualifying event.
    pub fn record_event(&mut self) {
        if let Some(block) = &mut self.open {
            block.has_events = true;
        }
    }

    /// Close the last open block against end-of-stream and finish.
    #[must_use]
    pub fn finish(mut self, end_offset: u64) -> CycleIndex {
        self.close(end_offset);
        self.index
    }

    fn close(&mut self, end_offset: u64) {
        if let Some(block) = self.open.take() {
            if block.has_events
                && !self.index.push(block.cycle, block.byte_start, end_offset)
            {
                // Out-of-order cycle blocks would break binary search; treat
                // them like malformed input and drop.
                tracing::debug!(cycle = %block.cycle, "dropping out-of-order cycle block");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(blocks: &[(u32, u64, bool)], end: u64) -> CycleIndex {
        let mut builder = CycleIndexBuilder::new();
        for (cycle, start, has_events) in blocks {
            builder.observe_tag(Cycle::from_raw(*cycle), *start);
            if *has_events {
                builder.record_event();
            }
        }
        builder.finish(end)
    }

    #[test]
    fn test_empty_blocks_omitted() {
        let index = build(&[(1, 0, true), (2, 10, false), (3, 20, true)], 30);
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.entry(0).unwrap(),
            CycleIndexEntry {
                cycle: Cycle::from_raw(1),
                byte_start: 0,
                byte_end: 10,
            }
        );
        // The empty block's bytes are absorbed into the gap, the next entry
        // starts at its own first line.
        assert_eq!(index.entry(1).unwrap().byte_start, 20);
        assert_eq!(index.entry(1).unwrap().byte_end, 30);
    }

    #[test]
    fn test_last_block_closed_at_eof() {
        let index = build(&[(5, 0, true)], 42);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(0).unwrap().byte_end, 42);
    }

    #[test]
    fn test_repeated_tag_extends_block() {
        let mut builder = CycleIndexBuilder::new();
        builder.observe_tag(Cycle::from_raw(4), 0);
        builder.record_event();
        builder.observe_tag(Cycle::from_raw(4), 15);
        builder.observe_tag(Cycle::from_raw(6), 30);
        let index = builder.finish(40);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(0).unwrap().byte_end, 30);
    }

    #[test]
    fn test_out_of_order_block_dropped() {
        let index = build(&[(5, 0, true), (3, 10, true), (8, 20, true)], 30);
        assert_eq!(index.len(), 2);
        assert_eq!(index.cycle_at(0), Some(Cycle::from_raw(5)));
        assert_eq!(index.cycle_at(1), Some(Cycle::from_raw(8)));
    }

    #[test]
    fn test_lookups() {
        let index = build(&[(2, 0, true), (5, 10, true), (9, 20, true)], 30);
        assert_eq!(index.find(Cycle::from_raw(5)), Some(1));
        assert_eq!(index.find(Cycle::from_raw(6)), None);
        assert_eq!(index.find_ge(Cycle::from_raw(6)), 2);
        assert_eq!(index.find_ge(Cycle::from_raw(10)), 3);
        assert_eq!(index.find_le(Cycle::from_raw(6)), Some(1));
        assert_eq!(index.find_le(Cycle::from_raw(1)), None);
        assert_eq!(index.find_after(-1), 0);
        assert_eq!(index.find_after(5), 2);
    }

    #[test]
    fn test_byte_range() {
        let index = build(&[(2, 0, true), (5, 10, true)], 25);
        assert_eq!(index.byte_range(0, 1), Some((0, 25)));
        assert_eq!(index.byte_range(1, 0), None);
        assert_eq!(index.byte_range(0, 2), None);
    }
}
