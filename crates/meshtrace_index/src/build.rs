//! Full-trace indexing: one streaming pass, bounded memory.

use crate::delta::{StateDeltaTracker, UnitStateLog};
use crate::index::{CycleIndex, CycleIndexBuilder};
use crate::scan::{LineEvent, LineScanner};
use crate::source::TraceSource;
use meshtrace_core::{Cycle, TraceResult};
use std::sync::Arc;

/// Everything the replay engine needs about one trace, built once per load
/// and immutable afterwards. Range loads are pure reads over it.
pub struct TraceIndex {
    dim_x: u16,
    dim_y: u16,
    cycle_index: CycleIndex,
    unit_state_log: UnitStateLog,
    bounds: Option<(Cycle, Cycle)>,
    total_landings: u64,
    source: Arc<dyn TraceSource>,
}

impl TraceIndex {
    /// Grid width, 0 if the trace declared no dimensions.
    #[must_use]
    pub const fn dim_x(&self) -> u16 {
        self.dim_x
    }

    /// Grid height, 0 if the trace declared no dimensions.
    #[must_use]
    pub const fn dim_y(&self) -> u16 {
        self.dim_y
    }

    /// The cycle-to-byte-range index.
    #[must_use]
    pub const fn cycle_index(&self) -> &CycleIndex {
        &self.cycle_index
    }

    /// Per-unit busy/opcode delta logs.
    #[must_use]
    pub const fn unit_state_log(&self) -> &UnitStateLog {
        &self.unit_state_log
    }

    /// Lowest event-bearing cycle, `None` for an event-free trace.
    #[must_use]
    pub fn min_cycle(&self) -> Option<Cycle> {
        self.bounds.map(|(min, _)| min)
    }

    /// Highest event-bearing cycle, `None` for an event-free trace.
    #[must_use]
    pub fn max_cycle(&self) -> Option<Cycle> {
        self.bounds.map(|(_, max)| max)
    }

    /// Total landing events in the trace.
    #[must_use]
    pub const fn total_landings(&self) -> u64 {
        self.total_landings
    }

    /// Whether the trace carries no qualifying events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cycle_index.is_empty()
    }

    /// The backing source.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn TraceSource> {
        &self.source
    }
}

impl std::fmt::Debug for TraceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceIndex")
            .field("dim_x", &self.dim_x)
            .field("dim_y", &self.dim_y)
            .field("indexed_cycles", &self.cycle_index.len())
            .field("bounds", &self.bounds)
            .field("total_landings", &self.total_landings)
            .finish_non_exhaustive()
    }
}

/// Index a trace in a single forward pass.
///
/// Malformed lines are dropped, never fatal; only I/O failure aborts. The
/// pass feeds the cycle-index builder and the state delta tracker from the
/// same scanner output, so no second pass is needed.
///
/// # Errors
///
/// Returns `TraceError::Io` if reading the source fails.
pub fn build_index(source: Arc<dyn TraceSource>) -> TraceResult<TraceIndex> {
    let mut reader = source.reader()?;
    let mut scanner = LineScanner::new();
    let mut index_builder = CycleIndexBuilder::new();
    let mut tracker = StateDeltaTracker::new();

    let mut bounds: Option<(Cycle, Cycle)> = None;
    let mut total_landings = 0u64;
    let mut offset = 0u64;
    let mut buf = Vec::new();

    let mut widen = |bounds: &mut Option<(Cycle, Cycle)>, cycle: Cycle| {
        *bounds = Some(match *bounds {
            None => (cycle, cycle),
            Some((min, max)) => (min.min(cycle), max.max(cycle)),
        });
    };

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        let line_start = offset;
        offset += read as u64;

        let mut end = buf.len();
        while end > 0 && (buf[end - 1] == b'\n' || buf[end - 1] == b'\r') {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&buf[..end]);

        let outcome = scanner.scan(&line);
        if let Some(tag) = outcome.cycle_tag {
            index_builder.observe_tag(tag, line_start);
        }
        match outcome.event {
            Some(LineEvent::Dimensions { .. }) => {}
            Some(LineEvent::Landing(event)) => {
                widen(&mut bounds, event.cycle);
                total_landings += 1;
                index_builder.record_event();
            }
            Some(LineEvent::Exec(event)) => {
                if tracker.observe(&event) {
                    widen(&mut bounds, event.cycle);
                }
                index_builder.record_event();
            }
            None => {}
        }
    }

    let (dim_x, dim_y) = scanner.dims().unwrap_or((0, 0));
    let cycle_index = index_builder.finish(offset);
    let unit_state_log = tracker.finish();

    tracing::debug!(
        dim_x,
        dim_y,
        indexed_cycles = cycle_index.len(),
        transitions = unit_state_log.transition_count(),
        total_landings,
        bytes = offset,
        "trace indexed"
    );

    Ok(TraceIndex {
        dim_x,
        dim_y,
        cycle_index,
        unit_state_log,
        bounds,
        total_landings,
        source,
    })
}
