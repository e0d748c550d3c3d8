//! Meshtrace Indexing
//!
//! Converts a large, append-only, line-oriented trace log into a structure
//! supporting single-pass streaming ingestion with bounded memory and
//! random-access retrieval of arbitrary cycle ranges without rescanning.
//!
//! The pipeline: [`scan::LineScanner`] classifies raw lines,
//! [`index::CycleIndexBuilder`] maps cycles to byte ranges,
//! [`delta::StateDeltaTracker`] run-length compresses per-unit busy/opcode
//! signals, [`build::build_index`] runs all three in one pass, and
//! [`range::load_cycle_range`] reparses exactly one byte range on demand.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod build;
pub mod delta;
pub mod event;
pub mod index;
pub mod range;
pub mod scan;
pub mod source;

// Re-exports
pub use build::{TraceIndex, build_index};
pub use delta::{StateDeltaTracker, UnitState, UnitStateLog, UnitTransition};
pub use event::{CycleEvents, ExecStateEvent, LandingEvent};
pub use index::{CycleIndex, CycleIndexBuilder, CycleIndexEntry};
pub use range::load_cycle_range;
pub use scan::{LineEvent, LineScanner, ScanOutcome};
pub use source::{FileSource, MemorySource, TraceSource};
