//! Meshtrace Core Types
//!
//! Pure types shared by the indexing and replay crates: logical cycles,
//! unit coordinates, arrival links, grid mapping, and the error taxonomy.
//! No I/O lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cycle;
pub mod error;
pub mod unit;

// Re-exports
pub use cycle::Cycle;
pub use error::{TraceError, TraceResult};
pub use unit::{GridPos, Link, Unit};
