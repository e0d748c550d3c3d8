//! Meshtrace Replay
//!
//! Smooth variable-speed forward playback with asynchronous read-ahead, and
//! instantaneous seeking with state reconstruction from the delta logs.
//!
//! A single logical thread drives [`session::ReplaySession`] via a periodic
//! host-provided tick; all cache and generation mutation happens there, so
//! the cache needs no locking. The only concurrent boundary is the read +
//! parse performed by a prefetch job, joined back in optimistically through a
//! generation token.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod prefetch;
pub mod session;

// Re-exports
pub use cache::ReadAheadCache;
pub use prefetch::{InlineSpawner, PrefetchSpawner, QueueSpawner, TokioSpawner};
pub use session::{Phase, PlaybackState, ReplayConfig, ReplayEvent, ReplaySession};
