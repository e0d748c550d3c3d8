//! Asynchronous prefetch boundary.
//!
//! The session never blocks on I/O: a prefetch job slices and reparses a
//! byte range off-thread and posts its result into a channel the next tick
//! drains. Where jobs actually run is a seam so hosts can bring their own
//! executor and tests can run deterministically.

use meshtrace_core::{Cycle, TraceResult};
use meshtrace_index::{CycleEvents, TraceIndex, load_cycle_range};
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};

/// Executes prefetch jobs.
pub trait PrefetchSpawner: Send + Sync {
    /// Run a job, now or later, on any thread.
    fn spawn(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs jobs on the tokio blocking pool.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl PrefetchSpawner for TokioSpawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send>) {
        tokio::task::spawn_blocking(job);
    }
}

/// Runs jobs immediately on the calling thread.
///
/// Turns every prefetch into a synchronous load; useful for small traces and
/// simple embeddings.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSpawner;

impl PrefetchSpawner for InlineSpawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Holds jobs until the host drains them.
///
/// Gives embedders (and tests) full control over when I/O completes relative
/// to ticks and seeks.
#[derive(Default)]
pub struct QueueSpawner {
    jobs: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
}

impl QueueSpawner {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.jobs.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Run the oldest queued job, if any.
    pub fn run_one(&self) -> bool {
        let job = self.jobs.lock().ok().and_then(|mut q| q.pop_front());
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run every queued job in order.
    pub fn run_all(&self) {
        while self.run_one() {}
    }
}

impl PrefetchSpawner for QueueSpawner {
    fn spawn(&self, job: Box<dyn FnOnce() + Send>) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push_back(job);
        }
    }
}

/// A completed prefetch, posted back to the session thread.
pub(crate) struct PrefetchOutcome {
    pub generation: u64,
    pub from_idx: usize,
    pub to_idx: usize,
    pub events: TraceResult<BTreeMap<Cycle, CycleEvents>>,
}

/// Single-slot in-flight guard plus the result channel.
///
/// At most one prefetch is in flight at any time; trace files are read
/// sequentially and concurrent fetches would only reorder results. A request
/// while one is outstanding is a no-op.
pub(crate) struct PrefetchSlot {
    in_flight: bool,
    tx: Sender<PrefetchOutcome>,
    rx: Receiver<PrefetchOutcome>,
}

impl PrefetchSlot {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            in_flight: false,
            tx,
            rx,
        }
    }

    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Issue a load of the indexed cycles `[from_idx, to_idx]`, tagged with
    /// the generation current at issue time. No-op while one is outstanding.
    pub fn issue(
        &mut self,
        spawner: &dyn PrefetchSpawner,
        index: Arc<TraceIndex>,
        generation: u64,
        from_idx: usize,
        to_idx: usize,
    ) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        tracing::debug!(generation, from_idx, to_idx, "issuing prefetch");

        let tx = self.tx.clone();
        spawner.spawn(Box::new(move || {
            let events = load_cycle_range(&index, from_idx, to_idx);
            // The session may have been cancelled; a closed channel is fine.
            let _ = tx.send(PrefetchOutcome {
                generation,
                from_idx,
                to_idx,
                events,
            });
        }));
        true
    }

    /// Drain completed prefetches, clearing the in-flight guard.
    pub fn drain(&mut self) -> Vec<PrefetchOutcome> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => {
                    self.in_flight = false;
                    out.push(outcome);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshtrace_index::{MemorySource, build_index};

    fn tiny_index() -> Arc<TraceIndex> {
        let text = "@0 dimX=1, dimY=1\n@5 P0.0 (x) landing C1 from link R, flit 0\n";
        Arc::new(build_index(Arc::new(MemorySource::new(text.as_bytes().to_vec()))).unwrap())
    }

    #[test]
    fn test_single_slot_coalescing() {
        let spawner = QueueSpawner::new();
        let mut slot = PrefetchSlot::new();
        let index = tiny_index();

        assert!(slot.issue(&spawner, index.clone(), 0, 0, 0));
        assert!(!slot.issue(&spawner, index, 0, 0, 0));
        assert_eq!(spawner.pending(), 1);

        spawner.run_all();
        let outcomes = slot.drain();
        assert_eq!(outcomes.len(), 1);
        assert!(!slot.in_flight());
        assert_eq!(outcomes[0].events.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_inline_spawner_completes_immediately() {
        let mut slot = PrefetchSlot::new();
        assert!(slot.issue(&InlineSpawner, tiny_index(), 7, 0, 0));
        let outcomes = slot.drain();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].generation, 7);
    }
}
