//! Bounded, forward-biased cycle-to-events cache.
//!
//! Filled by asynchronous prefetch jobs ahead of the playback position. The
//! generation token is the sole synchronization mechanism: every seek/cancel
//! increments it, and a completing prefetch whose captured generation no
//! longer matches is discarded entirely, never merged partially.

use meshtrace_core::Cycle;
use meshtrace_index::CycleEvents;
use std::collections::BTreeMap;

/// Cache of parsed events keyed by cycle.
#[derive(Debug, Default)]
pub struct ReadAheadCache {
    entries: BTreeMap<Cycle, CycleEvents>,
    generation: u64,
}

impl ReadAheadCache {
    /// Create an empty cache at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current generation token.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate all in-flight prefetch results.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Number of cached cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a cycle's events are cached.
    #[must_use]
    pub fn contains(&self, cycle: Cycle) -> bool {
        self.entries.contains_key(&cycle)
    }

    /// Remove and return a cycle's events. Consumed entries leave the cache
    /// immediately.
    pub fn take(&mut self, cycle: Cycle) -> Option<CycleEvents> {
        self.entries.remove(&cycle)
    }

    /// Merge a completed prefetch, or discard it wholesale if its captured
    /// generation is stale. Returns whether the merge happened.
    pub fn merge(&mut self, generation: u64, events: BTreeMap<Cycle, CycleEvents>) -> bool {
        if generation != self.generation {
            tracing::debug!(
                captured = generation,
                current = self.generation,
                "discarding stale prefetch result"
            );
            return false;
        }
        self.entries.extend(events);
        true
    }

    /// Drop entries trailing more than `trail_window` cycles behind the
    /// playback position.
    pub fn evict_trailing(&mut self, playhead: i64, trail_window: u32) {
        let floor = playhead - i64::from(trail_window);
        self.entries.retain(|cycle, _| cycle.as_i64() > floor);
    }

    /// Drop everything, keeping the generation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached cycles in ascending order.
    pub fn cached_cycles(&self) -> impl Iterator<Item = Cycle> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_at(cycles: &[u32]) -> BTreeMap<Cycle, CycleEvents> {
        cycles
            .iter()
            .map(|c| (Cycle::from_raw(*c), CycleEvents::default()))
            .collect()
    }

    #[test]
    fn test_merge_current_generation() {
        let mut cache = ReadAheadCache::new();
        assert!(cache.merge(0, events_at(&[5, 6])));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(Cycle::from_raw(5)));
    }

    #[test]
    fn test_stale_merge_discarded() {
        let mut cache = ReadAheadCache::new();
        let captured = cache.generation();
        cache.bump_generation();
        assert!(!cache.merge(captured, events_at(&[5, 6])));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_take_removes() {
        let mut cache = ReadAheadCache::new();
        cache.merge(0, events_at(&[5]));
        assert!(cache.take(Cycle::from_raw(5)).is_some());
        assert!(cache.take(Cycle::from_raw(5)).is_none());
    }

    #[test]
    fn test_evict_trailing() {
        let mut cache = ReadAheadCache::new();
        cache.merge(0, events_at(&[5, 10, 40, 50]));
        cache.evict_trailing(40, 16);
        let left: Vec<u32> = cache.cached_cycles().map(|c| c.as_u32()).collect();
        assert_eq!(left, vec![40, 50]);
    }

    #[test]
    fn test_clear_keeps_generation() {
        let mut cache = ReadAheadCache::new();
        cache.bump_generation();
        cache.merge(1, events_at(&[5]));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
    }
}
