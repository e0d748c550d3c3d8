//! Playback session: the state machine reconciling logical time to
//! wall-clock time.
//!
//! The session owns the cache, the generation counter, and the scheduler
//! state, and is driven by a periodic host-provided `tick`. There is no
//! module-level state; the host passes the session by reference into its
//! render loop.

use crate::cache::ReadAheadCache;
use crate::prefetch::{PrefetchSlot, PrefetchSpawner};
use indexmap::IndexMap;
use meshtrace_core::{Cycle, TraceResult, Unit};
use meshtrace_index::{
    ExecStateEvent, LandingEvent, TraceIndex, TraceSource, UnitState, build_index,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No trace loaded.
    Idle,
    /// Loaded, playback frozen.
    Paused,
    /// Loaded, advancing on ticks.
    Playing,
    /// Reached the last event-bearing cycle.
    Done,
}

/// Tuning knobs for prefetch and playback.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Indexed cycles fetched per prefetch.
    pub prefetch_window: usize,
    /// Refill when fewer than this many indexed cycles ahead of the playhead
    /// are cached.
    pub lookahead_margin: usize,
    /// Cycles kept behind the playhead before eviction.
    pub trail_window: u32,
    /// Upper bound on cycles advanced by one tick; bounds catch-up after a
    /// long stall.
    pub max_cycles_per_tick: i64,
    /// Playback speed in cycles per second at load time.
    pub initial_speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            prefetch_window: 64,
            lookahead_margin: 16,
            trail_window: 16,
            max_cycles_per_tick: 10_000,
            initial_speed: 10.0,
        }
    }
}

impl ReplayConfig {
    /// Set the prefetch window.
    #[must_use]
    pub fn with_prefetch_window(mut self, window: usize) -> Self {
        self.prefetch_window = window.max(1);
        self
    }

    /// Set the refill margin.
    #[must_use]
    pub fn with_lookahead_margin(mut self, margin: usize) -> Self {
        self.lookahead_margin = margin;
        self
    }

    /// Set the per-tick advancement cap.
    #[must_use]
    pub fn with_max_cycles_per_tick(mut self, cap: i64) -> Self {
        self.max_cycles_per_tick = cap.max(1);
        self
    }

    /// Set the initial speed in cycles per second.
    #[must_use]
    pub fn with_initial_speed(mut self, speed: f64) -> Self {
        self.initial_speed = speed;
        self
    }
}

/// Mutable playback position, owned and mutated only by the scheduler.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    /// Playhead position; ranges over `[min_cycle - 1, max_cycle]`.
    pub cursor: i64,
    /// Speed in cycles per second.
    pub speed: f64,
    /// Whether playback is advancing.
    pub playing: bool,
    /// Wall-clock anchor of the last accounted tick; `None` until the first
    /// tick after play/seek, so frozen packets resume with fresh timing.
    pub anchor: Option<Instant>,
    /// Lowest event-bearing cycle.
    pub min_cycle: Option<Cycle>,
    /// Highest event-bearing cycle.
    pub max_cycle: Option<Cycle>,
}

/// A notification for the renderer, emitted per applied cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplayEvent {
    /// A packet landed.
    Landing(LandingEvent),
    /// A unit's busy/opcode state changed.
    UnitState(ExecStateEvent),
}

struct Loaded {
    index: Arc<TraceIndex>,
    cache: ReadAheadCache,
    playback: PlaybackState,
    phase: Phase,
    unit_states: IndexMap<Unit, UnitState>,
    prefetch: PrefetchSlot,
    seek_flash: Option<Cycle>,
}

/// The replay session: trace index, cache, and playback state, discarded
/// together on unload.
pub struct ReplaySession {
    config: ReplayConfig,
    spawner: Arc<dyn PrefetchSpawner>,
    loaded: Option<Loaded>,
}

impl ReplaySession {
    /// Create an idle session.
    #[must_use]
    pub fn new(config: ReplayConfig, spawner: Arc<dyn PrefetchSpawner>) -> Self {
        Self {
            config,
            spawner,
            loaded: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.loaded.as_ref().map_or(Phase::Idle, |l| l.phase)
    }

    /// Current playhead position.
    #[must_use]
    pub fn cursor(&self) -> Option<i64> {
        self.loaded.as_ref().map(|l| l.playback.cursor)
    }

    /// Current speed in cycles per second.
    #[must_use]
    pub fn speed(&self) -> Option<f64> {
        self.loaded.as_ref().map(|l| l.playback.speed)
    }

    /// The loaded trace index.
    #[must_use]
    pub fn index(&self) -> Option<&Arc<TraceIndex>> {
        self.loaded.as_ref().map(|l| &l.index)
    }

    /// The full playback state, for status displays.
    #[must_use]
    pub fn playback(&self) -> Option<&PlaybackState> {
        self.loaded.as_ref().map(|l| &l.playback)
    }

    /// Live reconstructed state of a unit, idle if never observed.
    #[must_use]
    pub fn unit_state(&self, unit: Unit) -> UnitState {
        self.loaded
            .as_ref()
            .and_then(|l| l.unit_states.get(&unit).cloned())
            .unwrap_or_else(UnitState::idle)
    }

    /// Cycles currently held by the read-ahead cache, ascending.
    #[must_use]
    pub fn cached_cycles(&self) -> Vec<Cycle> {
        self.loaded
            .as_ref()
            .map(|l| l.cache.cached_cycles().collect())
            .unwrap_or_default()
    }

    /// Index a trace and become `Paused` at `min_cycle - 1`, with an initial
    /// prefetch issued.
    ///
    /// Indexing is one long-running pass; hosts that must not block wrap this
    /// call in their executor and discard the result on cancel.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Io` if reading the source fails. Malformed trace
    /// content never fails the load.
    pub fn load(&mut self, source: Arc<dyn TraceSource>) -> TraceResult<()> {
        let index = Arc::new(build_index(source)?);
        let min_cycle = index.min_cycle();
        let max_cycle = index.max_cycle();
        let cursor = min_cycle.map_or(-1, |c| c.as_i64() - 1);

        let mut cache = ReadAheadCache::new();
        cache.bump_generation();

        let mut loaded = Loaded {
            index,
            cache,
            playback: PlaybackState {
                cursor,
                speed: self.config.initial_speed,
                playing: false,
                anchor: None,
                min_cycle,
                max_cycle,
            },
            phase: Phase::Paused,
            unit_states: IndexMap::new(),
            prefetch: PrefetchSlot::new(),
            seek_flash: None,
        };
        loaded.refill(&self.config, self.spawner.as_ref());
        tracing::debug!(cursor, ?min_cycle, ?max_cycle, "trace loaded");
        self.loaded = Some(loaded);
        Ok(())
    }

    /// Start or resume playback, anchoring wall-clock time at `now`.
    ///
    /// From `Done`, rewinds to the start first. Packets frozen mid-flight by
    /// a prior seek resume with fresh timing because the anchor is re-set.
    pub fn play(&mut self, now: Instant) {
        let config = self.config.clone();
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        if loaded.phase == Phase::Done {
            let rewind = loaded.playback.min_cycle.map_or(-1, |c| c.as_i64() - 1);
            loaded.seek_to(rewind, &config, self.spawner.as_ref());
        }
        loaded.phase = Phase::Playing;
        loaded.playback.playing = true;
        loaded.playback.anchor = Some(now);
        // Probe the cache so a stale window refills before the first tick.
        loaded.refill(&config, self.spawner.as_ref());
    }

    /// Freeze playback; the cache is untouched.
    pub fn pause(&mut self) {
        if let Some(loaded) = self.loaded.as_mut() {
            if loaded.phase == Phase::Playing {
                loaded.phase = Phase::Paused;
            }
            loaded.playback.playing = false;
            loaded.playback.anchor = None;
        }
    }

    /// Change the playback speed, re-anchoring at `now` so elapsed time is
    /// not re-counted at the new rate.
    pub fn set_speed(&mut self, cycles_per_sec: f64, now: Instant) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.playback.speed = cycles_per_sec.max(0.0);
            if loaded.playback.playing {
                loaded.playback.anchor = Some(now);
            }
        }
    }

    /// Seek to a playhead position, clamped to `[min_cycle - 1, max_cycle]`.
    ///
    /// Invalidates in-flight prefetches by generation, clears the cache,
    /// reconstructs every tracked unit's state from the delta logs, and
    /// issues a fresh prefetch starting at the target's own cycle (its events
    /// resurface through the next tick as transient visuals).
    ///
    /// Returns the reconstructed per-unit states; units absent from the map
    /// never left idle.
    pub fn seek(&mut self, target: i64) -> IndexMap<Unit, UnitState> {
        let config = self.config.clone();
        let Some(loaded) = self.loaded.as_mut() else {
            return IndexMap::new();
        };
        loaded.seek_to(target, &config, self.spawner.as_ref())
    }

    /// Advance playback according to wall-clock time, delivering landing and
    /// unit-state notifications through `emit`.
    ///
    /// Completed prefetches are merged (or discarded by generation) even
    /// while paused. While playing, elapsed time converts to whole cycles at
    /// the current speed, capped per tick; the walk stops at the first
    /// required-but-uncached cycle, keeping wall-clock credit for the
    /// unconsumed time.
    pub fn tick(&mut self, now: Instant, emit: &mut dyn FnMut(ReplayEvent)) {
        let config = self.config.clone();
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        loaded.drain_prefetch(emit);
        loaded.ensure_seek_fetch(&config, self.spawner.as_ref());

        if loaded.phase != Phase::Playing {
            return;
        }
        let Some(max_cycle) = loaded.playback.max_cycle else {
            loaded.finish_playback();
            return;
        };
        let Some(anchor) = loaded.playback.anchor else {
            loaded.playback.anchor = Some(now);
            return;
        };
        let speed = loaded.playback.speed;
        if speed <= 0.0 {
            return;
        }

        let elapsed = now.saturating_duration_since(anchor);
        let mut budget = (elapsed.as_secs_f64() * speed).floor() as i64;
        let capped = budget > config.max_cycles_per_tick;
        if capped {
            budget = config.max_cycles_per_tick;
        }
        if budget <= 0 {
            return;
        }

        let start = loaded.playback.cursor;
        let target = (start + budget).min(max_cycle.as_i64());
        let index = loaded.index.clone();
        let cycle_index = index.cycle_index();

        let mut pos = cycle_index.find_after(start);
        let mut stalled_at = None;
        while let Some(cycle) = cycle_index.cycle_at(pos) {
            if cycle.as_i64() > target {
                break;
            }
            match loaded.cache.take(cycle) {
                Some(events) => {
                    loaded.apply_cycle(&events, emit);
                    loaded.playback.cursor = cycle.as_i64();
                    pos += 1;
                }
                None => {
                    stalled_at = Some((pos, cycle));
                    break;
                }
            }
        }

        match stalled_at {
            Some((pos, cycle)) => {
                // Stop just before the missing cycle; non-indexed cycles up
                // to it carry no events and advance freely.
                loaded.playback.cursor = cycle.as_i64() - 1;
                loaded.prefetch.issue(
                    self.spawner.as_ref(),
                    index.clone(),
                    loaded.cache.generation(),
                    pos,
                    (pos + config.prefetch_window - 1).min(cycle_index.len() - 1),
                );
            }
            None => loaded.playback.cursor = target,
        }

        // The anchor advances only by the time actually spent: unconsumed
        // stall credit carries over; time beyond the per-tick cap is
        // forfeited.
        let advanced = loaded.playback.cursor - start;
        if capped {
            let leftover = (budget - advanced).max(0) as f64 / speed;
            loaded.playback.anchor = Some(now - Duration::from_secs_f64(leftover));
        } else {
            loaded.playback.anchor =
                Some(anchor + Duration::from_secs_f64(advanced as f64 / speed));
        }

        if loaded.playback.cursor >= max_cycle.as_i64() {
            loaded.finish_playback();
            return;
        }

        loaded.cache.evict_trailing(loaded.playback.cursor, config.trail_window);
        if stalled_at.is_none() {
            loaded.refill(&config, self.spawner.as_ref());
        }
    }

    /// Discard the trace, cache, and playback state, returning to `Idle`.
    ///
    /// Outstanding prefetches are cancelled logically: the underlying read
    /// completes and its result is dropped.
    pub fn cancel(&mut self) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.cache.bump_generation();
            loaded.cache.clear();
        }
        self.loaded = None;
        tracing::debug!("session cancelled");
    }
}

impl Loaded {
    /// Merge or discard completed prefetches; flush the seek cycle's events
    /// as transient visuals once they arrive.
    fn drain_prefetch(&mut self, emit: &mut dyn FnMut(ReplayEvent)) {
        for outcome in self.prefetch.drain() {
            match outcome.events {
                Ok(events) => {
                    self.cache.merge(outcome.generation, events);
                }
                Err(err) => {
                    // Treated as "still missing"; the refill trigger retries.
                    tracing::warn!(
                        from_idx = outcome.from_idx,
                        to_idx = outcome.to_idx,
                        error = %err,
                        "prefetch failed"
                    );
                }
            }
        }
        if let Some(cycle) = self.seek_flash {
            if let Some(events) = self.cache.take(cycle) {
                self.apply_cycle(&events, emit);
                self.seek_flash = None;
            }
        }
    }

    /// The seek-target fetch coalesces away if a prefetch was already in
    /// flight at seek time; re-issue it once the slot frees up.
    fn ensure_seek_fetch(&mut self, config: &ReplayConfig, spawner: &dyn PrefetchSpawner) {
        let Some(cycle) = self.seek_flash else {
            return;
        };
        if self.prefetch.in_flight() || self.cache.contains(cycle) {
            return;
        }
        let cycle_index = self.index.cycle_index();
        match cycle_index.find(cycle) {
            Some(pos) => {
                let to_idx = (pos + config.prefetch_window - 1).min(cycle_index.len() - 1);
                self.prefetch.issue(
                    spawner,
                    self.index.clone(),
                    self.cache.generation(),
                    pos,
                    to_idx,
                );
            }
            None => self.seek_flash = None,
        }
    }

    fn apply_cycle(
        &mut self,
        events: &meshtrace_index::CycleEvents,
        emit: &mut dyn FnMut(ReplayEvent),
    ) {
        for landing in &events.landings {
            emit(ReplayEvent::Landing(landing.clone()));
        }
        for change in &events.exec_changes {
            self.unit_states.insert(
                change.unit,
                UnitState {
                    busy: change.busy,
                    opcode: change.opcode.clone(),
                },
            );
            emit(ReplayEvent::UnitState(change.clone()));
        }
    }

    /// Refill trigger: prefetch when the playhead nears the end of the
    /// cached window.
    fn refill(&mut self, config: &ReplayConfig, spawner: &dyn PrefetchSpawner) {
        if self.prefetch.in_flight() {
            return;
        }
        let cycle_index = self.index.cycle_index();
        let ahead = cycle_index.find_after(self.playback.cursor);

        let mut first_uncached = None;
        for pos in ahead..cycle_index.len() {
            let Some(cycle) = cycle_index.cycle_at(pos) else {
                break;
            };
            if !self.cache.contains(cycle) {
                first_uncached = Some(pos);
                break;
            }
        }
        let Some(first_uncached) = first_uncached else {
            return;
        };
        if first_uncached - ahead >= config.lookahead_margin {
            return;
        }
        let to_idx = (first_uncached + config.prefetch_window - 1).min(cycle_index.len() - 1);
        self.prefetch.issue(
            spawner,
            self.index.clone(),
            self.cache.generation(),
            first_uncached,
            to_idx,
        );
    }

    fn seek_to(
        &mut self,
        target: i64,
        config: &ReplayConfig,
        spawner: &dyn PrefetchSpawner,
    ) -> IndexMap<Unit, UnitState> {
        let floor = self.playback.min_cycle.map_or(-1, |c| c.as_i64() - 1);
        let ceil = self.playback.max_cycle.map_or(floor, |c| c.as_i64());
        let target = target.clamp(floor, ceil);

        self.cache.bump_generation();
        self.cache.clear();
        self.seek_flash = None;

        let snapshot = self.index.unit_state_log().snapshot_at(target);
        self.unit_states = snapshot.clone();
        self.playback.cursor = target;
        self.playback.anchor = None;
        if self.phase == Phase::Done && target < ceil {
            self.phase = if self.playback.playing {
                Phase::Playing
            } else {
                Phase::Paused
            };
        }

        // One combined fetch: the target cycle itself (for transient
        // visuals) plus the fresh read-ahead window after it. The single
        // in-flight slot forbids issuing these separately.
        let cycle_index = self.index.cycle_index();
        if target >= 0 {
            if let Some(pos) = cycle_index.find(Cycle::from_raw(target as u32)) {
                self.seek_flash = cycle_index.cycle_at(pos);
                let to_idx = (pos + config.prefetch_window - 1).min(cycle_index.len() - 1);
                self.prefetch.issue(
                    spawner,
                    self.index.clone(),
                    self.cache.generation(),
                    pos,
                    to_idx,
                );
                tracing::debug!(target, "seek with indexed target");
                return snapshot;
            }
        }
        self.refill(config, spawner);
        tracing::debug!(target, "seek");
        snapshot
    }

    fn finish_playback(&mut self) {
        self.phase = Phase::Done;
        self.playback.playing = false;
        self.playback.anchor = None;
        tracing::debug!(cursor = self.playback.cursor, "playback done");
    }
}
