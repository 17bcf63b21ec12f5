//! Game clock supplying per-tick delta and cumulative time

use crate::system::TickInput;
use std::time::Instant;

/// Longest wall-clock frame accepted by `tick()`, to avoid a spiral of death
const MAX_FRAME_TIME: f64 = 0.25;

/// Tracks game time, either from the wall clock or stepped manually
pub struct GameClock {
    /// Total elapsed game time in seconds
    pub total_time: f64,
    /// Time since last tick in seconds
    pub delta_time: f64,
    /// Number of ticks taken so far
    pub tick_count: u64,
    /// Last tick instant
    last_instant: Instant,
    /// Whether this is the first tick
    first_tick: bool,
    /// Whether ticks are frozen (delta forced to zero)
    paused: bool,
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            tick_count: 0,
            last_instant: Instant::now(),
            first_tick: true,
            paused: false,
        }
    }
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock from the wall clock. Call once per frame.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.delta_time = 0.0;
            self.tick_count += 1;
            return;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.record(elapsed.min(MAX_FRAME_TIME));
    }

    /// Advance the clock by an explicit step (headless and tests).
    ///
    /// Not clamped: a deliberately long step models a stall.
    pub fn advance(&mut self, dt: f64) {
        self.first_tick = false;
        self.record(dt.max(0.0));
    }

    fn record(&mut self, dt: f64) {
        self.delta_time = if self.paused { 0.0 } else { dt };
        self.total_time += self.delta_time;
        self.tick_count += 1;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Package the current tick for systems
    pub fn tick_input(&self) -> TickInput {
        TickInput::new(self.delta_time as f32, self.total_time)
    }
}
