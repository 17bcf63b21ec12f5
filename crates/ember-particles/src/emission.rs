//! Emission scheduling: how many particles an emitter owes each tick

use crate::config::{EmissionMode, EmitterConfig};
use ember_core::{EmberError, Result};
use tracing::warn;

/// Largest emit count a single dispatch may carry
pub const DISPATCH_LIMIT: u32 = 65535;

/// Outcome of advancing the scheduler by one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionTick {
    /// Particles to spawn this tick
    pub count: u32,
    /// Owed emissions discarded by the per-tick cap
    pub dropped: u64,
}

/// Converts elapsed time into a whole number of emissions at a fixed rate.
///
/// Fractional emission time carries over between ticks. When a long tick
/// owes more than `max_per_tick`, the excess is discarded instead of being
/// carried forward, so a stall cannot snowball into an unbounded burst.
#[derive(Debug, Clone)]
pub struct EmissionScheduler {
    inter_arrival: f64,
    time_since_last_emit: f64,
    max_per_tick: u32,
}

impl EmissionScheduler {
    pub fn new(rate: f32, max_per_tick: u32) -> Result<Self> {
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(EmberError::InvalidConfig(format!(
                "emission rate must be positive, got {rate}"
            )));
        }
        if max_per_tick == 0 {
            return Err(EmberError::InvalidConfig(
                "max emissions per tick must be at least 1".into(),
            ));
        }
        Ok(Self {
            inter_arrival: 1.0 / rate as f64,
            time_since_last_emit: 0.0,
            max_per_tick,
        })
    }

    /// Seconds between consecutive emissions
    pub fn inter_arrival(&self) -> f64 {
        self.inter_arrival
    }

    /// Accumulated time not yet converted into an emission
    pub fn pending_time(&self) -> f64 {
        self.time_since_last_emit
    }

    pub fn advance(&mut self, dt: f32) -> EmissionTick {
        self.time_since_last_emit += dt.max(0.0) as f64;

        let mut tick = EmissionTick::default();
        while self.time_since_last_emit >= self.inter_arrival {
            let owed = (self.time_since_last_emit / self.inter_arrival).floor();
            let budget = self.max_per_tick - tick.count;
            if budget == 0 {
                tick.dropped += owed as u64;
                self.time_since_last_emit %= self.inter_arrival;
                break;
            }
            let emit = owed.min(budget as f64) as u32;
            tick.count += emit;
            self.time_since_last_emit -= emit as f64 * self.inter_arrival;
        }
        tick
    }
}

/// Split an emit count into dispatch-sized batches
pub fn dispatch_batches(count: u32) -> impl Iterator<Item = u32> {
    let full = count / DISPATCH_LIMIT;
    let rest = count % DISPATCH_LIMIT;
    std::iter::repeat(DISPATCH_LIMIT)
        .take(full as usize)
        .chain((rest > 0).then_some(rest))
}

/// Per-emitter emission policy: the rate scheduler plus one-shot fills and
/// queued bursts.
#[derive(Debug, Clone)]
pub struct EmissionControl {
    scheduler: EmissionScheduler,
    mode: EmissionMode,
    initial_burst: u32,
    pending_burst: u32,
    started: bool,
    emitter: String,
}

impl EmissionControl {
    pub fn from_config(config: &EmitterConfig) -> Result<Self> {
        Ok(Self {
            scheduler: EmissionScheduler::new(config.emission_rate, config.max_emit_per_tick)?,
            mode: config.emission,
            initial_burst: config.burst_count,
            pending_burst: 0,
            started: false,
            emitter: config.name.clone(),
        })
    }

    /// Queue a burst for the next tick
    pub fn queue_burst(&mut self, count: u32) {
        self.pending_burst = self.pending_burst.saturating_add(count);
    }

    /// How many spawns to attempt this tick. `capacity` sizes the one-shot fill.
    pub fn plan(&mut self, dt: f32, capacity: usize) -> EmissionTick {
        let mut tick = match self.mode {
            EmissionMode::Continuous => self.scheduler.advance(dt),
            EmissionMode::OneShot if !self.started => EmissionTick {
                count: capacity.min(u32::MAX as usize) as u32,
                dropped: 0,
            },
            EmissionMode::OneShot => EmissionTick::default(),
        };

        if !self.started {
            self.started = true;
            tick.count = tick.count.saturating_add(self.initial_burst);
        }
        tick.count = tick.count.saturating_add(std::mem::take(&mut self.pending_burst));

        if tick.dropped > 0 {
            warn!(
                emitter = %self.emitter,
                dropped = tick.dropped,
                "emission clamped to {} per tick",
                self.scheduler.max_per_tick
            );
        }
        tick
    }
}
