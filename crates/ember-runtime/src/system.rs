//! Runtime system trait

use ember_core::{Result, SpawnTransform, Vec3};

/// Everything a system needs for one tick.
///
/// Passed by argument instead of being read from ambient global state, so a
/// tick is fully determined by its input.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickInput {
    /// Seconds since the previous tick
    pub dt: f32,
    /// Seconds since the clock started
    pub total_time: f64,
    /// Where the emitters are mounted this tick
    pub emitter_transform: SpawnTransform,
    /// Camera position draw lists are sorted against
    pub view_origin: Vec3,
}

impl TickInput {
    pub fn new(dt: f32, total_time: f64) -> Self {
        Self {
            dt,
            total_time,
            emitter_transform: SpawnTransform::IDENTITY,
            view_origin: Vec3::ZERO,
        }
    }

    pub fn with_transform(mut self, transform: SpawnTransform) -> Self {
        self.emitter_transform = transform;
        self
    }

    pub fn with_view_origin(mut self, origin: Vec3) -> Self {
        self.view_origin = origin;
        self
    }
}

/// A system that can be ticked by the loop
///
/// Systems are updated in registration order, once per tick.
pub trait RuntimeSystem {
    /// Called once when the system is first registered
    fn initialize(&mut self) -> Result<()>;

    /// Called once per tick
    fn update(&mut self, input: &TickInput) -> Result<()>;

    /// Called when the system is being shut down. Must not return until all
    /// in-flight work that references system-owned storage has completed.
    fn shutdown(&mut self) -> Result<()>;

    /// Human-readable name for this system
    fn name(&self) -> &str;
}
