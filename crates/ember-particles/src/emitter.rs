//! The emitter interface shared by both allocation strategies

use crate::config::{AllocatorKind, EmitterConfig};
use crate::device::DeviceEmitter;
use crate::ring::RingEmitter;
use crate::submission::{DrawCommand, EmitterFrame};
use ember_core::{Result, SpawnTransform, Vec3};

/// Running totals for one emitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub spawned: u64,
    pub retired: u64,
    /// Spawns skipped because every slot was live
    pub dropped_exhausted: u64,
    /// Owed emissions discarded by the per-tick cap
    pub dropped_clamped: u64,
    pub live: usize,
    /// Particles in the most recent render snapshot
    pub rendered: usize,
}

/// A particle emitter.
///
/// Each tick runs in a fixed order: existing particles age and move (the
/// expired ones are retired), the render snapshot is rebuilt from the
/// survivors, then new particles are emitted. A particle spawned this tick
/// is first drawn on the next one.
pub trait ParticleEmitter {
    fn name(&self) -> &str;

    fn kind(&self) -> AllocatorKind;

    fn tick(&mut self, dt: f32, transform: &SpawnTransform);

    fn queue_burst(&mut self, count: u32);

    /// Point the draw list sort keys are measured from. Emitters that do
    /// not build a draw list ignore it.
    fn set_view_origin(&mut self, _origin: Vec3) {}

    fn live_count(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Copy the current render snapshot into per-frame storage and return
    /// the draw that consumes it.
    fn write_frame(&self, emitter: usize, out: &mut EmitterFrame) -> DrawCommand;

    fn stats(&self) -> EmitterStats;
}

/// Build the emitter variant named by `config.allocator`
pub fn build_emitter(config: EmitterConfig, seed: u32) -> Result<Box<dyn ParticleEmitter>> {
    Ok(match config.allocator {
        AllocatorKind::RingBuffer => Box::new(RingEmitter::new(config, seed)?),
        AllocatorKind::FreeList => Box::new(DeviceEmitter::new(config, seed)?),
    })
}
