//! Ring-buffer emitter: host-simulated, oldest-first recycling
//!
//! Live particles occupy one cyclic range of the pool. Because every
//! particle shares the same lifetime, the oldest one always expires first,
//! so retiring from the front of the range is enough. Survivors are mirrored
//! into a compact quad vertex buffer in cyclic order each tick.

use crate::allocator::{RingAllocator, SlotAllocator};
use crate::config::{AllocatorKind, EmitterConfig};
use crate::emission::EmissionControl;
use crate::emitter::{EmitterStats, ParticleEmitter};
use crate::pool::SlotPool;
use crate::rand::ParticleRng;
use crate::simulate::{roll_spawn, Kinematics, Step};
use crate::submission::{DrawCommand, EmitterFrame};
use crate::view::{quad_indices, QuadVertex, INDICES_PER_PARTICLE, VERTICES_PER_PARTICLE};
use ember_core::{EmberError, Result, SpawnTransform};
use tracing::debug;

pub struct RingEmitter {
    config: EmitterConfig,
    kinematics: Kinematics,
    pool: SlotPool,
    allocator: RingAllocator,
    emission: EmissionControl,
    rng: ParticleRng,
    vertices: Vec<QuadVertex>,
    indices: Vec<u32>,
    mirrored: usize,
    stats: EmitterStats,
}

impl RingEmitter {
    pub fn new(config: EmitterConfig, seed: u32) -> Result<Self> {
        config.validate()?;
        if config.lifetime_jitter > 0.0 {
            return Err(EmberError::InvalidConfig(format!(
                "emitter '{}': ring buffer emitters need a uniform lifetime",
                config.name
            )));
        }
        let capacity = config.max_particles;
        Ok(Self {
            kinematics: Kinematics::from_config(&config),
            pool: SlotPool::new(capacity),
            allocator: RingAllocator::new(capacity),
            emission: EmissionControl::from_config(&config)?,
            rng: ParticleRng::new(seed),
            vertices: vec![QuadVertex::default(); capacity * VERTICES_PER_PARTICLE],
            indices: quad_indices(capacity),
            mirrored: 0,
            stats: EmitterStats::default(),
            config,
        })
    }

    pub fn allocator(&self) -> &RingAllocator {
        &self.allocator
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Vertices of the survivors mirrored by the last tick, oldest first
    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices[..self.mirrored * VERTICES_PER_PARTICLE]
    }

    /// Static index buffer sized for the whole pool
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Indices consumed by the current snapshot
    pub fn index_count(&self) -> u32 {
        (self.mirrored * INDICES_PER_PARTICLE) as u32
    }

    fn simulate(&mut self, dt: f32, transform: &SpawnTransform) {
        let (front, back) = self.allocator.alive_ranges();
        for id in front.chain(back) {
            let step = self.kinematics.step(self.pool.get_mut(id), dt, transform);
            if step == Step::Expired {
                self.pool.retire(id);
                self.allocator.release(id);
                self.stats.retired += 1;
            }
        }
    }

    fn rebuild_view(&mut self) {
        let mut written = 0;
        for id in self.allocator.iter_alive() {
            let at = written * VERTICES_PER_PARTICLE;
            self.vertices[at..at + VERTICES_PER_PARTICLE]
                .copy_from_slice(&QuadVertex::quad(self.pool.get(id)));
            written += 1;
        }
        self.mirrored = written;
        self.stats.rendered = written;
    }

    fn emit(&mut self, dt: f32, transform: &SpawnTransform) {
        let plan = self.emission.plan(dt, self.allocator.capacity());
        self.stats.dropped_clamped += plan.dropped;

        for i in 0..plan.count {
            let Some(id) = self.allocator.try_claim() else {
                let skipped = (plan.count - i) as u64;
                self.stats.dropped_exhausted += skipped;
                debug!(emitter = %self.config.name, skipped, "ring full, spawns skipped");
                break;
            };
            self.pool
                .spawn(id, roll_spawn(&self.config, transform, &mut self.rng));
            self.stats.spawned += 1;
        }
    }
}

impl ParticleEmitter for RingEmitter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::RingBuffer
    }

    fn tick(&mut self, dt: f32, transform: &SpawnTransform) {
        self.simulate(dt, transform);
        self.rebuild_view();
        self.emit(dt, transform);
        self.stats.live = self.allocator.live_count();
    }

    fn queue_burst(&mut self, count: u32) {
        self.emission.queue_burst(count);
    }

    fn live_count(&self) -> usize {
        self.allocator.live_count()
    }

    fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    fn write_frame(&self, emitter: usize, out: &mut EmitterFrame) -> DrawCommand {
        out.vertices.clear();
        out.vertices.extend_from_slice(self.vertices());
        out.index_count = self.index_count();
        DrawCommand::Indexed {
            emitter,
            index_count: out.index_count,
        }
    }

    fn stats(&self) -> EmitterStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::Vec3;

    fn config(capacity: usize, rate: f32, lifetime: f32) -> EmitterConfig {
        EmitterConfig {
            name: "ring".into(),
            allocator: AllocatorKind::RingBuffer,
            max_particles: capacity,
            emission_rate: rate,
            lifetime,
            velocity_jitter: Vec3::ZERO,
            ..Default::default()
        }
    }

    fn ages(emitter: &RingEmitter) -> Vec<f32> {
        emitter
            .allocator()
            .iter_alive()
            .map(|id| emitter.pool().get(id).age)
            .collect()
    }

    #[test]
    fn steady_state_scenario() {
        let mut e = RingEmitter::new(config(4, 2.0, 1.0), 1).unwrap();
        let t = SpawnTransform::IDENTITY;

        e.tick(0.5, &t);
        assert_eq!(e.live_count(), 1);
        assert_eq!(e.index_count(), 0);

        e.tick(0.5, &t);
        assert_eq!(e.live_count(), 2);
        assert_eq!(ages(&e), vec![0.5, 0.0]);
        assert_eq!(e.index_count(), 6);

        e.tick(0.5, &t);
        // the first particle reached age 1.0 and was retired
        assert_eq!(e.live_count(), 2);
        assert_eq!(ages(&e), vec![0.5, 0.0]);
        assert_eq!(e.stats().retired, 1);
        assert_eq!(e.allocator().first_alive(), Some(1));
    }

    #[test]
    fn exhausted_ring_skips_spawns() {
        let mut e = RingEmitter::new(config(3, 10.0, 100.0), 1).unwrap();
        e.tick(1.0, &SpawnTransform::IDENTITY);
        assert_eq!(e.live_count(), 3);
        assert_eq!(e.stats().dropped_exhausted, 7);
        assert_eq!(e.stats().spawned, 3);
    }

    #[test]
    fn short_lifetime_never_renders() {
        let mut e = RingEmitter::new(config(4, 2.0, 0.25), 1).unwrap();
        let t = SpawnTransform::IDENTITY;
        for _ in 0..6 {
            e.tick(0.5, &t);
            assert_eq!(e.index_count(), 0);
        }
        assert_eq!(e.stats().spawned, e.stats().retired + e.live_count() as u64);
    }

    #[test]
    fn wraparound_keeps_cyclic_order() {
        let mut e = RingEmitter::new(config(3, 1.0, 2.5), 1).unwrap();
        let t = SpawnTransform::IDENTITY;
        for _ in 0..7 {
            e.tick(1.0, &t);
            let a = ages(&e);
            assert!(a.windows(2).all(|w| w[0] >= w[1]), "ages not oldest-first: {a:?}");
            assert!(e.live_count() <= 3);
        }
        assert!(e.stats().retired > 0);
    }

    #[test]
    fn snapshot_mirrors_survivors_in_order() {
        let mut cfg = config(4, 1.0, 10.0);
        cfg.velocity = Vec3::new(1.0, 0.0, 0.0);
        cfg.acceleration = Vec3::ZERO;
        let mut e = RingEmitter::new(cfg, 1).unwrap();
        for _ in 0..3 {
            e.tick(1.0, &SpawnTransform::IDENTITY);
        }
        // two survivors were mirrored before the third spawn
        let v = e.vertices();
        assert_eq!(v.len(), 8);
        assert!(v[0].position[0] > v[4].position[0]);

        let mut out = EmitterFrame::default();
        let cmd = e.write_frame(0, &mut out);
        assert_eq!(cmd, DrawCommand::Indexed { emitter: 0, index_count: 12 });
        assert_eq!(out.vertices.len(), 8);
        assert_eq!(e.indices().len(), 4 * INDICES_PER_PARTICLE);
    }

    #[test]
    fn survives_just_short_of_lifetime() {
        // power-of-two epsilon keeps every age exact
        const EPS: f32 = 1.0 / 1024.0;
        let mut cfg = config(2, 10.0, 1.0);
        cfg.emission = crate::config::EmissionMode::OneShot;
        let mut e = RingEmitter::new(cfg, 1).unwrap();
        let t = SpawnTransform::IDENTITY;

        e.tick(0.0, &t);
        assert_eq!(e.live_count(), 2);
        e.tick(1.0 - EPS, &t);
        assert_eq!(e.vertices().len(), 2 * VERTICES_PER_PARTICLE);

        e.tick(EPS / 2.0, &t);
        assert_eq!(e.live_count(), 2);
        assert_eq!(ages(&e), vec![1.0 - EPS / 2.0; 2]);
        assert_eq!(e.vertices().len(), 2 * VERTICES_PER_PARTICLE);
        assert_eq!(e.index_count(), 12);

        e.tick(EPS, &t);
        assert_eq!(e.live_count(), 0);
        assert!(e.vertices().is_empty());
        assert_eq!(e.index_count(), 0);
        assert_eq!(e.stats().retired, 2);
    }

    #[test]
    fn rejects_lifetime_jitter() {
        let mut cfg = config(4, 1.0, 1.0);
        cfg.allocator = AllocatorKind::FreeList;
        cfg.lifetime_jitter = 0.1;
        assert!(RingEmitter::new(cfg, 1).is_err());
    }
}
