//! Free-list emitter driven by batched compute passes
//!
//! The host decides what to run each tick and records it as a batch of
//! passes (update, write draw args, then one emit per dispatch-sized
//! batch). Executing the batch touches only the device-resident buffers:
//! the pool, the dead list, the live id list, the draw list and the draw
//! args. Slots are released in any order, so lifetimes may vary per
//! particle.

use crate::allocator::{FreeListAllocator, SlotAllocator};
use crate::config::{AllocatorKind, EmitterConfig};
use crate::emission::{dispatch_batches, EmissionControl};
use crate::emitter::{EmitterStats, ParticleEmitter};
use crate::pool::{SlotId, SlotPool};
use crate::rand::ParticleRng;
use crate::simulate::{roll_spawn, Kinematics, Step};
use crate::submission::{DrawCommand, EmitterFrame};
use crate::view::{DrawIndirectArgs, DrawListEntry, ParticleInstance};
use bytemuck::{Pod, Zeroable};
use ember_core::{Result, SpawnTransform, Vec3};
use tracing::debug;

/// Uniforms for one emit dispatch. 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EmitParams {
    pub num_emitted: u32,
    pub emitter_position: [f32; 3],
    pub emitter_rotation: [f32; 3],
    pub _pad: u32,
}

impl EmitParams {
    fn transform(&self) -> SpawnTransform {
        SpawnTransform::from_position(Vec3::from_array(self.emitter_position))
            .with_rotation(Vec3::from_array(self.emitter_rotation))
    }
}

/// One recorded compute pass
#[derive(Debug, Clone, PartialEq)]
pub enum ComputePass {
    /// Age live particles, retire the expired ones, list the survivors
    Update {
        dt: f32,
        transform: SpawnTransform,
    },
    /// Publish the draw list length as indirect draw args
    WriteDrawArgs,
    Emit(EmitParams),
}

/// Device-resident state of one emitter
pub struct ParticleBuffers {
    pool: SlotPool,
    dead_list: FreeListAllocator,
    live: Vec<SlotId>,
    draw_list: Vec<DrawListEntry>,
    draw_args: DrawIndirectArgs,
}

impl ParticleBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            pool: SlotPool::new(capacity),
            dead_list: FreeListAllocator::new(capacity),
            live: Vec::with_capacity(capacity),
            draw_list: Vec::with_capacity(capacity),
            draw_args: DrawIndirectArgs::default(),
        }
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn dead_list(&self) -> &FreeListAllocator {
        &self.dead_list
    }

    pub fn live_ids(&self) -> &[SlotId] {
        &self.live
    }

    pub fn draw_list(&self) -> &[DrawListEntry] {
        &self.draw_list
    }

    pub fn draw_args(&self) -> DrawIndirectArgs {
        self.draw_args
    }
}

pub struct DeviceEmitter {
    config: EmitterConfig,
    kinematics: Kinematics,
    emission: EmissionControl,
    rng: ParticleRng,
    buffers: ParticleBuffers,
    passes: Vec<ComputePass>,
    view_origin: Vec3,
    stats: EmitterStats,
}

impl DeviceEmitter {
    pub fn new(config: EmitterConfig, seed: u32) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kinematics: Kinematics::from_config(&config),
            emission: EmissionControl::from_config(&config)?,
            rng: ParticleRng::new(seed),
            buffers: ParticleBuffers::new(config.max_particles),
            passes: Vec::new(),
            view_origin: Vec3::ZERO,
            stats: EmitterStats::default(),
            config,
        })
    }

    pub fn buffers(&self) -> &ParticleBuffers {
        &self.buffers
    }

    /// Decide this tick's work and record it as a pass batch, without
    /// running anything.
    pub fn record(&mut self, dt: f32, transform: &SpawnTransform) -> &[ComputePass] {
        self.passes.clear();
        self.passes.push(ComputePass::Update {
            dt,
            transform: *transform,
        });
        self.passes.push(ComputePass::WriteDrawArgs);

        let plan = self.emission.plan(dt, self.buffers.pool.capacity());
        self.stats.dropped_clamped += plan.dropped;
        for num_emitted in dispatch_batches(plan.count) {
            self.passes.push(ComputePass::Emit(EmitParams {
                num_emitted,
                emitter_position: transform.position.to_array(),
                emitter_rotation: transform.rotation.to_array(),
                _pad: 0,
            }));
        }
        &self.passes
    }

    /// Run the recorded batch in order, then clear it
    pub fn execute(&mut self) {
        let mut passes = std::mem::take(&mut self.passes);
        for pass in &passes {
            match pass {
                ComputePass::Update { dt, transform } => self.run_update(*dt, transform),
                ComputePass::WriteDrawArgs => self.run_write_draw_args(),
                ComputePass::Emit(params) => self.run_emit(params),
            }
        }
        passes.clear();
        self.passes = passes;
    }

    fn run_update(&mut self, dt: f32, transform: &SpawnTransform) {
        let buffers = &mut self.buffers;
        buffers.draw_list.clear();

        let mut i = 0;
        while i < buffers.live.len() {
            let id = buffers.live[i];
            match self.kinematics.step(buffers.pool.get_mut(id), dt, transform) {
                Step::Expired => {
                    buffers.pool.retire(id);
                    buffers.dead_list.release(id);
                    // the swapped-in id still needs stepping, so don't advance
                    buffers.live.swap_remove(i);
                    self.stats.retired += 1;
                }
                Step::Survived => {
                    let position = buffers.pool.get(id).position;
                    buffers
                        .draw_list
                        .push(DrawListEntry::new(id, position, self.view_origin));
                    i += 1;
                }
            }
        }
    }

    fn run_write_draw_args(&mut self) {
        let count = self.buffers.draw_list.len() as u32;
        self.buffers.draw_args = DrawIndirectArgs::instanced_quads(count);
        self.stats.rendered = count as usize;
    }

    fn run_emit(&mut self, params: &EmitParams) {
        let transform = params.transform();
        for i in 0..params.num_emitted {
            let Some(id) = self.buffers.dead_list.try_claim() else {
                let skipped = (params.num_emitted - i) as u64;
                self.stats.dropped_exhausted += skipped;
                debug!(emitter = %self.config.name, skipped, "dead list empty, spawns skipped");
                break;
            };
            self.buffers
                .pool
                .spawn(id, roll_spawn(&self.config, &transform, &mut self.rng));
            self.buffers.live.push(id);
            self.stats.spawned += 1;
        }
    }
}

impl ParticleEmitter for DeviceEmitter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::FreeList
    }

    fn tick(&mut self, dt: f32, transform: &SpawnTransform) {
        self.record(dt, transform);
        self.execute();
        self.stats.live = self.buffers.live.len();
    }

    fn queue_burst(&mut self, count: u32) {
        self.emission.queue_burst(count);
    }

    fn set_view_origin(&mut self, origin: Vec3) {
        self.view_origin = origin;
    }

    fn live_count(&self) -> usize {
        self.buffers.live.len()
    }

    fn capacity(&self) -> usize {
        self.buffers.pool.capacity()
    }

    fn write_frame(&self, emitter: usize, out: &mut EmitterFrame) -> DrawCommand {
        out.draw_list.clear();
        out.draw_list.extend_from_slice(&self.buffers.draw_list);
        out.instances.clear();
        out.instances.extend(
            self.buffers
                .draw_list
                .iter()
                .map(|entry| ParticleInstance::from_record(self.buffers.pool.get(entry.slot))),
        );
        out.draw_args = self.buffers.draw_args;
        DrawCommand::Indirect {
            emitter,
            args: out.draw_args,
        }
    }

    fn stats(&self) -> EmitterStats {
        self.stats
    }
}
