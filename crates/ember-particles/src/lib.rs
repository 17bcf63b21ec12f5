//! Ember Particles - pooled particle lifecycle engine
//!
//! Provides fixed-capacity particle pools with:
//! - Ring-buffer (oldest-first) and free-list slot allocation
//! - Rate-driven emission with fractional carry and a per-tick clamp
//! - Closed-form motion with size/color over lifetime
//! - Render snapshots copied into frames in flight, gated by a fence

pub mod allocator;
pub mod config;
pub mod curves;
pub mod device;
pub mod emission;
pub mod emitter;
pub mod frame;
pub mod pool;
pub mod rand;
pub mod ring;
pub mod simulate;
pub mod submission;
pub mod view;

use ember_core::{EmberError, Result};
use ember_runtime::{RuntimeSystem, TickInput};
use std::sync::Arc;
use tracing::{debug, info};

pub use allocator::{FreeListAllocator, RingAllocator, SharedFreeList, SlotAllocator};
pub use config::{AllocatorKind, EmissionMode, EmitterConfig, PipelineConfig, SceneConfig};
pub use emitter::{build_emitter, EmitterStats, ParticleEmitter};
pub use frame::{CompletionCounter, Fence, FramePipeline, FrameState};
pub use pool::{ParticleRecord, SlotId, SlotPool};
pub use submission::{DrawCommand, FrameSubmission, ParticleFrame, PassConstants};
pub use view::{DrawIndirectArgs, DrawListEntry, QuadVertex};

/// Receives each submitted frame. Whoever consumes the frame must signal
/// `fence_value` on the system's fence once it no longer reads it.
pub trait SubmissionSink {
    fn submit(&mut self, submission: FrameSubmission) -> Result<()>;
}

/// Sink for a consumer that finishes every frame before the next tick
pub struct ImmediateCompletion {
    fence: Arc<Fence>,
}

impl ImmediateCompletion {
    pub fn new(fence: Arc<Fence>) -> Self {
        Self { fence }
    }
}

impl SubmissionSink for ImmediateCompletion {
    fn submit(&mut self, submission: FrameSubmission) -> Result<()> {
        self.fence.signal(submission.fence_value);
        Ok(())
    }
}

/// The particle system. Implements RuntimeSystem for integration with the game loop.
pub struct ParticleSystem {
    emitters: Vec<Box<dyn ParticleEmitter>>,
    pipeline: FramePipeline<ParticleFrame>,
    fence: Arc<Fence>,
    sink: Box<dyn SubmissionSink>,
}

impl ParticleSystem {
    /// Build every emitter in the scene. Emitter `i` is seeded with
    /// `seed + i` so runs are reproducible.
    pub fn new(scene: &SceneConfig, seed: u32) -> Result<Self> {
        scene.pipeline.validate()?;
        let emitters = scene
            .emitters
            .iter()
            .enumerate()
            .map(|(i, config)| build_emitter(config.clone(), seed.wrapping_add(i as u32)))
            .collect::<Result<Vec<_>>>()?;

        let layout: Vec<_> = emitters.iter().map(|e| (e.kind(), e.capacity())).collect();
        let fence = Arc::new(Fence::new());
        let pipeline = FramePipeline::new(
            scene.pipeline.frames_in_flight,
            fence.clone(),
            scene.pipeline.wait_timeout,
            |_| ParticleFrame::new(&layout),
        )?;

        Ok(Self {
            emitters,
            pipeline,
            sink: Box::new(ImmediateCompletion::new(fence.clone())),
            fence,
        })
    }

    /// Replace the consumer frames are handed to
    pub fn with_sink(mut self, sink: Box<dyn SubmissionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Completion handle the consumer signals
    pub fn fence(&self) -> Arc<Fence> {
        self.fence.clone()
    }

    pub fn emitters(&self) -> &[Box<dyn ParticleEmitter>] {
        &self.emitters
    }

    /// Queue a burst on the named emitter for the next tick
    pub fn queue_burst(&mut self, emitter: &str, count: u32) -> Result<()> {
        let target = self
            .emitters
            .iter_mut()
            .find(|e| e.name() == emitter)
            .ok_or_else(|| EmberError::RuntimeError(format!("no emitter named '{emitter}'")))?;
        target.queue_burst(count);
        Ok(())
    }

    pub fn pipeline(&self) -> &FramePipeline<ParticleFrame> {
        &self.pipeline
    }

    /// Storage of one frame in flight, as the consumer reads it
    pub fn frame(&self, index: usize) -> &ParticleFrame {
        &self.pipeline.set(index).resources
    }

    pub fn live_count(&self) -> usize {
        self.emitters.iter().map(|e| e.live_count()).sum()
    }

    pub fn capacity(&self) -> usize {
        self.emitters.iter().map(|e| e.capacity()).sum()
    }
}

impl RuntimeSystem for ParticleSystem {
    fn initialize(&mut self) -> Result<()> {
        info!(
            emitters = self.emitters.len(),
            capacity = self.capacity(),
            frames_in_flight = self.pipeline.frame_count(),
            "particle system initialized"
        );
        Ok(())
    }

    fn update(&mut self, input: &TickInput) -> Result<()> {
        // blocks until the consumer is done with this set's previous frame
        let set = self.pipeline.begin_frame()?;
        let frame_index = set.index();
        let frame = &mut set.resources;
        frame.reset();

        let transform = input.emitter_transform;
        for (i, emitter) in self.emitters.iter_mut().enumerate() {
            emitter.set_view_origin(input.view_origin);
            emitter.tick(input.dt, &transform);
            let command = emitter.write_frame(i, &mut frame.emitters[i]);
            frame.commands.record(command);
        }
        frame.constants = PassConstants {
            emitter_position: transform.position.to_array(),
            time: input.total_time as f32,
            delta_time: input.dt,
            frame_index: frame_index as u32,
            _pad: [0; 2],
        };

        let submission = FrameSubmission {
            frame_index,
            fence_value: 0,
            constants: frame.constants,
            commands: frame.commands.commands().to_vec(),
            rendered: frame.rendered(),
            digest: frame.digest(),
        };
        let fence_value = self.pipeline.submit();
        debug!(frame = frame_index, fence = fence_value, rendered = submission.rendered, "frame submitted");
        self.sink.submit(FrameSubmission {
            fence_value,
            ..submission
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        self.pipeline.drain()?;
        for emitter in &self.emitters {
            let stats = emitter.stats();
            info!(
                emitter = emitter.name(),
                spawned = stats.spawned,
                retired = stats.retired,
                dropped = stats.dropped_exhausted + stats.dropped_clamped,
                "emitter shut down"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "particles"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{SpawnTransform, Vec3};
    use std::sync::Mutex;
    use std::time::Duration;

    const SCENE: &str = r#"
[pipeline]
frames_in_flight = 3
wait_timeout_ms = 50

[[emitter]]
name = "ring"
allocator = "ring_buffer"
max_particles = 4
emission_rate = 2.0
lifetime = 1.0
velocity_jitter = [0, 0, 0]

[[emitter]]
name = "list"
max_particles = 4
emission_rate = 2.0
lifetime = 1.0
"#;

    /// Records submissions without ever signalling the fence
    struct Stalled(Arc<Mutex<Vec<FrameSubmission>>>);

    impl SubmissionSink for Stalled {
        fn submit(&mut self, submission: FrameSubmission) -> Result<()> {
            self.0.lock().unwrap().push(submission);
            Ok(())
        }
    }

    fn system() -> ParticleSystem {
        ParticleSystem::new(&SceneConfig::from_toml_str(SCENE).unwrap(), 1).unwrap()
    }

    #[test]
    fn both_variants_follow_the_same_schedule() {
        let mut sys = system();
        sys.initialize().unwrap();
        let input = TickInput::new(0.5, 0.0);
        let mut live = Vec::new();
        for _ in 0..3 {
            sys.update(&input).unwrap();
            live.push(sys.emitters().iter().map(|e| e.live_count()).collect::<Vec<_>>());
        }
        assert_eq!(live, vec![vec![1, 1], vec![2, 2], vec![2, 2]]);
        sys.shutdown().unwrap();
    }

    #[test]
    fn submissions_carry_increasing_fences() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fence;
        let mut sys = {
            let s = system();
            fence = s.fence();
            s.with_sink(Box::new(Stalled(log.clone())))
        };
        for _ in 0..3 {
            sys.update(&TickInput::new(0.5, 0.0)).unwrap();
        }
        let fences: Vec<u64> = log.lock().unwrap().iter().map(|s| s.fence_value).collect();
        assert_eq!(fences, vec![1, 2, 3]);
        let frames: Vec<usize> = log.lock().unwrap().iter().map(|s| s.frame_index).collect();
        assert_eq!(frames, vec![0, 1, 2]);

        // every set is in flight and nobody signals: the fourth tick times out
        let err = sys.update(&TickInput::new(0.5, 0.0)).unwrap_err();
        assert!(matches!(err, EmberError::FrameTimeout { fence_value: 1, .. }));

        fence.signal(3);
        sys.update(&TickInput::new(0.5, 0.0)).unwrap();
        assert_eq!(sys.pipeline().stalls(), 1);
    }

    #[test]
    fn frame_records_one_draw_per_emitter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fence;
        let mut sys = {
            let s = system();
            fence = s.fence();
            s.with_sink(Box::new(Stalled(log.clone())))
        };
        let input = TickInput::new(0.5, 1.0)
            .with_transform(SpawnTransform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        sys.update(&input).unwrap();
        sys.update(&input).unwrap();
        fence.signal(2);

        let last = log.lock().unwrap().last().cloned().unwrap();
        assert_eq!(
            last.commands,
            vec![
                DrawCommand::Indexed {
                    emitter: 0,
                    index_count: 6
                },
                DrawCommand::Indirect {
                    emitter: 1,
                    args: DrawIndirectArgs::instanced_quads(1)
                },
            ]
        );
        assert_eq!(last.rendered, 2);
        assert_eq!(last.constants.emitter_position, [1.0, 0.0, 0.0]);
        sys.shutdown().unwrap();
    }

    #[test]
    fn shutdown_drains_in_flight_frames() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fence;
        let mut sys = {
            let s = system();
            fence = s.fence();
            s.with_sink(Box::new(Stalled(log.clone())))
        };
        sys.update(&TickInput::new(0.1, 0.0)).unwrap();
        sys.update(&TickInput::new(0.1, 0.0)).unwrap();

        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            fence.signal(2);
        });
        sys.shutdown().unwrap();
        consumer.join().unwrap();
        assert_eq!(sys.pipeline().state_of(0), FrameState::Idle);
    }

    #[test]
    fn in_flight_frames_are_never_overwritten() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fence;
        let mut sys = {
            let s = system();
            fence = s.fence();
            s.with_sink(Box::new(Stalled(log.clone())))
        };
        let input = TickInput::new(0.25, 0.0);
        for _ in 0..3 {
            sys.update(&input).unwrap();
        }

        // the consumer finishes frame 0 only; the next tick reuses set 0
        fence.signal(1);
        sys.update(&input).unwrap();

        let submitted = log.lock().unwrap().clone();
        assert_eq!(submitted.len(), 4);
        assert_eq!(submitted[3].frame_index, 0);
        assert_ne!(submitted[3].digest, submitted[0].digest);
        for s in &submitted[1..] {
            assert_eq!(sys.frame(s.frame_index).digest(), s.digest, "set {} changed in flight", s.frame_index);
        }
    }

    #[test]
    fn view_origin_reaches_the_draw_list() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sys = system().with_sink(Box::new(Stalled(log.clone())));
        let input = TickInput::new(0.5, 0.0).with_view_origin(Vec3::new(0.0, 0.0, -100.0));
        sys.update(&input).unwrap();
        sys.update(&input).unwrap();

        let frame = sys.frame(1);
        assert_eq!(frame.emitters[1].draw_list.len(), 1);
        assert!(frame.emitters[1].draw_list[0].sort_key > 9000.0);
    }

    #[test]
    fn bursts_target_one_emitter() {
        let mut sys = system();
        sys.queue_burst("list", 3).unwrap();
        assert!(sys.queue_burst("missing", 1).is_err());
        sys.update(&TickInput::new(0.5, 0.0)).unwrap();
        let live: Vec<_> = sys.emitters().iter().map(|e| e.live_count()).collect();
        assert_eq!(live, vec![1, 4]);
    }

    #[test]
    fn invalid_pipeline_rejected() {
        let mut scene = SceneConfig::from_toml_str(SCENE).unwrap();
        scene.pipeline.frames_in_flight = 0;
        assert!(ParticleSystem::new(&scene, 1).is_err());
    }
}
