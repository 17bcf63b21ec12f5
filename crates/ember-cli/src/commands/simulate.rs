//! Simulate command - runs a particle scene headless against a simulated device

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{Receiver, Sender};
use ember_core::{ContentHash, EmberError, SpawnTransform, Vec3};
use ember_particles::{
    CompletionCounter, Fence, FrameSubmission, ParticleSystem, SceneConfig, SubmissionSink,
};
use ember_runtime::{GameClock, RuntimeSystem};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

pub struct SimulateArgs {
    pub config: String,
    pub ticks: u64,
    pub dt: f64,
    pub seed: u32,
    pub gpu_latency_ms: u64,
    pub orbit_radius: Option<f32>,
    pub view_origin: Vec3,
    pub burst: Vec<(String, u32)>,
}

/// Hands submitted frames to the simulated device thread
struct ChannelSink(Sender<FrameSubmission>);

impl SubmissionSink for ChannelSink {
    fn submit(&mut self, submission: FrameSubmission) -> ember_core::Result<()> {
        self.0
            .send(submission)
            .map_err(|_| EmberError::RuntimeError("simulated device stopped".into()))
    }
}

#[derive(Debug, Default)]
struct DeviceReport {
    frames: u64,
    draws: u64,
    particles_drawn: u64,
    last_digest: Option<ContentHash>,
}

/// Consume frames in submission order, signalling each one's fence value
/// after the simulated latency.
fn spawn_device(
    frames: Receiver<FrameSubmission>,
    fence: Arc<Fence>,
    latency: Duration,
) -> JoinHandle<DeviceReport> {
    thread::spawn(move || {
        let mut report = DeviceReport::default();
        for submission in frames.iter() {
            if !latency.is_zero() {
                thread::sleep(latency);
            }
            report.frames += 1;
            report.draws += submission.commands.len() as u64;
            report.particles_drawn += submission.rendered as u64;
            report.last_digest = Some(submission.digest);
            fence.signal(submission.fence_value);
        }
        report
    })
}

fn orbit(radius: f32, time: f64) -> SpawnTransform {
    let angle = time as f32;
    SpawnTransform::from_position(Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin()))
        .with_rotation(Vec3::new(0.0, -angle.to_degrees(), 0.0))
}

pub fn run(args: SimulateArgs) -> Result<()> {
    if !(args.dt > 0.0) {
        return Err(anyhow!("--dt must be positive, got {}", args.dt));
    }

    let scene = SceneConfig::load(&args.config)
        .with_context(|| format!("Failed to load scene config '{}'", args.config))?;
    let system = ParticleSystem::new(&scene, args.seed).context("Failed to build particle system")?;

    let (tx, rx) = crossbeam::channel::unbounded();
    let device = spawn_device(rx, system.fence(), Duration::from_millis(args.gpu_latency_ms));
    let mut system = system.with_sink(Box::new(ChannelSink(tx)));

    system.initialize()?;
    for (name, count) in &args.burst {
        system.queue_burst(name, *count)?;
    }

    let mut clock = GameClock::new();
    let mut peak_live = 0;
    let started = Instant::now();
    for _ in 0..args.ticks {
        clock.advance(args.dt);
        let mut input = clock.tick_input().with_view_origin(args.view_origin);
        if let Some(radius) = args.orbit_radius {
            input = input.with_transform(orbit(radius, clock.total_time));
        }
        system.update(&input).context("Tick failed")?;
        peak_live = peak_live.max(system.live_count());
    }
    system.shutdown().context("Failed to drain frames in flight")?;
    let elapsed = started.elapsed();

    println!(
        "Simulated {} tick(s), {:.2}s of game time, in {:.2?}",
        clock.tick_count,
        clock.total_time,
        elapsed
    );
    println!(
        "Frames in flight: {}, producer stalls: {}, last fence: {}",
        system.pipeline().frame_count(),
        system.pipeline().stalls(),
        system.fence().completed_value()
    );
    println!("Peak live particles: {peak_live} / {}", system.capacity());
    println!();
    println!(
        "  {:<16} {:<12} {:>13} {:>10} {:>10} {:>10} {:>10}",
        "EMITTER", "ALLOCATOR", "LIVE", "SPAWNED", "RETIRED", "EXHAUSTED", "CLAMPED"
    );
    for emitter in system.emitters() {
        let stats = emitter.stats();
        println!(
            "  {:<16} {:<12} {:>6}/{:<6} {:>10} {:>10} {:>10} {:>10}",
            emitter.name(),
            emitter.kind().as_str(),
            stats.live,
            emitter.capacity(),
            stats.spawned,
            stats.retired,
            stats.dropped_exhausted,
            stats.dropped_clamped
        );
    }

    // dropping the system closes the channel and lets the device thread finish
    drop(system);
    let report = device
        .join()
        .map_err(|_| anyhow!("Simulated device thread panicked"))?;
    info!(
        frames = report.frames,
        draws = report.draws,
        particles = report.particles_drawn,
        "simulated device finished"
    );
    println!();
    println!(
        "Device consumed {} frame(s), {} draw(s), {} particle(s)",
        report.frames, report.draws, report.particles_drawn
    );
    if let Some(digest) = report.last_digest {
        println!("Last frame digest: {digest}");
    }

    Ok(())
}
