//! Check command - parse and validate a scene config

use anyhow::{Context, Result};
use ember_particles::{EmissionMode, SceneConfig};

pub fn run(config: &str) -> Result<()> {
    let scene = SceneConfig::load(config)
        .with_context(|| format!("Failed to load scene config '{config}'"))?;

    let timeout = match scene.pipeline.wait_timeout {
        Some(t) => format!("{} ms", t.as_millis()),
        None => "none".to_string(),
    };
    println!(
        "Pipeline: {} frame(s) in flight, wait timeout {timeout}",
        scene.pipeline.frames_in_flight
    );

    for emitter in &scene.emitters {
        let emission = match emitter.emission {
            EmissionMode::Continuous => format!("{}/s", emitter.emission_rate),
            EmissionMode::OneShot => "one shot".to_string(),
        };
        // rough steady-state population for a continuous emitter
        let expected = (emitter.emission_rate * emitter.lifetime).ceil() as usize;
        println!(
            "  {}: {} x{} ({emission}, lifetime {}s)",
            emitter.name,
            emitter.allocator.as_str(),
            emitter.max_particles,
            emitter.lifetime
        );
        if emitter.emission == EmissionMode::Continuous && expected > emitter.max_particles {
            println!(
                "    note: ~{expected} particles wanted at steady state, spawns will be dropped"
            );
        }
    }

    println!("{} emitter(s) OK", scene.emitters.len());
    Ok(())
}
