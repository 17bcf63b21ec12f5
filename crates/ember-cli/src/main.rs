//! Ember CLI - Command-line interface for the Ember particle engine

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, simulate};
use ember_core::Vec3;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Headless driver for the Ember particle lifecycle engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a particle scene headless against a simulated device
    Simulate {
        /// Path to scene config (TOML)
        config: String,

        /// Number of ticks to run
        #[arg(long, default_value = "600")]
        ticks: u64,

        /// Fixed tick length in seconds
        #[arg(long, default_value = "0.016666668")]
        dt: f64,

        /// Base RNG seed
        #[arg(long, default_value = "1")]
        seed: u32,

        /// How long the simulated device takes per frame
        #[arg(long, default_value = "0")]
        gpu_latency_ms: u64,

        /// Move the emitter around a circle of this radius
        #[arg(long)]
        orbit_radius: Option<f32>,

        /// Camera position draw lists are sorted against (X,Y,Z)
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,0")]
        view_origin: Vec3,

        /// Queue a burst on the first tick (EMITTER=COUNT, repeatable)
        #[arg(long, value_parser = parse_burst)]
        burst: Vec<(String, u32)>,
    },

    /// Parse and validate a scene config
    Check {
        /// Path to scene config (TOML)
        config: String,
    },
}

fn parse_burst(s: &str) -> Result<(String, u32), String> {
    let (name, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected EMITTER=COUNT, got '{s}'"))?;
    let count: u32 = count
        .trim()
        .parse()
        .map_err(|e| format!("invalid burst count: {e}"))?;
    Ok((name.trim().to_string(), count))
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match parts.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected X,Y,Z, got '{s}'")),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate {
            config,
            ticks,
            dt,
            seed,
            gpu_latency_ms,
            orbit_radius,
            view_origin,
            burst,
        } => simulate::run(simulate::SimulateArgs {
            config,
            ticks,
            dt,
            seed,
            gpu_latency_ms,
            orbit_radius,
            view_origin,
            burst,
        }),
        Commands::Check { config } => check::run(&config),
    }
}
