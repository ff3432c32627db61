//! Cadence CLI - headless host for the animation engine
//!
//! Loads a TOML scene, drives the engine at a fixed frame rate against an
//! in-memory sink, and prints the sampled property values.

mod sample;
mod scene;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::sample::{Format, SampleOptions};
use crate::scene::Scene;

/// Sample animation scenes without a host application
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Sample Cadence animation scenes headlessly")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scene and print property values over time
    Sample {
        /// Scene file
        scene: PathBuf,

        /// Frames per second to drive the engine at
        #[arg(long, default_value = "60")]
        fps: f64,

        /// Stop at this time (ms); defaults to when every timer is done
        #[arg(long)]
        until: Option<f64>,

        /// Print a sample every this many ms instead of every frame
        #[arg(long)]
        every: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Parse a scene and list its timers without running it
    Check {
        /// Scene file
        scene: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sample {
            scene,
            fps,
            until,
            every,
            format,
        } => {
            let engine = Scene::load(&scene)?.build()?;
            let options = SampleOptions::new(fps, until, every)?;
            let samples = sample::run(engine, &options);
            let mut stdout = std::io::stdout().lock();
            sample::write(&mut stdout, &samples, format)?;
        }
        Commands::Check { scene } => {
            let engine = Scene::load(&scene)?.build()?;
            for timer in engine.timers().filter(|t| t.parent().is_none()) {
                info!(
                    id = ?timer.id(),
                    kind = ?timer.kind(),
                    label = timer.label().unwrap_or("-"),
                    duration = timer.duration(),
                    "timer"
                );
            }
            println!("{}: ok", scene.display());
        }
    }

    Ok(())
}
