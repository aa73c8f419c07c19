//! Panoptic: multi-view episode capture.
//!
//! Subcommands:
//!
//! - `capture`  -- Capture episodes for one or more tasks and write them out
//! - `views`    -- Print the canonical view order for a configuration
//! - `inspect`  -- Summarise a written episode directory

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use panoptic::config::CaptureConfig;
use panoptic::persist::layout;
use panoptic::persist::{EpisodeDocument, EpisodeWriter};
use panoptic::pipeline::{run_tasks_concurrently, CapturePipeline, TaskOutcome};
use panoptic::sim::{MockCameraFactory, MockSimulator};
use panoptic::view::{ViewPreset, ViewRegistry};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Panoptic: multi-view episode capture and serialization
#[derive(Parser)]
#[command(name = "panoptic", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Add a preset set of custom views (peract, enhanced).
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture episodes for one or more tasks with the built-in mock simulator.
    Capture {
        /// Comma-separated task names (defaults to the configured tasks).
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<String>,

        /// Episodes per task.
        #[arg(long)]
        episodes: Option<usize>,

        /// Root directory of the episode tree.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Number of tasks captured concurrently.
        #[arg(long, default_value_t = 1)]
        jobs: usize,

        /// Skip per-view video encoding.
        #[arg(long)]
        no_video: bool,

        /// Steps per mock demonstration.
        #[arg(long, default_value_t = 10)]
        steps: usize,

        /// Probability that a custom camera capture fails.
        #[arg(long, default_value_t = 0.0)]
        sensor_failure_rate: f64,

        /// Seed for the simulated sensor failures.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Print the registered views in canonical order.
    Views,

    /// Summarise a written episode directory.
    Inspect {
        /// Path to an `episode_NNN` directory.
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CaptureConfig::load(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(name) = &cli.preset {
        match ViewPreset::from_str_loose(name) {
            Some(preset) => config.preset = Some(preset),
            None => bail!("unknown view preset '{name}' (expected peract or enhanced)"),
        }
    }

    match cli.command {
        Commands::Capture {
            tasks,
            episodes,
            output,
            jobs,
            no_video,
            steps,
            sensor_failure_rate,
            seed,
        } => {
            if !tasks.is_empty() {
                config.tasks = tasks;
            }
            if let Some(episodes) = episodes {
                config.episodes_per_task = episodes;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if no_video {
                config.video.enabled = false;
            }
            let sim = MockOptions {
                steps,
                sensor_failure_rate,
                seed,
            };
            cmd_capture(config, jobs, sim).await
        }
        Commands::Views => cmd_views(&config),
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct MockOptions {
    steps: usize,
    sensor_failure_rate: f64,
    seed: u64,
}

async fn cmd_capture(config: CaptureConfig, jobs: usize, sim: MockOptions) -> Result<()> {
    let registry = config
        .build_registry()
        .context("Invalid view configuration")?;
    tracing::info!(
        tasks = config.tasks.len(),
        episodes = config.episodes_per_task,
        views = registry.len(),
        output = %config.output_dir.display(),
        "Starting capture"
    );

    let tasks = config.tasks.clone();
    let episodes = config.episodes_per_task;
    let batch = run_tasks_concurrently(tasks, jobs, move |task| {
        let simulator = MockSimulator::new(registry.builtin_views().to_vec())
            .with_steps(sim.steps)
            .with_headless(config.headless);
        let mut factory =
            MockCameraFactory::new().with_failure_rate(sim.sensor_failure_rate, sim.seed);
        let writer = EpisodeWriter::from_config(&config);
        let mut pipeline =
            CapturePipeline::setup(config.clone(), registry.clone(), simulator, &mut factory, writer)?;
        pipeline.run_task(task, episodes)
    })
    .await;

    for outcome in &batch.outcomes {
        match outcome {
            TaskOutcome::Completed(summary) => println!(
                "{}: {} saved, {} failed",
                summary.task_name,
                summary.saved.len(),
                summary.failures.len()
            ),
            TaskOutcome::Failed { task_name, reason } => {
                println!("{task_name}: FAILED ({reason})")
            }
        }
    }
    println!(
        "Total: {} episodes saved, {} failed",
        batch.episodes_saved(),
        batch.episodes_failed()
    );
    Ok(())
}

fn cmd_views(config: &CaptureConfig) -> Result<()> {
    let registry = config
        .build_registry()
        .context("Invalid view configuration")?;
    print_views(&registry);
    Ok(())
}

fn print_views(registry: &ViewRegistry) {
    println!("Views ({}):", registry.len());
    for (i, view) in registry.all_views().enumerate() {
        let kind = if registry.is_builtin(&view.name) {
            "built-in"
        } else {
            "custom"
        };
        println!(
            "  {i:>2}. {name:<24} {res:>9}  {kind}",
            name = view.name,
            res = view.resolution.to_string()
        );
    }
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let doc = EpisodeDocument::load(path.join(layout::EPISODE_FILE))?;

    println!("Episode: {}", path.display());
    println!("  Task: {} (episode {})", doc.task_name, doc.episode_index);
    println!("  Id: {}", doc.id);
    println!(
        "  Captured: {}",
        doc.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Steps: {}", doc.timestamps.len());
    println!(
        "  Snapshot: {}",
        if path.join(layout::SNAPSHOT_FILE).is_file() {
            "yes"
        } else {
            "no"
        }
    );
    println!();

    println!("Descriptions:");
    for description in &doc.descriptions {
        println!("  - {description}");
    }
    println!();

    println!("Views ({}):", doc.views.len());
    for (name, view) in &doc.views {
        let video = path
            .join(layout::VIDEO_DIR)
            .read_dir()
            .ok()
            .map(|entries| {
                entries
                    .flatten()
                    .any(|e| e.path().file_stem().is_some_and(|s| s == name.as_str()))
            })
            .unwrap_or(false);
        println!(
            "  {name:<24} frames={:<5} masks={:<3} video={}",
            view.steps.len(),
            if view.masks.is_empty() { "no" } else { "yes" },
            if video { "yes" } else { "no" }
        );
    }
    println!();

    println!("Low-dim attributes:");
    for (name, values) in &doc.low_dim {
        let width = values.first().map_or(0, Vec::len);
        println!("  {name:<24} steps={:<5} dim={width}", values.len());
    }
    Ok(())
}
