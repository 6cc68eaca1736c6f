use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkie_lib::{position::Position, walk::WalkSummary};
use walkie_tracker::{
    WalkTracker,
    clock::ManualClock,
    config::TrackerConfig,
    persistence::{HttpWalkApi, WalkPersistence},
    session::{SampleOutcome, WalkSession},
};

use crate::{dry_run::DryRunPersistence, replay::GpxReplaySource};

mod dry_run;
mod gpx_util;
mod replay;

#[derive(Parser)]
#[command(name = "walkie")]
#[command(about = "Replay recorded GPX tracks as pet walks", long_about = None)]
struct Cli {
    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a pet along a GPX track, submitting the result to the backend
    Replay {
        gpx_file: PathBuf,
        #[arg(long)]
        pet: i64,
        /// `key = value` tracker config, overridden by WALKIE_* variables
        #[arg(long)]
        config: Option<PathBuf>,
        /// Log the backend calls instead of sending them
        #[arg(long)]
        dry_run: bool,
        /// Write the recorded route to this GPX file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Real time to wait between points
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
    /// Print distance, duration and calories of a GPX track
    Inspect {
        gpx_file: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Replay {
            gpx_file,
            pet,
            config,
            dry_run,
            export,
            interval_ms,
        } => {
            let config = load_config(config.as_deref())?;
            let track = read_track(&gpx_file)?;
            let name = track_name(&gpx_file);

            let summary = if dry_run {
                replay_track(config, track, DryRunPersistence::default(), pet, interval_ms).await?
            } else {
                let api = HttpWalkApi::new(&config)?;
                replay_track(config, track, api, pet, interval_ms).await?
            };

            print_summary(&summary);

            if let Some(path) = export {
                let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
                gpx_util::write_track(&summary.route, &name, BufWriter::new(file))?;
                tracing::info!("Exported route to {}", path.display());
            }
        }
        Commands::Inspect { gpx_file, config } => {
            let config = load_config(config.as_deref())?;
            let track = read_track(&gpx_file)?;
            inspect(&config, &track)?;
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?,
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace,walkie_tracker=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file.map(|file| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file)))
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    let config = match path {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    Ok(config.with_env()?)
}

fn read_track(path: &Path) -> anyhow::Result<Vec<Position>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let track = gpx_util::read_track(BufReader::new(file))?;
    tracing::debug!("Read {} points from {}", track.len(), path.display());
    Ok(track)
}

fn track_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Walk".to_string())
}

async fn replay_track<P: WalkPersistence>(
    config: TrackerConfig,
    track: Vec<Position>,
    persistence: P,
    pet_id: i64,
    interval_ms: u64,
) -> anyhow::Result<WalkSummary> {
    let clock = ManualClock::new(track[0].timestamp);
    let source = GpxReplaySource::new(track, clock.clone(), Duration::from_millis(interval_ms));
    let completion = source.completion();

    let tracker = WalkTracker::with_clock(config, source, persistence, Arc::new(clock));
    let (handle, task) = tracker.spawn();

    let summary = replay::run_replay(&handle, completion, pet_id).await;
    handle.shutdown().await?;
    task.await.context("tracker task panicked")?;
    summary
}

/// Runs the track through a bare session, without a backend or any timing.
fn inspect(config: &TrackerConfig, track: &[Position]) -> anyhow::Result<()> {
    let mut session = WalkSession::from_config(config);
    session.begin(track[0].timestamp)?;
    let mut ignored = 0;
    for position in track {
        if let SampleOutcome::Noise { .. } = session.record_sample(*position) {
            ignored += 1;
        }
    }

    let end = track[track.len() - 1].timestamp;
    let stats = session.summary(end)?;
    println!("Points:   {} ({} within noise threshold)", track.len(), ignored);
    println!("Distance: {} m", stats.distance_meters);
    println!("Duration: {}", stats.format_duration());
    println!("Calories: {} kcal", stats.calories);
    Ok(())
}

fn print_summary(summary: &WalkSummary) {
    println!("Walk {} for pet {} saved", summary.walk_id, summary.pet_id);
    println!("Distance: {} m", summary.stats.distance_meters);
    println!("Duration: {}", summary.stats.format_duration());
    println!("Calories: {} kcal", summary.stats.calories);
    println!("Route:    {} points", summary.route.len());
}
