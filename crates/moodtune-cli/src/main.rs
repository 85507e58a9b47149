//! CLI for moodtune.
//!
//! Runs the weekly training job, the daily personality update and one-off
//! recommendation lookups against JSON files in a data directory. Results
//! are printed to stdout as JSON; logs go to stderr.

mod files;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use moodtune_core::{ContentType, Mood, PersonalityProfile, ProfileStore, TimeOfDay};
use moodtune_engine::{Engine, EngineConfig, UserSelector};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding interactions, insights, profiles, runs and the table
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Engine configuration (JSON); missing keys take defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the value table on recent interactions
    Train {
        /// Trailing window in days (default from config: 7)
        #[arg(long)]
        window_days: Option<u32>,

        /// Users with fewer interactions in the window are skipped
        #[arg(long)]
        min_interactions: Option<usize>,
    },
    /// Apply dampened insight deltas to personality profiles
    Evolve {
        #[command(flatten)]
        target: Target,

        /// Trailing window in days (default from config: 30)
        #[arg(long)]
        window_days: Option<u32>,

        /// Factor applied to summed deltas, within [0, 1]
        #[arg(long)]
        dampening: Option<f64>,
    },
    /// Print recommendation parameters for one request
    Recommend {
        #[arg(long)]
        user: String,

        #[arg(long)]
        content: ContentType,

        #[arg(long)]
        mood: Mood,

        /// Defaults to the current UTC time of day
        #[arg(long)]
        time: Option<TimeOfDay>,
    },
    /// Show value table statistics and the highest entries
    Inspect {
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Target {
    /// Update a single user
    #[arg(long)]
    user: Option<String>,

    /// Update every user with a stored profile
    #[arg(long)]
    all: bool,
}

impl Target {
    fn selector(&self) -> UserSelector {
        match &self.user {
            Some(user) => UserSelector::One(user.clone()),
            None => UserSelector::All,
        }
    }
}

#[derive(Serialize, Debug)]
struct TopEntry {
    state: String,
    action: String,
    value: f64,
}

#[derive(Serialize, Debug)]
struct Inspection {
    stats: moodtune_core::TableStats,
    runs: u64,
    updated_at: Option<String>,
    top: Vec<TopEntry>,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let file =
        File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

fn build_engine(data_dir: &Path, config: EngineConfig) -> Result<Engine> {
    Engine::new(config, files::collaborators(data_dir)).context("Failed to start engine")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn train(
    data_dir: &Path,
    config: EngineConfig,
    window_days: Option<u32>,
    min_interactions: Option<usize>,
) -> Result<()> {
    let _lock = match files::TrainLock::acquire(data_dir) {
        Ok(lock) => lock,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => bail!(
            "Another training run holds {}",
            data_dir.join(files::LOCK_FILE).display()
        ),
        Err(e) => return Err(e).context("Failed to take training lock"),
    };

    let window = window_days.unwrap_or(config.training.window_days);
    let min = min_interactions.unwrap_or(config.training.min_interactions_per_user);
    let engine = build_engine(data_dir, config)?;
    let report = engine
        .run_training(window, min)
        .context("Training run failed")?;
    tracing::info!(
        "trained on {} records from {} users",
        report.run.records_processed,
        report.run.users_processed
    );
    print_json(&report)
}

fn evolve(
    data_dir: &Path,
    mut config: EngineConfig,
    target: &Target,
    window_days: Option<u32>,
    dampening: Option<f64>,
) -> Result<()> {
    if let Some(days) = window_days {
        config.aggregation.window_days = days;
    }
    if let Some(d) = dampening {
        config.aggregation.dampening = d;
    }
    let engine = build_engine(data_dir, config)?;
    let report = engine
        .trigger_personality_update(target.selector())
        .context("Personality update failed")?;
    print_json(&report)?;

    if let (UserSelector::One(user), Some(failure)) = (target.selector(), report.run.failures.first())
    {
        bail!("Update for {} failed: {}", user, failure.reason);
    }
    Ok(())
}

fn recommend(
    data_dir: &Path,
    config: EngineConfig,
    user: &str,
    content: ContentType,
    mood: Mood,
    time: Option<TimeOfDay>,
) -> Result<()> {
    let stores = files::collaborators(data_dir);
    let profile = match stores.profiles.profile(user) {
        Ok(Some(profile)) => profile,
        Ok(None) => PersonalityProfile::default(),
        Err(e) => {
            tracing::warn!("profile lookup for {} failed, using neutral profile: {}", user, e);
            PersonalityProfile::default()
        }
    };
    let time = time.unwrap_or_else(|| TimeOfDay::from_timestamp(OffsetDateTime::now_utc()));
    let engine = Engine::new(config, stores).context("Failed to start engine")?;
    print_json(&engine.recommend(user, &profile, content, mood, time))
}

fn inspect(data_dir: &Path, config: EngineConfig, top: usize) -> Result<()> {
    let engine = build_engine(data_dir, config)?;
    let table = engine.table();
    let inspection = Inspection {
        stats: engine.table_stats(),
        runs: table.meta.runs,
        updated_at: table.meta.updated_at.clone(),
        top: table
            .top(top)
            .into_iter()
            .map(|(state, action, value)| TopEntry {
                state: state.key(),
                action: action.key(),
                value,
            })
            .collect(),
    };
    print_json(&inspection)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            window_days,
            min_interactions,
        } => train(&cli.data_dir, config, window_days, min_interactions),
        Commands::Evolve {
            target,
            window_days,
            dampening,
        } => evolve(&cli.data_dir, config, &target, window_days, dampening),
        Commands::Recommend {
            user,
            content,
            mood,
            time,
        } => recommend(&cli.data_dir, config, &user, content, mood, time),
        Commands::Inspect { top } => inspect(&cli.data_dir, config, top),
    }
}
