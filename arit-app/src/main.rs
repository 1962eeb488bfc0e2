mod app;
mod cli;
mod headless;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use arit_experiment::{OutputWriter, Schedule, SessionSummary, TaskConfig, ValidatedConfig};
use chrono::Local;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::Args;

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating log dir {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(env_filter)
        .init();
    if let Some(path) = log_file {
        info!(path = %path.display(), "logging initialized");
    }
    Ok(())
}

/// The config file (or defaults) with command-line overrides applied.
fn load_config(args: &Args) -> Result<TaskConfig> {
    let mut config = match &args.config {
        Some(path) => TaskConfig::load(path)?,
        None => TaskConfig::default(),
    };
    if let Some(id) = &args.participant {
        config.participant_id = id.clone();
    }
    if let Some(dir) = &args.conditions {
        config.conditions_dir = dir.clone();
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

/// Everything a run needs before the first frame.
pub struct Session {
    pub config: ValidatedConfig,
    pub schedule: Schedule,
    pub rng: StdRng,
    pub writer: OutputWriter,
    pub summary_path: PathBuf,
}

impl Session {
    /// Loads the schedule, opens the trial file and records the parameters
    /// used next to it as `<output>.config.json`.
    fn open(task: &TaskConfig, seed: Option<u64>) -> Result<Self> {
        let config = task.validate()?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let schedule = Schedule::load(&config, &mut rng)?;
        let path = OutputWriter::session_path(
            &config.output_dir,
            &config.participant_id,
            config.output_format,
            Local::now(),
        );
        let writer = OutputWriter::open(&path, config.output_format)?;
        task.save(path.with_extension("config.json"))?;
        info!(
            participant = %config.participant_id,
            method = ?config.method,
            trials = schedule.len(),
            "session ready"
        );
        Ok(Self {
            config,
            schedule,
            rng,
            writer,
            summary_path: path.with_extension("summary.json"),
        })
    }
}

pub fn finish_session(summary: &SessionSummary, path: &Path) -> Result<()> {
    summary.log();
    summary.write_json(path)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let task = load_config(&args)?;
    if let Some(path) = &args.save_config {
        task.validate()?;
        task.save(path)?;
        info!(path = %path.display(), "parameters saved");
    }
    let session = Session::open(&task, args.seed)?;

    if args.simulate {
        return headless::run(session, args.seed.unwrap_or_default(), args.realtime);
    }

    let app = App::new(session)?;
    app.run()?;

    Ok(())
}
