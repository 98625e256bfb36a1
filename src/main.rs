//! Entry point for `geocom_daq`.
//!
//! Loads the settings, opens the serial link, initializes the instrument,
//! collects the aims (setup file or interactive entry) and runs the sets until
//! they are done or Ctrl-C is pressed. Ctrl-C during setup also sends the
//! instrument home and uploads the day's files.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use geocom_daq::adapters::{SerialConnector, Transport};
use geocom_daq::clock::{Clock, TokioClock};
use geocom_daq::config::Settings;
use geocom_daq::geocom::GeoCom;
use geocom_daq::journal::{DailyJournal, Journal};
use geocom_daq::measurement::MeasurementStore;
use geocom_daq::survey::{RunOptions, Surveyor};
use geocom_daq::targets::{prompt::Prompt, setup_file, Aim};
use geocom_daq::{logging, upload};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::info;

/// Automated total station measurements over GeoCom.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the instrument.
    #[arg(short, long)]
    port: Option<String>,

    /// Number of sets to measure.
    #[arg(long)]
    sets: Option<u32>,

    /// Minutes between set starts.
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Read the aims from this setup file instead of asking for them.
    #[arg(long)]
    setup_file: Option<PathBuf>,

    /// Distance measurement attempts per aim.
    #[arg(long)]
    distance_attempts: Option<u32>,

    /// Measure Face I only.
    #[arg(long)]
    no_second_circle: bool,
}

impl Cli {
    /// Applies the flags on top of the loaded settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.serial.port = port.clone();
        }
        if let Some(sets) = self.sets {
            settings.schedule.sets = Some(sets);
        }
        if let Some(minutes) = self.interval_minutes {
            settings.schedule.interval = Some(Duration::from_secs(minutes * 60));
        }
        if let Some(path) = &self.setup_file {
            settings.paths.setup_file = Some(path.clone());
        }
        if let Some(attempts) = self.distance_attempts {
            settings.schedule.distance_attempts = attempts;
        }
        if self.no_second_circle {
            settings.schedule.second_circle = false;
        }
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler, never interrupt
        std::future::pending::<()>().await;
    }
}

/// Connects, initializes and collects the aims.
async fn prepare(
    surveyor: &mut Surveyor<SerialConnector>,
    settings: &Settings,
    journal: &Arc<dyn Journal>,
) -> Result<Vec<Aim>> {
    surveyor.geocom_mut().transport_mut().connect().await;
    surveyor.initialize().await?;

    if let Some(path) = &settings.paths.setup_file {
        let aims = setup_file::read(path)?;
        journal.info("Finished reading setup file");
        return Ok(aims);
    }

    let setup_log = PathBuf::from(format!(
        "setup_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let mut prompt = Prompt::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        Arc::clone(journal),
    );
    let aims = prompt
        .collect_aims(surveyor.geocom_mut(), &setup_log)
        .await
        .context("Cannot read angles, check cables and the instrument")?;

    if settings.schedule.sets.is_none() {
        surveyor.options_mut().sets = prompt.ask_set_count().await?;
    }
    if settings.schedule.interval.is_none() {
        surveyor.options_mut().interval = prompt.ask_interval().await?;
    }
    Ok(aims)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings: Settings = Settings::figment(cli.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid configuration")?;

    logging::init(&settings.log_level);

    // one handler for the whole process: setup, sets and shutdown
    let interrupt = interrupted();
    tokio::pin!(interrupt);

    let journal: Arc<dyn Journal> = Arc::new(
        DailyJournal::open(&settings.paths.logs)
            .with_context(|| format!("Failed to open log directory {:?}", settings.paths.logs))?,
    );
    let store = MeasurementStore::open(&settings.paths.measurements).with_context(|| {
        format!(
            "Failed to open measurement directory {:?}",
            settings.paths.measurements
        )
    })?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let transport = Transport::new(
        SerialConnector::new(settings.serial.clone()),
        Arc::clone(&journal),
        Arc::clone(&clock),
    )
    .with_reconnect_delay(settings.serial.reconnect_delay);
    let geocom = GeoCom::new(transport, Arc::clone(&journal)).with_retries(settings.geocom.retries);

    let mut surveyor = Surveyor::new(
        geocom,
        store,
        Arc::clone(&journal),
        clock,
        RunOptions::from_settings(&settings),
    )
    .with_uploader(Arc::from(upload::from_settings(&settings.upload)));

    let prepared = tokio::select! {
        aims = prepare(&mut surveyor, &settings, &journal) => Some(aims),
        () = &mut interrupt => None,
    };

    let summary = match prepared {
        Some(aims) => {
            surveyor.load_aims(aims?, settings.schedule.second_circle)?;
            surveyor.run_until(&mut interrupt).await?
        }
        None => surveyor.interrupt().await,
    };

    info!(
        sets = summary.sets_completed,
        records = summary.records_written,
        skipped = summary.aims_skipped,
        interrupted = summary.interrupted,
        "Run finished"
    );
    if summary.interrupted {
        println!("Closing program, goodbye");
    }
    Ok(())
}
