//! Measurement orchestrator.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Measuring(0) -> ... -> Measuring(n)
//!                                    ^                                  |
//!                                    +------------ Idle <---------------+
//!                                                   |
//!                                                   v
//!                                               Finished
//! ```
//!
//! Every aim runs a fixed step sequence. A failed configuration or positioning
//! step (link failure or instrument error code) abandons the aim and forces a
//! reinitialization before the next one. The three reads at the end only fail
//! the aim on a link failure; instrument error codes there become `NaN`
//! columns in the record. Running out of initialization attempts is the only
//! error that ends a run.

use crate::adapters::Connector;
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{AppResult, GeoComError, SurveyError};
use crate::error_recovery::{retry_with_policy, RetryPolicy, Retryable};
use crate::geocom::{
    AtrMode, EdmMode, FullMeasurement, GeoCom, InclineProgram, MeasureProgram, OnOff,
    PositionMode, ReturnCode, UserMeasProgram,
};
use crate::journal::Journal;
use crate::measurement::{MeasurementRecord, MeasurementStore};
use crate::targets::{Aim, AimList};
use crate::upload::{DisabledUploader, Uploader};
use async_trait::async_trait;
use chrono::Local;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyState {
    /// No configuration sent yet.
    Uninitialized,
    /// Sending the baseline configuration.
    Initializing,
    /// Configured and waiting for work.
    Ready,
    /// Working on the aim with this index.
    Measuring(usize),
    /// Waiting for the next set.
    Idle,
    /// Done; nothing more is sent except shutdown homing.
    Finished,
}

/// Run parameters, usually derived from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Number of sets; unbounded when `None`.
    pub sets: Option<u32>,
    /// Time between set starts; sets follow each other directly when `None`.
    pub interval: Option<Duration>,
    /// Distance measurement attempts per aim.
    pub distance_attempts: u32,
    /// Attempts and backoff of the initialization.
    pub initialization: RetryPolicy,
    /// Wait between triggering and reading a distance.
    pub compensator_settle: Duration,
    /// Wait after every written record.
    pub aim_pacing: Duration,
    /// Horizontal home orientation [gon].
    pub home_hz: f64,
    /// Vertical home orientation [gon].
    pub home_v: f64,
    /// ATR search window [gon].
    pub fine_adjust_range: f64,
    /// Instrument-side wait of the full measurement read [ms].
    pub full_measurement_wait: u32,
    /// Longest time [`Surveyor::shutdown`] spends trying to reach home.
    pub shutdown_timeout: Duration,
}

impl RunOptions {
    /// Options described by the settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let schedule = &settings.schedule;
        Self {
            sets: schedule.sets,
            interval: schedule.interval,
            distance_attempts: schedule.distance_attempts,
            initialization: schedule.initialization_policy(),
            compensator_settle: schedule.compensator_settle,
            aim_pacing: schedule.aim_pacing,
            home_hz: settings.geocom.home_hz,
            home_v: settings.geocom.home_v,
            fine_adjust_range: settings.geocom.fine_adjust_range,
            full_measurement_wait: settings.geocom.full_measurement_wait,
            shutdown_timeout: settings.geocom.shutdown_timeout,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// What a run achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Sets measured to the end.
    pub sets_completed: u32,
    /// Records appended to the measurement file.
    pub records_written: u32,
    /// Aims abandoned after a failed step.
    pub aims_skipped: u32,
    /// The run was stopped by an interrupt.
    pub interrupted: bool,
}

/// Why a step sequence was abandoned.
#[derive(Debug)]
enum StepFault {
    Link(GeoComError),
    Instrument { step: &'static str, code: ReturnCode },
}

impl fmt::Display for StepFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "{e}"),
            Self::Instrument { step, code } => write!(f, "{step} returned {code}"),
        }
    }
}

fn check(step: &'static str, result: Result<ReturnCode, GeoComError>) -> Result<(), StepFault> {
    let code = result.map_err(StepFault::Link)?;
    if code.is_ok() {
        Ok(())
    } else {
        Err(StepFault::Instrument { step, code })
    }
}

/// Time left of `interval` after `elapsed`; `None` once the set took the whole interval.
pub fn remaining_wait(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|wait| !wait.is_zero())
}

/// Baseline configuration of the instrument, one attempt per call.
struct Initialization<'a, C: Connector> {
    geocom: &'a mut GeoCom<C>,
    journal: Arc<dyn Journal>,
}

#[async_trait]
impl<'a, C: Connector> Retryable for Initialization<'a, C> {
    type Output = ();
    type Error = StepFault;

    async fn attempt(&mut self, attempt: u32) -> Result<(), StepFault> {
        debug!(attempt, "Initializing instrument");
        // without the incline sensor there are no cross/length values
        check("incline switch", self.geocom.set_incline_switch(OnOff::On).await)?;
        check("atmospheric correction", self.geocom.set_atm_ppm(0.0).await)?;
        check("EDM mode", self.geocom.set_edm_mode(EdmMode::PreciseIr).await)?;
        check(
            "measurement program",
            self.geocom
                .set_measurement_program(UserMeasProgram::SingleRefPrecise)
                .await,
        )
    }

    fn on_retry(&mut self, next_attempt: u32, delay: Duration, last_error: &StepFault) {
        debug!(next_attempt, error = %last_error, "Initialization attempt failed");
        self.journal.info(&format!(
            "Initializing failed ({last_error}), trying again in {}s",
            delay.as_secs()
        ));
    }
}

/// Drives the instrument through repeated measurement sets.
pub struct Surveyor<C: Connector> {
    geocom: GeoCom<C>,
    aims: AimList,
    store: MeasurementStore,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
    uploader: Arc<dyn Uploader>,
    options: RunOptions,
    state: SurveyState,
    summary: RunSummary,
}

impl<C: Connector> Surveyor<C> {
    /// Creates an orchestrator without aims and with uploads disabled.
    pub fn new(
        geocom: GeoCom<C>,
        store: MeasurementStore,
        journal: Arc<dyn Journal>,
        clock: Arc<dyn Clock>,
        options: RunOptions,
    ) -> Self {
        Self {
            geocom,
            aims: AimList::default(),
            store,
            journal,
            clock,
            uploader: Arc::new(DisabledUploader),
            options,
            state: SurveyState::Uninitialized,
            summary: RunSummary::default(),
        }
    }

    /// Sets the collaborator that receives the day's files.
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SurveyState {
        self.state
    }

    /// Counters of the run so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Aims in measurement order.
    pub fn aims(&self) -> &AimList {
        &self.aims
    }

    /// Run parameters.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run parameters, for schedule answers given after construction.
    pub fn options_mut(&mut self) -> &mut RunOptions {
        &mut self.options
    }

    /// The command client, e.g. for interactive target entry.
    pub fn geocom_mut(&mut self) -> &mut GeoCom<C> {
        &mut self.geocom
    }

    /// Measurement output.
    pub fn store(&self) -> &MeasurementStore {
        &self.store
    }

    /// Replaces the aims, appending the Face II set when `second_circle` is set.
    pub fn load_aims(&mut self, aims: Vec<Aim>, second_circle: bool) -> AppResult<()> {
        if aims.is_empty() {
            return Err(SurveyError::NoAims);
        }
        let mut list = AimList::new(aims);
        if second_circle {
            list.add_second_circle()?;
        }
        info!(aims = list.len(), second_circle, "Aims loaded");
        self.aims = list;
        Ok(())
    }

    /// Applies the baseline configuration, retrying on the initialization policy.
    ///
    /// When every attempt fails the day's files are handed to the uploader and
    /// [`SurveyError::InitializationExhausted`] is returned; the run must stop.
    pub async fn initialize(&mut self) -> AppResult<()> {
        self.state = SurveyState::Initializing;
        let policy = self.options.initialization.clone();
        let clock = Arc::clone(&self.clock);
        let outcome = {
            let mut initialization = Initialization {
                geocom: &mut self.geocom,
                journal: Arc::clone(&self.journal),
            };
            retry_with_policy(&mut initialization, &policy, clock.as_ref()).await
        };

        match outcome {
            Ok(()) => {
                self.journal.info("Successfully (re)initialized TS");
                self.state = SurveyState::Ready;
                Ok(())
            }
            Err(exhausted) => {
                if let Some(e) = exhausted.last_error {
                    self.journal.error(&format!("Last initialization attempt: {e}"));
                }
                self.journal.error("Initializing failed, stopping program");
                self.upload_outputs().await;
                self.state = SurveyState::Finished;
                Err(SurveyError::InitializationExhausted {
                    attempts: exhausted.attempts,
                })
            }
        }
    }

    /// Positions the instrument to the home orientation. Returns whether it got there.
    pub async fn go_home(&mut self) -> bool {
        self.journal.info("Going to home position");
        let result = self
            .geocom
            .make_positioning(
                self.options.home_hz,
                self.options.home_v,
                PositionMode::Precise,
                AtrMode::Position,
            )
            .await;
        match check("home positioning", result) {
            Ok(()) => true,
            Err(fault) => {
                self.journal
                    .warning(&format!("Could not reach home position: {fault}"));
                false
            }
        }
    }

    /// Hands the current measurement and log files to the uploader. Never fails the run.
    pub async fn upload_outputs(&mut self) -> bool {
        let measurement_file = self.store.current_path();
        let log_file = self.journal.current_file();
        match self
            .uploader
            .upload(&measurement_file, log_file.as_deref())
            .await
        {
            Ok(()) => {
                self.journal.info("Uploaded measurement file and log");
                true
            }
            Err(e) => {
                self.journal.error(&format!("Failed uploading files: {e}"));
                false
            }
        }
    }

    async fn measure_distance(&mut self) -> Result<FullMeasurement, StepFault> {
        let attempts = self.options.distance_attempts.max(1);
        let mut attempt = 1;
        loop {
            let trigger = self
                .geocom
                .do_measure(MeasureProgram::DefaultDistance, InclineProgram::Automatic)
                .await
                .map_err(StepFault::Link)?;
            if !trigger.is_ok() {
                self.journal
                    .warning(&format!("Distance trigger returned {trigger}"));
            }

            // let the compensator settle
            self.clock.sleep(self.options.compensator_settle).await;

            let full = self
                .geocom
                .get_full_measurement(
                    self.options.full_measurement_wait,
                    InclineProgram::Automatic,
                )
                .await
                .map_err(StepFault::Link)?;

            if full.return_code.is_ok() || attempt >= attempts {
                return Ok(full);
            }
            self.journal.error("Distance measurement failed");
            self.journal.info("Retrying");
            attempt += 1;
        }
    }

    async fn measure(&mut self, aim: &Aim) -> Result<MeasurementRecord, StepFault> {
        let target = aim.target;

        check("ATR state", self.geocom.set_user_atr_state(OnOff::On).await)?;
        check(
            "target type",
            self.geocom.set_target_type(target.target_type()).await,
        )?;
        if let Some(prism) = target.prism() {
            check("prism type", self.geocom.set_prism_type(prism).await)?;
        }

        let atr = if target.uses_reflector() {
            AtrMode::Target
        } else {
            AtrMode::Position
        };
        check(
            "positioning",
            self.geocom
                .make_positioning(aim.hz, aim.v, PositionMode::Precise, atr)
                .await,
        )?;
        if target.uses_reflector() {
            let range = self.options.fine_adjust_range;
            check("fine adjust", self.geocom.fine_adjust(range, range).await)?;
        }

        let full = self.measure_distance().await?;
        let angles = self
            .geocom
            .get_angle(InclineProgram::Automatic)
            .await
            .map_err(StepFault::Link)?;
        let temperature = self
            .geocom
            .get_internal_temperature()
            .await
            .map_err(StepFault::Link)?;

        if !full.return_code.is_ok() {
            self.journal.error(&format!(
                "Distance measurement failed ({})",
                full.return_code
            ));
        }
        if !angles.return_code.is_ok() {
            self.journal
                .error(&format!("Angle response failed ({})", angles.return_code));
        }
        if !temperature.return_code.is_ok() {
            self.journal.error(&format!(
                "Internal temperature measurement failed ({})",
                temperature.return_code
            ));
        }

        Ok(MeasurementRecord::assemble(
            Local::now().naive_local(),
            aim.name.as_str(),
            &full,
            &angles,
            &temperature,
        ))
    }

    /// Measures the aim at `index` and appends its record.
    ///
    /// Returns whether a record was written. An abandoned aim is followed by a
    /// reinitialization, whose exhaustion is the only error returned.
    pub async fn measure_aim(&mut self, index: usize) -> AppResult<bool> {
        let Some(aim) = self.aims.as_slice().get(index).cloned() else {
            return Ok(false);
        };
        self.state = SurveyState::Measuring(index);
        self.journal.info(&format!("Measuring {}", aim.name));

        match self.measure(&aim).await {
            Ok(record) => {
                self.state = SurveyState::Ready;
                if let Err(e) = self.store.append(&record) {
                    self.journal.error(&format!(
                        "Could not write measurement of {}: {e}",
                        aim.name
                    ));
                    return Ok(false);
                }
                self.summary.records_written += 1;
                Ok(true)
            }
            Err(fault) => {
                self.journal
                    .error(&format!("Measuring {} aborted: {fault}", aim.name));
                self.summary.aims_skipped += 1;
                self.initialize().await?;
                Ok(false)
            }
        }
    }

    /// Measures sets until the configured number is reached.
    pub async fn run(&mut self) -> AppResult<RunSummary> {
        if self.aims.is_empty() {
            return Err(SurveyError::NoAims);
        }
        if self.state == SurveyState::Uninitialized {
            self.initialize().await?;
        }

        let mut remaining = self.options.sets;
        while remaining.map_or(true, |sets| sets > 0) {
            let started = self.clock.now();
            self.store.roll();
            self.journal.roll();
            self.journal.info("Starting new set");

            for index in 0..self.aims.len() {
                if self.measure_aim(index).await? {
                    self.clock.sleep(self.options.aim_pacing).await;
                }
            }
            self.summary.sets_completed += 1;
            self.upload_outputs().await;

            if let Some(sets) = remaining.as_mut() {
                *sets -= 1;
            }
            let more_sets = remaining.map_or(true, |sets| sets > 0);

            if let Some(interval) = self.options.interval {
                self.state = SurveyState::Idle;
                self.go_home().await;
                if more_sets {
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    match remaining_wait(interval, elapsed) {
                        Some(wait) => {
                            self.journal
                                .info(&format!("Sleeping for {}s", wait.as_secs()));
                            self.clock.sleep(wait).await;
                        }
                        None => self.journal.warning("Interval too short"),
                    }
                }
            }
        }

        self.state = SurveyState::Finished;
        self.journal.info("Finished all sets");
        Ok(self.summary.clone())
    }

    /// Runs until the sets are done or `interrupt` completes, whichever is first.
    ///
    /// On interrupt the in-flight command is abandoned, the link drained, the
    /// instrument sent home and the day's files uploaded.
    pub async fn run_until<F>(&mut self, interrupt: F) -> AppResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            result = self.run() => Some(result),
            () = interrupt => None,
        };

        match finished {
            Some(result) => result,
            None => Ok(self.interrupt().await),
        }
    }

    /// Handles an interrupt that arrived outside [`run_until`](Self::run_until),
    /// e.g. while connecting or entering targets: marks the run interrupted and
    /// shuts down.
    pub async fn interrupt(&mut self) -> RunSummary {
        self.journal.info("Interrupted, shutting down");
        self.summary.interrupted = true;
        self.shutdown().await;
        self.summary.clone()
    }

    /// Orderly stop: drain the link, go home, upload.
    ///
    /// Homing is abandoned after `shutdown_timeout`, e.g. when the port is gone
    /// and the link cannot be reopened; the upload is attempted regardless.
    pub async fn shutdown(&mut self) {
        let limit = self.options.shutdown_timeout;
        let homed = tokio::time::timeout(limit, async {
            self.geocom.transport_mut().drain().await;
            self.go_home().await
        })
        .await;
        if homed.is_err() {
            self.journal.warning(&format!(
                "Home position not reached within {}s, giving up",
                limit.as_secs()
            ));
        }
        self.upload_outputs().await;
        self.state = SurveyState::Finished;
    }
}
