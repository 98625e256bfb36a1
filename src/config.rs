//! Configuration using Figment
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults ([`Settings::default`])
//! 2. a TOML file (`geocom.toml` unless another path is given; a missing file is fine)
//! 3. environment variables prefixed with `GEOCOM_`, `__` separating nested keys
//!
//! Command line flags are applied on top by the binary.
//!
//! ```text
//! GEOCOM_SERIAL__PORT=/dev/ttyS0
//! GEOCOM_SCHEDULE__INTERVAL=30m
//! GEOCOM_UPLOAD__ENABLED=true
//! ```
//!
//! Durations are written in humantime notation (`"2s"`, `"10m"`).

use crate::error::ConfigError;
use crate::error_recovery::RetryPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "geocom.toml";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Serial line to the instrument.
    pub serial: SerialSettings,
    /// Command behaviour and instrument geometry.
    pub geocom: GeoComSettings,
    /// Sets, interval and retry budgets.
    pub schedule: ScheduleSettings,
    /// Output and input locations.
    pub paths: PathSettings,
    /// Remote copy of the output files.
    pub upload: UploadSettings,
}

/// Parity of the serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Serial line to the instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Serial port (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Line speed [baud].
    pub baud_rate: u32,
    /// Parity bit.
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
    /// 5 to 8
    pub data_bits: u8,
    /// Per-byte read timeout of the port
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Wait between failed attempts to open the port
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            parity: Parity::None,
            stop_bits: 1,
            data_bits: 8,
            read_timeout: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// Command level behaviour and instrument geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoComSettings {
    /// Send/receive attempts per command
    pub retries: u32,
    /// Horizontal home orientation [gon]
    pub home_hz: f64,
    /// Vertical home orientation [gon]
    pub home_v: f64,
    /// ATR search window in both axes [gon]
    pub fine_adjust_range: f64,
    /// Instrument-side wait of the full measurement read [ms]
    pub full_measurement_wait: u32,
    /// Longest time homing may take when shutting down
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for GeoComSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            home_hz: 0.0,
            home_v: 200.0,
            fine_adjust_range: 2.0,
            full_measurement_wait: 15_000,
            shutdown_timeout: Duration::from_secs(2 * 60),
        }
    }
}

/// When and how often sets are measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Number of sets; unbounded when absent
    pub sets: Option<u32>,
    /// Time between set starts; continuous when absent
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,
    /// Attempts of the distance measurement per aim
    pub distance_attempts: u32,
    /// Retries of the initialization after the first attempt
    pub initialization_retries: u32,
    /// Waits before initialization attempts 2, 3, ...; the last one repeats
    #[serde(with = "duration_list")]
    pub initialization_backoff: Vec<Duration>,
    /// Wait between triggering and reading a distance
    #[serde(with = "humantime_serde")]
    pub compensator_settle: Duration,
    /// Wait after every written record
    #[serde(with = "humantime_serde")]
    pub aim_pacing: Duration,
    /// Observe every aim in both faces
    pub second_circle: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        let initialization = RetryPolicy::initialization(3);
        Self {
            sets: None,
            interval: None,
            distance_attempts: 2,
            initialization_retries: initialization.max_attempts - 1,
            initialization_backoff: initialization.backoff,
            compensator_settle: Duration::from_secs(2),
            aim_pacing: Duration::from_secs(1),
            second_circle: true,
        }
    }
}

impl ScheduleSettings {
    /// Retry policy of the instrument initialization.
    pub fn initialization_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.initialization_retries + 1,
            backoff: self.initialization_backoff.clone(),
        }
    }
}

/// Output and input locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory of the daily measurement files.
    pub measurements: PathBuf,
    /// Directory of the daily log files.
    pub logs: PathBuf,
    /// Aims are entered interactively when absent
    pub setup_file: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            measurements: PathBuf::from("measurements"),
            logs: PathBuf::from("logs"),
            setup_file: None,
        }
    }
}

/// Remote copy of the day's files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Upload after every set and on shutdown.
    pub enabled: bool,
    /// `scp`-compatible program
    pub program: String,
    /// Remote host, e.g. "user@host"
    pub destination: Option<String>,
    /// Remote directory for measurement files
    pub measurement_dir: String,
    /// Remote directory for log files
    pub log_dir: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "scp".to_string(),
            destination: None,
            measurement_dir: "measurements".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            serial: SerialSettings::default(),
            geocom: GeoComSettings::default(),
            schedule: ScheduleSettings::default(),
            paths: PathSettings::default(),
            upload: UploadSettings::default(),
        }
    }
}

mod duration_list {
    use humantime_serde::Serde;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(list: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(list.iter().map(|d| Serde::from(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Duration>, D::Error> {
        let list = Vec::<Serde<Duration>>::deserialize(deserializer)?;
        Ok(list.into_iter().map(Serde::into_inner).collect())
    }
}

impl Settings {
    /// Layered provider: defaults, then the TOML file, then `GEOCOM_` variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GEOCOM_").split("__"))
    }

    /// Loads and validates the settings.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings: Self = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        if self.serial.port.trim().is_empty() {
            return invalid("serial.port cannot be empty".to_string());
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be positive".to_string());
        }
        if !matches!(self.serial.stop_bits, 1 | 2) {
            return invalid(format!(
                "Invalid serial.stop_bits {}. Must be 1 or 2",
                self.serial.stop_bits
            ));
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return invalid(format!(
                "Invalid serial.data_bits {}. Must be 5-8",
                self.serial.data_bits
            ));
        }
        if self.geocom.retries == 0 {
            return invalid("geocom.retries must be at least 1".to_string());
        }
        if self.geocom.shutdown_timeout.is_zero() {
            return invalid("geocom.shutdown_timeout must be positive".to_string());
        }
        if self.schedule.distance_attempts == 0 {
            return invalid("schedule.distance_attempts must be at least 1".to_string());
        }
        if self.schedule.interval == Some(Duration::ZERO) {
            return invalid("schedule.interval must be positive; omit it for continuous measuring".to_string());
        }
        if self.schedule.sets == Some(0) {
            return invalid("schedule.sets must be positive; omit it for unbounded runs".to_string());
        }
        if self.upload.enabled
            && self
                .upload
                .destination
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
        {
            return invalid("upload.destination is required when upload is enabled".to_string());
        }
        Ok(())
    }
}
