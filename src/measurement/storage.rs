//! Daily measurement files.
//!
//! Records go to `<dir>/YYYYMMDD.txt`, appended through a space-delimited
//! `csv` writer with quoting disabled so lines stay plain text. The first time
//! the directory is created a `README.txt` describing the columns is written
//! next to the data files.

use super::record::MeasurementRecord;
use chrono::Local;
use csv::{QuoteStyle, WriterBuilder};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

const README: &str = "\
Measurement files, one per day (YYYYMMDD.txt).

Each line holds one measured aim, values separated by a single space:

  timestamp       YYYYMMDD_HHMMSS
  name            aim name
  hz              horizontal angle [gon]
  hz_raw          horizontal angle, uncompensated [gon]
  v               vertical angle [gon]
  v_raw           vertical angle, uncompensated [gon]
  slope_distance  slope distance [m]
  cross_incline   cross inclination [gon]
  length_incline  length inclination [gon]
  temperature     internal instrument temperature [degC]

Values are rounded to 5 decimals. NaN marks a value whose measurement
reported an instrument error.
";

/// Append-only store of measurement records.
#[derive(Debug)]
pub struct MeasurementStore {
    dir: PathBuf,
    current: Mutex<PathBuf>,
}

impl MeasurementStore {
    /// Opens the store, creating `dir` (with a README) if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("README.txt"), README)?;
            info!(dir = %dir.display(), "Created measurement directory");
        }
        let current = Mutex::new(Self::file_for_today(&dir));
        Ok(Self { dir, current })
    }

    fn file_for_today(dir: &Path) -> PathBuf {
        dir.join(format!("{}.txt", Local::now().format("%Y%m%d")))
    }

    /// Directory holding the daily files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File records are currently appended to.
    pub fn current_path(&self) -> PathBuf {
        self.current.lock().clone()
    }

    /// Re-derives the current file from today's date.
    pub fn roll(&self) {
        *self.current.lock() = Self::file_for_today(&self.dir);
    }

    /// Appends one record as a line to the current file.
    pub fn append(&self, record: &MeasurementRecord) -> io::Result<()> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_writer(file);
        writer.write_record(record.columns())?;
        writer.flush()
    }
}
