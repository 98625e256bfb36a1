//! Shared harness: a simulated station with a recording journal, clock and uploader.
#![allow(dead_code)]

use geocom_daq::adapters::{MockConnector, Transport};
use geocom_daq::clock::{Clock, ManualClock};
use geocom_daq::geocom::{GeoCom, PrismType};
use geocom_daq::journal::MemoryJournal;
use geocom_daq::measurement::MeasurementStore;
use geocom_daq::survey::{RunOptions, Surveyor};
use geocom_daq::targets::{Aim, Target};
use geocom_daq::upload::RecordingUploader;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Station {
    pub connector: MockConnector,
    pub journal: Arc<MemoryJournal>,
    pub clock: Arc<ManualClock>,
    pub uploader: Arc<RecordingUploader>,
    pub dir: TempDir,
}

impl Station {
    pub fn new() -> Self {
        Self::with_uploader(RecordingUploader::new())
    }

    pub fn with_uploader(uploader: RecordingUploader) -> Self {
        Self {
            connector: MockConnector::new(),
            journal: Arc::new(MemoryJournal::new()),
            clock: Arc::new(ManualClock::new()),
            uploader: Arc::new(uploader),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub async fn surveyor(&self, options: RunOptions) -> Surveyor<MockConnector> {
        self.surveyor_with_clock(options, self.clock.clone()).await
    }

    /// Surveyor whose waits go through `clock` instead of the recording one.
    pub async fn surveyor_with_clock(
        &self,
        options: RunOptions,
        clock: Arc<dyn Clock>,
    ) -> Surveyor<MockConnector> {
        let mut transport =
            Transport::new(self.connector.clone(), self.journal.clone(), clock.clone());
        transport.connect().await;
        let geocom = GeoCom::new(transport, self.journal.clone());
        let store = MeasurementStore::open(self.measurement_dir()).unwrap();
        Surveyor::new(geocom, store, self.journal.clone(), clock, options)
            .with_uploader(self.uploader.clone())
    }

    pub fn measurement_dir(&self) -> PathBuf {
        self.dir.path().join("measurements")
    }

    /// Every written record, split into columns.
    pub fn records(&self) -> Vec<Vec<String>> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.measurement_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.file_name().and_then(|n| n.to_str()) != Some("README.txt"))
            .collect();
        files.sort();
        files
            .iter()
            .flat_map(|path| {
                fs::read_to_string(path)
                    .unwrap()
                    .lines()
                    .map(|line| line.split(' ').map(str::to_string).collect())
                    .collect::<Vec<Vec<String>>>()
            })
            .collect()
    }
}

/// One set, no interval, defaults otherwise.
pub fn options(sets: u32) -> RunOptions {
    RunOptions {
        sets: Some(sets),
        interval: None,
        ..RunOptions::default()
    }
}

pub fn reflector(name: &str, hz: f64, v: f64) -> Aim {
    Aim::new(name, hz, v, Target::Reflector(PrismType::Round))
}

pub fn reflectorless(name: &str, hz: f64, v: f64) -> Aim {
    Aim::new(name, hz, v, Target::Reflectorless)
}

pub const INIT_SEQUENCE: [u16; 4] = [2006, 2148, 2020, 17019];
pub const REFLECTOR_AIM: [u16; 9] = [18005, 17021, 17008, 9027, 9037, 2008, 2167, 2003, 5011];
pub const REFLECTORLESS_AIM: [u16; 7] = [18005, 17021, 9027, 2008, 2167, 2003, 5011];
