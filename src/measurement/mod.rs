//! Measurement records and their daily files.
//!
//! A [`MeasurementRecord`] is assembled from the three independent reads taken
//! per aim and appended, as one space-separated line, to the
//! [`MeasurementStore`]'s file for the current day.

pub mod record;
pub mod storage;

pub use record::{format_value, MeasurementRecord, SENTINEL};
pub use storage::MeasurementStore;
