//! One line of the measurement file.

use crate::geocom::{AngleReading, FullMeasurement, TemperatureReading};
use crate::units::rad_to_gon;
use chrono::NaiveDateTime;

/// Written in place of a value whose read reported an instrument error.
pub const SENTINEL: &str = "NaN";

/// Timestamp format of records and daily file names' time part.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Formats a value with exactly 5 decimals, or the sentinel when absent.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.5}"),
        _ => SENTINEL.to_string(),
    }
}

/// Result of measuring one aim. Angles in gon, distance in metres.
///
/// `None` marks a value whose read reported a non-zero return code.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Local time the record was assembled.
    pub timestamp: NaiveDateTime,
    /// Aim name.
    pub name: String,
    /// Compensated horizontal angle.
    pub hz: Option<f64>,
    /// Uncompensated horizontal angle.
    pub hz_raw: Option<f64>,
    /// Compensated vertical angle.
    pub v: Option<f64>,
    /// Uncompensated vertical angle.
    pub v_raw: Option<f64>,
    /// Slope distance.
    pub slope_distance: Option<f64>,
    /// Cross incline.
    pub cross_incline: Option<f64>,
    /// Length incline.
    pub length_incline: Option<f64>,
    /// Internal temperature [°C].
    pub internal_temperature: Option<f64>,
}

impl MeasurementRecord {
    /// Combines the reads of one aim.
    ///
    /// Each read invalidates only its own columns: a failed angle read marks
    /// the four angle columns, a failed full measurement the slope distance and
    /// a failed temperature read the temperature.
    pub fn assemble(
        timestamp: NaiveDateTime,
        name: impl Into<String>,
        full: &FullMeasurement,
        angles: &AngleReading,
        temperature: &TemperatureReading,
    ) -> Self {
        let angles_ok = angles.return_code.is_ok();
        let angle = |rad: f64| angles_ok.then(|| rad_to_gon(rad));

        Self {
            timestamp,
            name: name.into(),
            hz: angle(full.hz_angle),
            hz_raw: angle(angles.hz_angle_raw),
            v: angle(full.v_angle),
            v_raw: angle(angles.v_angle_raw),
            slope_distance: full.return_code.is_ok().then_some(full.slope_distance),
            cross_incline: Some(rad_to_gon(full.cross_incline)),
            length_incline: Some(rad_to_gon(full.length_incline)),
            internal_temperature: temperature
                .return_code
                .is_ok()
                .then_some(temperature.internal_temperature_celsius),
        }
    }

    /// Columns in file order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.name.clone(),
        ];
        columns.extend(
            [
                self.hz,
                self.hz_raw,
                self.v,
                self.v_raw,
                self.slope_distance,
                self.cross_incline,
                self.length_incline,
                self.internal_temperature,
            ]
            .into_iter()
            .map(format_value),
        );
        columns
    }

    /// The record as it appears in the file, without newline.
    pub fn to_line(&self) -> String {
        self.columns().join(" ")
    }
}
