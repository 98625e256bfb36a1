//! Angle units.
//!
//! The instrument speaks radians on the wire; everything user facing (setup
//! files, measurement files, home orientation) is in gon, where a full circle is
//! 400 gon.

use std::f64::consts::PI;

/// Radians per gon.
pub const GON_TO_RAD: f64 = PI / 200.0;

/// Converts an angle in gon to radians.
pub fn gon_to_rad(gon: f64) -> f64 {
    gon * GON_TO_RAD
}

/// Converts an angle in radians to gon.
pub fn rad_to_gon(rad: f64) -> f64 {
    rad / GON_TO_RAD
}
