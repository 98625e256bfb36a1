//! Core library for the geocom_daq application.
//!
//! Automates repeated measurements with a robotic total station over the
//! GeoCom serial protocol: a reconnecting transport, a retrying command client,
//! and an orchestrator that measures a list of targets in sets and writes one
//! record per target to a daily file.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod geocom;
pub mod journal;
pub mod logging;
pub mod measurement;
pub mod survey;
pub mod targets;
pub mod units;
pub mod upload;
