//! GeoCom protocol: wire enumerations, the RPC table and the typed client.

pub mod client;
pub mod codes;
pub mod rpc;

pub use client::{
    AngleReading, FullMeasurement, GeoCom, ReturnCode, TemperatureReading, DEFAULT_RETRIES,
};
pub use codes::{
    AtrMode, EdmMode, InclineProgram, MeasureProgram, OnOff, PositionMode, PrismType,
    TargetType, UserMeasProgram,
};
pub use rpc::{encode_request, Rpc};
