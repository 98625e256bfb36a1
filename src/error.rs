//! Custom error types for the application.
//!
//! Using the `thiserror` crate, this module gives every layer its own error enum so
//! that callers can tell *where* something went wrong and react accordingly.
//!
//! ## Error Hierarchy
//!
//! - **`TransportError`**: a fault on the serial link itself. I/O errors, end of
//!   stream, byte-level timeouts and replies that do not frame correctly all land
//!   here. Every variant is recoverable by resetting the link.
//! - **`GeoComError`**: a command that could not be completed after the client's
//!   retry loop, or whose reply fields could not be decoded. The orchestrator
//!   treats all of these as a reason to reinitialize the instrument.
//! - **`SetupError`**: invalid target definitions, including unknown wire codes
//!   which are rejected when the value is constructed rather than when it is used.
//! - **`ConfigError`**: settings that could not be loaded or failed validation.
//! - **`UploadError`**: the external upload program failed. Never fatal.
//! - **`SurveyError`**: orchestrator-level failures. Only
//!   `InitializationExhausted` ends a run.
//!
//! Instrument-reported errors (a non-zero GeoCom return code inside an otherwise
//! valid reply) are not errors: they travel inside the typed reply
//! as a [`ReturnCode`](crate::geocom::ReturnCode).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the orchestrator error type.
pub type AppResult<T> = std::result::Result<T, SurveyError>;

/// Fault on the character stream to the instrument.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Read or write on the stream failed.
    #[error("I/O error on instrument link: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("Instrument link closed by peer")]
    UnexpectedEof,

    /// No stream is held.
    #[error("Link not connected")]
    NotConnected,

    /// No line terminator arrived in time.
    #[error("GeoCom timeout, no response within {0:?}")]
    Timeout(Duration),

    /// The line lacks the `:` separating header and fields.
    #[error("GeoCom response malformed: {0:?}")]
    Malformed(String),

    /// The reply has a different number of fields than the RPC produces.
    #[error("GeoCom response length mismatch {actual} != {expected}")]
    FieldCount {
        /// Fields the RPC produces.
        expected: usize,
        /// Fields received.
        actual: usize,
    },
}

impl TransportError {
    /// Whether the underlying stream has to be reopened.
    pub fn is_link_fault(&self) -> bool {
        matches!(self, Self::Io(_) | Self::UnexpectedEof | Self::NotConnected)
    }
}

/// Failure of a single GeoCom remote procedure call.
#[derive(Error, Debug)]
pub enum GeoComError {
    /// Every attempt failed on the link or in framing.
    #[error("GeoCom did not receive a valid response to RPC {rpc} after {attempts} attempts")]
    NoResponse {
        /// RPC code.
        rpc: u16,
        /// Attempts made.
        attempts: u32,
    },

    /// The link could not be reopened between attempts.
    #[error("Could not reopen the link while executing RPC {rpc}")]
    ResetFailed {
        /// RPC code.
        rpc: u16,
    },

    /// A reply field does not parse as the number the RPC promises.
    #[error("RPC {rpc}: field {index} ({value:?}) is not a valid number")]
    InvalidField {
        /// RPC code.
        rpc: u16,
        /// Zero-based field index, return code included.
        index: usize,
        /// Field text as received.
        value: String,
    },
}

/// Invalid target definition or wire code.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Integer code outside a closed enumeration.
    #[error("Unknown {kind} code {code}")]
    UnknownCode {
        /// Enumeration name.
        kind: &'static str,
        /// Rejected code.
        code: i64,
    },

    /// Unusable setup file line.
    #[error("{}:{line}: {reason}", path.display())]
    Line {
        /// Setup file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// The setup file could not be read.
    #[error("Could not read setup file {}: {source}", path.display())]
    Read {
        /// Setup file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the current angles failed on the link.
    #[error("Could not read angles from the instrument: {0}")]
    AngleRead(#[source] GeoComError),

    /// Console or setup log I/O failed.
    #[error("I/O error during target entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A provider failed or a value has the wrong type.
    #[error("Configuration load error: {0}")]
    Load(#[from] figment::Error),

    /// Values parse but cannot work together.
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Failure of the external upload step.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload program could not be started.
    #[error("Failed to start upload program {program}: {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The upload program exited unsuccessfully.
    #[error("Upload of {} exited with {status}", file.display())]
    Failed {
        /// File being uploaded.
        file: PathBuf,
        /// Exit status text.
        status: String,
    },
}

/// Orchestrator-level failure.
#[derive(Error, Debug)]
pub enum SurveyError {
    /// Every initialization attempt failed; the run stops.
    #[error("Initializing failed after {attempts} attempts")]
    InitializationExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The aim list already holds its second circle.
    #[error("Second circle already added to this aim list")]
    AlreadyExpanded,

    /// A run was started without aims.
    #[error("No aims to measure")]
    NoAims,

    /// Aims could not be set up.
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Output files could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
