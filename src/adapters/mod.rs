//! Instrument link adapters
//!
//! A [`Connector`] knows how to open a fresh character stream to the instrument.
//! The [`Transport`] owns one such stream at a time and provides the framed
//! send/receive primitives the GeoCom client is built on, reopening the stream
//! through the connector whenever it faults.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod mock;
pub mod serial_adapter;
pub mod transport;

pub use mock::{MockConnector, MockReply};
pub use serial_adapter::SerialConnector;
pub use transport::{parse_reply, Transport};

/// Opens character streams to the instrument.
#[async_trait]
pub trait Connector: Send {
    /// Stream produced by a successful open.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Makes one attempt at opening the stream.
    async fn open(&mut self) -> std::io::Result<Self::Stream>;

    /// Human readable endpoint, e.g. the port path.
    fn endpoint(&self) -> String;
}
