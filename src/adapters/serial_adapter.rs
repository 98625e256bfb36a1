//! Serial link to the total station over `tokio-serial`.

use super::Connector;
use crate::config::{Parity, SerialSettings};
use async_trait::async_trait;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Serial connector for RS-232/USB links to the total station
///
/// Every [`open`](Connector::open) builds a new `tokio-serial` stream from the
/// same settings, so reconnecting never changes the line configuration.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    /// Create a connector for the given line settings
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }

    /// Line settings used for every open
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

fn data_bits(bits: u8) -> tokio_serial::DataBits {
    match bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> tokio_serial::StopBits {
    if bits == 2 {
        tokio_serial::StopBits::Two
    } else {
        tokio_serial::StopBits::One
    }
}

#[async_trait]
impl Connector for SerialConnector {
    type Stream = SerialStream;

    async fn open(&mut self) -> std::io::Result<SerialStream> {
        let s = &self.settings;
        // no flow control, GeoCom is strictly request/response
        let port = tokio_serial::new(&s.port, s.baud_rate)
            .data_bits(data_bits(s.data_bits))
            .parity(s.parity.into())
            .stop_bits(stop_bits(s.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(s.read_timeout)
            .open_native_async()
            .map_err(std::io::Error::from)?;

        debug!(port = %s.port, baud = s.baud_rate, "Serial port opened");
        Ok(port)
    }

    fn endpoint(&self) -> String {
        self.settings.port.clone()
    }
}
