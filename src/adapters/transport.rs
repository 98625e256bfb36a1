//! Framed character-stream transport.
//!
//! Requests go out verbatim (the caller includes the `\r\n` terminator). Replies
//! are read one byte at a time until `\n` or until the timeout elapses, then
//! reduced to their comma separated fields:
//!
//! ```text
//! %R1P,0,0:0,1.5707,0.9812\r\n
//!          ^^^^^^^^^^^^^^^^        fields = ["0", "1.5707", "0.9812"]
//! ```
//!
//! Any I/O failure reopens the link through the [`Connector`]; opening retries
//! until it succeeds.

use super::Connector;
use crate::clock::Clock;
use crate::error::TransportError;
use crate::journal::Journal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

/// Quiet period that ends a drain.
const DRAIN_QUIET: Duration = Duration::from_millis(50);

/// Default wait between failed open attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Reduces a reply line to its fields.
///
/// Drops the two trailing terminator characters, discards everything up to and
/// including the first `:` (the echoed header) and splits the rest on `,`. The
/// field count must equal `expected`; a short or long reply is never truncated
/// or padded.
pub fn parse_reply(line: &str, expected: usize) -> Result<Vec<String>, TransportError> {
    let mut chars = line.chars();
    chars.next_back();
    chars.next_back();
    let body = chars.as_str();

    let (_, payload) = body
        .split_once(':')
        .ok_or_else(|| TransportError::Malformed(line.to_string()))?;

    let fields: Vec<String> = payload.split(',').map(str::to_string).collect();
    if fields.len() != expected {
        return Err(TransportError::FieldCount {
            expected,
            actual: fields.len(),
        });
    }
    Ok(fields)
}

/// Owns the single connection to the instrument.
pub struct Transport<C: Connector> {
    connector: C,
    stream: Option<BufReader<C::Stream>>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
    reconnect_delay: Duration,
    opens: u64,
}

impl<C: Connector> Transport<C> {
    /// Creates an unconnected transport. Call [`connect`](Self::connect) before use.
    pub fn new(connector: C, journal: Arc<dyn Journal>, clock: Arc<dyn Clock>) -> Self {
        Self {
            connector,
            stream: None,
            journal,
            clock,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            opens: 0,
        }
    }

    /// Overrides the wait between failed open attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Whether a stream is currently held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Number of successful opens over the transport's lifetime.
    pub fn open_count(&self) -> u64 {
        self.opens
    }

    /// Endpoint of the underlying connector.
    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    /// Connector used to (re)open the stream.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens the stream, retrying until it succeeds.
    ///
    /// An existing stream is closed first, so calling this while connected
    /// replaces the handle instead of leaking it.
    pub async fn connect(&mut self) {
        loop {
            self.close().await;

            let endpoint = self.connector.endpoint();
            self.journal
                .info(&format!("Trying to open serial connection on port {endpoint}"));

            match self.connector.open().await {
                Ok(stream) => {
                    self.stream = Some(BufReader::new(stream));
                    self.opens += 1;
                    self.journal.info(&format!(
                        "Successfully opened serial connection on port {endpoint}"
                    ));
                    return;
                }
                Err(e) => {
                    debug!(%endpoint, error = %e, "Open failed, retrying");
                    self.clock.sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Shuts down and drops the current stream, if any.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // best effort, the handle is dropped either way
            let _ = stream.shutdown().await;
        }
    }

    /// Writes `command` verbatim.
    ///
    /// On an I/O failure the link is reopened and the error returned; the
    /// write itself is not repeated.
    pub async fn send(&mut self, command: &str) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            self.journal.error("Serial connection not open");
            self.connect().await;
            return Err(TransportError::NotConnected);
        };

        let written = async {
            stream.write_all(command.as_bytes()).await?;
            stream.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                debug!(command = command.trim_end(), "Sent");
                Ok(())
            }
            Err(e) => {
                self.journal.error(&format!("USB unplugged! ({e})"));
                self.connect().await;
                Err(e.into())
            }
        }
    }

    /// Reads one reply line and returns its fields.
    ///
    /// `expected_fields` is the number of comma separated fields the caller's
    /// RPC produces. Link faults reopen the stream; timeouts and framing
    /// errors leave it alone so the caller can decide.
    pub async fn receive(
        &mut self,
        expected_fields: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, TransportError> {
        let line = match self.read_line(timeout).await {
            Ok(line) => line,
            Err(e) if e.is_link_fault() => {
                self.journal.error(&format!("USB unplugged! ({e})"));
                self.connect().await;
                return Err(e);
            }
            Err(e) => {
                self.journal.error(&e.to_string());
                return Err(e);
            }
        };

        debug!(reply = line.trim_end(), "Received");
        parse_reply(&line, expected_fields).inspect_err(|e| self.journal.error(&e.to_string()))
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut bytes = Vec::with_capacity(64);

        loop {
            let byte = match tokio::time::timeout_at(deadline, stream.read_u8()).await {
                Err(_) => return Err(TransportError::Timeout(timeout)),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(TransportError::UnexpectedEof)
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(byte)) => byte,
            };
            bytes.push(byte);
            if byte == b'\n' {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Discards whatever the instrument has already sent.
    pub async fn drain(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let mut buf = [0u8; 256];
        let mut dropped = 0usize;
        while let Ok(Ok(n)) = tokio::time::timeout(DRAIN_QUIET, stream.read(&mut buf)).await {
            if n == 0 {
                break;
            }
            dropped += n;
        }
        trace!(dropped, "Drained link");
    }

    /// Drains pending input and reopens the link. Returns whether a stream is held afterwards.
    pub async fn reset(&mut self) -> bool {
        self.journal.error("Resetting serial connection");
        self.drain().await;
        self.connect().await;
        if !self.is_open() {
            self.journal
                .error("Could not reopen port after resetting serial connection");
        }
        self.is_open()
    }
}
