//! Simulated GeoCom instrument
//!
//! `MockConnector` hands out in-memory duplex streams. Behind each stream a task
//! plays the instrument: it reads request lines, logs them, and answers with a
//! scripted reply for the request's RPC code (or a healthy default). Scripts can
//! also stay silent, drop the link, or make opens fail.

use super::Connector;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// How the simulated instrument answers one request.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Well-formed reply carrying these fields.
    Fields(Vec<String>),
    /// Bytes sent as-is, for framing tests.
    Raw(String),
    /// No answer at all.
    Silence,
    /// Drop the link instead of answering.
    Disconnect,
}

impl MockReply {
    /// Well-formed reply from string fields.
    pub fn fields(fields: &[&str]) -> Self {
        Self::Fields(fields.iter().map(|f| f.to_string()).collect())
    }

    /// Single-field reply holding only a return code.
    pub fn rc(code: i32) -> Self {
        Self::Fields(vec![code.to_string()])
    }

    /// Full measurement reply (9 fields) with the given return code and slope distance.
    pub fn full_measurement(rc: i32, slope_distance: f64) -> Self {
        Self::Fields(
            [
                rc.to_string(),
                "1.0".into(),
                "1.5".into(),
                "0.0001".into(),
                "0.00001".into(),
                "-0.00002".into(),
                "0.00001".into(),
                slope_distance.to_string(),
                "1234".into(),
            ]
            .to_vec(),
        )
    }

    /// Angle reply (10 fields) with the given return code.
    pub fn angles(rc: i32) -> Self {
        Self::Fields(
            [
                rc.to_string(),
                "1.0001".into(),
                "1.5001".into(),
                "0.0001".into(),
                "100".into(),
                "0.00001".into(),
                "-0.00002".into(),
                "0.00001".into(),
                "100".into(),
                "0".into(),
            ]
            .to_vec(),
        )
    }

    /// Internal temperature reply with the given return code.
    pub fn temperature(rc: i32, celsius: f64) -> Self {
        Self::Fields(vec![rc.to_string(), celsius.to_string()])
    }
}

#[derive(Debug, Default)]
struct MockState {
    scripted: HashMap<u16, VecDeque<MockReply>>,
    defaults: HashMap<u16, MockReply>,
    commands: Vec<String>,
    failed_opens_remaining: u32,
    opens: u32,
    live_sessions: u32,
}

impl MockState {
    fn next_reply(&mut self, rpc: Option<u16>) -> MockReply {
        let Some(rpc) = rpc else {
            return MockReply::Raw("%R1P,0,0:2\r\n".to_string());
        };
        if let Some(reply) = self.scripted.get_mut(&rpc).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.defaults
            .get(&rpc)
            .cloned()
            .unwrap_or_else(|| MockReply::rc(0))
    }
}

/// Extracts the RPC code from a request line such as `%R1Q,2006:1`.
pub fn rpc_of(request: &str) -> Option<u16> {
    request
        .strip_prefix("%R1Q,")?
        .split(':')
        .next()?
        .parse()
        .ok()
}

/// Connector producing simulated instrument sessions.
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// A healthy instrument: every setter answers `0`, reads answer plausible values.
    pub fn new() -> Self {
        let mut state = MockState::default();
        state
            .defaults
            .insert(2167, MockReply::full_measurement(0, 12.345_678_9));
        state.defaults.insert(2003, MockReply::angles(0));
        state.defaults.insert(5011, MockReply::temperature(0, 21.5));
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Queues a one-shot reply for `rpc`; queued replies are used before the default.
    pub fn script(&self, rpc: u16, reply: MockReply) -> &Self {
        self.state
            .lock()
            .scripted
            .entry(rpc)
            .or_default()
            .push_back(reply);
        self
    }

    /// Replaces the standing reply for `rpc`.
    pub fn set_default(&self, rpc: u16, reply: MockReply) -> &Self {
        self.state.lock().defaults.insert(rpc, reply);
        self
    }

    /// Makes the next `n` opens fail.
    pub fn fail_next_opens(&self, n: u32) {
        self.state.lock().failed_opens_remaining = n;
    }

    /// Request lines received so far, without terminator.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// RPC codes received so far, in order.
    pub fn rpc_log(&self) -> Vec<u16> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|c| rpc_of(c))
            .collect()
    }

    /// Successful opens so far.
    pub fn opens(&self) -> u32 {
        self.state.lock().opens
    }

    /// Sessions whose client end is still alive.
    pub fn live_sessions(&self) -> u32 {
        self.state.lock().live_sessions
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn open(&mut self) -> std::io::Result<DuplexStream> {
        {
            let mut state = self.state.lock();
            if state.failed_opens_remaining > 0 {
                state.failed_opens_remaining -= 1;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "simulated port unavailable",
                ));
            }
            state.opens += 1;
            state.live_sessions += 1;
        }

        let (client, instrument) = tokio::io::duplex(4096);
        tokio::spawn(serve(instrument, self.state.clone()));
        Ok(client)
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}

async fn serve(stream: DuplexStream, state: Arc<Mutex<MockState>>) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = {
            let mut state = state.lock();
            state.commands.push(line.clone());
            state.next_reply(rpc_of(&line))
        };

        let bytes = match reply {
            MockReply::Fields(fields) => format!("%R1P,0,0:{}\r\n", fields.join(",")),
            MockReply::Raw(raw) => raw,
            MockReply::Silence => continue,
            MockReply::Disconnect => break,
        };
        if write.write_all(bytes.as_bytes()).await.is_err() {
            break;
        }
    }

    state.lock().live_sessions -= 1;
}
