//! Shared test utilities for channel integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sz_core::error::{SzError, SzResult};
use sz_socket::{
    ChannelConfig, CloseInfo, ConnectRequest, Frame, Transport, TransportEvents, TransportFactory,
};

pub const ENDPOINT: &str = "ws://localhost:5000/ws";

/// Channel config that never connects on its own and retries every 100ms.
pub fn test_config(max_attempts: u32) -> ChannelConfig {
    ChannelConfig::new(ENDPOINT)
        .expect("valid test endpoint")
        .with_fixed_reconnect(Duration::from_millis(100), max_attempts)
        .with_auto_connect(false)
}

/// Let the driver drain everything queued without moving past pending timers.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Default)]
struct Recorded {
    sent: Vec<Frame>,
    closes: Vec<CloseInfo>,
}

/// One connection created by [`MockFactory`]; tests drive its events by hand.
#[derive(Clone)]
pub struct MockConnection {
    events: TransportEvents,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockConnection {
    pub fn open(&self) {
        self.events.opened();
    }

    pub fn message(&self, text: &str) {
        self.events.message(Frame::text(text));
    }

    /// The server closes the connection.
    pub fn server_close(&self, code: u16, reason: &str) {
        self.events.closed(CloseInfo::new(code, reason));
    }

    pub fn fail(&self, error: &str) {
        self.events.error(error);
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.recorded.lock().unwrap().sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|f| f.as_text().map(str::to_owned))
            .collect()
    }

    /// Close requests issued by the channel.
    pub fn closes(&self) -> Vec<CloseInfo> {
        self.recorded.lock().unwrap().closes.clone()
    }
}

struct MockTransport {
    recorded: Arc<Mutex<Recorded>>,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: Frame) -> SzResult<()> {
        self.recorded.lock().unwrap().sent.push(frame);
        Ok(())
    }

    fn close(&mut self, info: CloseInfo) {
        self.recorded.lock().unwrap().closes.push(info);
    }
}

/// Records every connection a channel opens.
#[derive(Clone, Default)]
pub struct MockFactory {
    connections: Arc<Mutex<Vec<MockConnection>>>,
    protocols_seen: Arc<Mutex<Vec<Vec<String>>>>,
    refuse: Arc<Mutex<bool>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transports created so far.
    pub fn opens(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn connection(&self, index: usize) -> MockConnection {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn last(&self) -> MockConnection {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened yet")
    }

    pub fn protocols_seen(&self) -> Vec<Vec<String>> {
        self.protocols_seen.lock().unwrap().clone()
    }

    /// Make subsequent `open` calls fail synchronously.
    pub fn refuse_connections(&self, refuse: bool) {
        *self.refuse.lock().unwrap() = refuse;
    }
}

impl TransportFactory for MockFactory {
    fn open(
        &self,
        request: ConnectRequest<'_>,
        events: TransportEvents,
    ) -> SzResult<Box<dyn Transport>> {
        self.protocols_seen
            .lock()
            .unwrap()
            .push(request.protocols.to_vec());
        if *self.refuse.lock().unwrap() {
            return Err(SzError::Transport("connection refused".into()));
        }

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        self.connections.lock().unwrap().push(MockConnection {
            events,
            recorded: Arc::clone(&recorded),
        });
        Ok(Box::new(MockTransport { recorded }))
    }
}
