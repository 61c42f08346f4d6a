//! Channel state, frames, lifecycle events and the event dispatcher.
//!
//! Everything the owning application observes about a channel is defined
//! here: the lifecycle state, inbound frames, caller callbacks, and a
//! broadcast-based dispatcher for decoupled consumers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use sz_core::constants::{self, close_codes};
use sz_core::error::SzResult;

/// Lifecycle state of a channel, mirroring the transport's ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// A transport has been created and has not reported open or error yet.
    Connecting,
    /// The transport is open; frames can be sent.
    Open,
    /// An intentional close is in progress. The driver finishes a close
    /// within one step, so watchers go straight from Open to Closed; this
    /// variant mirrors the transport ready state and is never published.
    Closing,
    /// No live transport.
    Closed,
}

impl ChannelState {
    /// Whether frames can be sent in this state.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// An opaque payload carried over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Build a text frame.
    pub fn text(s: impl Into<String>) -> Self {
        Frame::Text(s.into())
    }

    /// Serialize a value into a JSON text frame.
    pub fn json<T: Serialize>(value: &T) -> SzResult<Self> {
        Ok(Frame::Text(serde_json::to_string(value)?))
    }

    /// The text content, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s.as_str()),
            Frame::Binary(_) => None,
        }
    }

    /// Deserialize the payload as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> SzResult<T> {
        let value = match self {
            Frame::Text(s) => serde_json::from_str(s)?,
            Frame::Binary(b) => serde_json::from_slice(b)?,
        };
        Ok(value)
    }

    /// The `type` tag of a JSON application event, if present.
    ///
    /// Frames that are not JSON objects, or carry no string `type`, yield
    /// `None`; the frame itself is still delivered untouched.
    pub fn message_type(&self) -> Option<String> {
        let value: serde_json::Value = self.parse_json().ok()?;
        value.get("type")?.as_str().map(str::to_string)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A frame received from the server, stamped on receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub frame: Frame,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub(crate) fn now(frame: Frame) -> Self {
        Self {
            frame,
            received_at: Utc::now(),
        }
    }
}

/// Details of a closed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code (1006 when no close frame was received).
    pub code: u16,
    /// Close reason text, possibly empty.
    pub reason: String,
    /// Whether the closing handshake completed.
    pub clean: bool,
}

impl CloseInfo {
    /// A clean close with the given code and reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            clean: true,
        }
    }

    /// Normal closure (1000).
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(close_codes::NORMAL, reason)
    }

    /// A connection lost without a closing handshake (1006).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: close_codes::ABNORMAL,
            reason: reason.into(),
            clean: false,
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code={}", self.code)
        } else {
            write!(f, "code={}, reason='{}'", self.code, self.reason)
        }
    }
}

/// A lifecycle event published on the dispatcher.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The transport reached Open.
    Opened,
    /// A frame arrived.
    Message(InboundMessage),
    /// The connection closed, intentionally or not.
    Closed(CloseInfo),
    /// The transport reported an error; a close follows.
    Error(String),
    /// A reconnect attempt was scheduled.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The attempt budget is spent; the channel stays closed.
    ReconnectsExhausted { attempts: u32 },
}

impl ChannelEvent {
    /// Short name used in logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Message(_) => "message",
            Self::Closed(_) => "closed",
            Self::Error(_) => "error",
            Self::ReconnectScheduled { .. } => "reconnect-scheduled",
            Self::ReconnectsExhausted { .. } => "reconnects-exhausted",
        }
    }
}

/// Broadcast-based event dispatcher for decoupled event handling.
///
/// Multiple consumers can independently observe the same channel. Slow
/// consumers that fall behind receive `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<ChannelEvent>,
}

impl EventDispatcher {
    /// Create a new EventDispatcher with the given channel capacity,
    /// clamped to `1..=MAX_EVENT_BUFFER`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, constants::MAX_EVENT_BUFFER);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive channel events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all active subscribers.
    pub fn dispatch(&self, event: ChannelEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(count) => debug!("dispatched {name} to {count} subscriber(s)"),
            Err(_) => debug!("no subscribers for event {name}"),
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

type OpenFn = Arc<dyn Fn() + Send + Sync>;
type MessageFn = Arc<dyn Fn(&InboundMessage) + Send + Sync>;
type CloseFn = Arc<dyn Fn(&CloseInfo) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Caller-supplied lifecycle callbacks.
///
/// Callbacks run on the channel's driver task, one at a time and in the
/// order the events were received. They must not block.
#[derive(Clone, Default)]
pub struct ChannelCallbacks {
    on_open: Option<OpenFn>,
    on_message: Option<MessageFn>,
    on_close: Option<CloseFn>,
    on_error: Option<ErrorFn>,
}

impl ChannelCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_message(mut self, f: impl Fn(&InboundMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire_open(&self) {
        if let Some(f) = &self.on_open {
            f();
        }
    }

    pub(crate) fn fire_message(&self, message: &InboundMessage) {
        if let Some(f) = &self.on_message {
            f(message);
        }
    }

    pub(crate) fn fire_close(&self, info: &CloseInfo) {
        if let Some(f) = &self.on_close {
            f(info);
        }
    }

    pub(crate) fn fire_error(&self, error: &str) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }
}

impl fmt::Debug for ChannelCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCallbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
