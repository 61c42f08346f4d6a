//! Transport abstraction.
//!
//! A transport behaves like a browser WebSocket: creating one returns
//! immediately, and open/message/close/error are reported later through a
//! [`TransportEvents`] sink. The channel never touches sockets directly, so
//! any runtime or a test double can stand in via [`TransportFactory`].

use tokio::sync::mpsc;
use url::Url;

use sz_core::error::SzResult;

use crate::events::{CloseInfo, Frame};

/// What the factory needs to open a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    pub endpoint: &'a Url,
    pub protocols: &'a [String],
}

/// Events a transport reports back to its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Message(Frame),
    Close(CloseInfo),
    Error(String),
}

/// Sink handed to a transport when it is created.
///
/// Every event is tagged with the generation of the connection attempt it
/// belongs to, so the channel can ignore events from transports it has
/// already abandoned.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Connection attempt this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event. Returns false once the channel has shut down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    pub fn message(&self, frame: Frame) -> bool {
        self.emit(TransportEvent::Message(frame))
    }

    pub fn closed(&self, info: CloseInfo) -> bool {
        self.emit(TransportEvent::Close(info))
    }

    pub fn error(&self, error: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(error.into()))
    }
}

/// One live connection, owned by the channel's driver.
pub trait Transport: Send {
    /// Queue a frame for delivery. Only called while the channel is open.
    fn send(&mut self, frame: Frame) -> SzResult<()>;

    /// Start closing. Safe to call while still connecting and more than once.
    fn close(&mut self, info: CloseInfo);
}

/// Creates transports for a channel.
pub trait TransportFactory: Send + Sync {
    /// Begin connecting. Must not block; progress is reported via `events`.
    fn open(&self, request: ConnectRequest<'_>, events: TransportEvents)
        -> SzResult<Box<dyn Transport>>;
}
