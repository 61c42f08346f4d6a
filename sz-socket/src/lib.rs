//! Stratizens realtime channel.
//!
//! A reconnecting, authenticated message channel to the hub's WebSocket
//! endpoint:
//! - lifecycle state published through watch channels
//! - bounded reconnects after unintentional closes, fixed or exponential
//! - an authenticate frame sent after every open when an identity is known
//! - event dispatch via tokio broadcast channels and optional callbacks
//!
//! The socket itself sits behind [`TransportFactory`], with a
//! tokio-tungstenite implementation as the default.

pub mod auth;
pub mod config;
pub mod events;
pub mod manager;
pub mod reconnect;
pub mod transport;
pub mod websocket;

// Re-export key types
pub use auth::{authenticate_frame, Identity, IdentityProvider, SharedIdentity, StaticIdentity};
pub use config::ChannelConfig;
pub use events::{
    ChannelCallbacks, ChannelEvent, ChannelState, CloseInfo, EventDispatcher, Frame,
    InboundMessage,
};
pub use manager::{ChannelBuilder, ChannelManager};
pub use reconnect::{Backoff, ReconnectPolicy};
pub use transport::{ConnectRequest, Transport, TransportEvent, TransportEvents, TransportFactory};
pub use websocket::WebSocketFactory;
