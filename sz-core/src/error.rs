//! Global error types for the Stratizens client.
//!
//! All error categories across the workspace are unified into a single
//! `SzError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using SzError.
pub type SzResult<T> = Result<T, SzError>;

/// Unified error type covering all error categories in Stratizens.
#[derive(Error, Debug)]
pub enum SzError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// The channel endpoint is not a usable ws/wss URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // -- Channel errors --
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame was offered while the channel was not open; it was dropped.
    #[error("channel not open (state: {state}), frame dropped")]
    NotOpen {
        /// Channel state at the time of the send.
        state: String,
    },

    /// The authentication frame could not be built or sent.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The channel driver has shut down; the handle is no longer usable.
    #[error("channel closed")]
    ChannelClosed,

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SzError {
    /// Whether this error only reports a dropped frame rather than a failure.
    pub fn is_not_open(&self) -> bool {
        matches!(self, SzError::NotOpen { .. })
    }
}

impl From<serde_json::Error> for SzError {
    fn from(e: serde_json::Error) -> Self {
        SzError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SzError {
    fn from(e: toml::de::Error) -> Self {
        SzError::Config(e.to_string())
    }
}

impl From<url::ParseError> for SzError {
    fn from(e: url::ParseError) -> Self {
        SzError::InvalidEndpoint(e.to_string())
    }
}
