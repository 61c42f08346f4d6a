//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Stratizens";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Default number of reconnect attempts after an unexpected close.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default cap for exponential reconnect delays in milliseconds.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default jitter factor for exponential reconnect delays.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.3;

/// Default capacity of the channel event broadcast buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Largest accepted event broadcast buffer.
pub const MAX_EVENT_BUFFER: usize = 65_536;

/// WebSocket close codes used by the channel.
pub mod close_codes {
    /// Normal closure, sent on intentional disconnect.
    pub const NORMAL: u16 = 1000;
    /// Reserved code reported when a connection drops without a close frame.
    pub const ABNORMAL: u16 = 1006;
}

/// Message type tags on the wire.
pub mod frame_types {
    /// Outbound identity announcement sent right after open.
    pub const AUTHENTICATE: &str = "authenticate";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        assert!(DEFAULT_RECONNECT_INTERVAL_MS >= 1_000);
        assert!(DEFAULT_MAX_RECONNECT_DELAY_MS >= DEFAULT_RECONNECT_INTERVAL_MS);
        assert!((0.0..=1.0).contains(&DEFAULT_JITTER_FACTOR));
    }
}
