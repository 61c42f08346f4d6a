//! Per-channel configuration, fixed for the lifetime of one channel.

use std::time::Duration;

use url::Url;

use sz_core::config::{AppConfig, ChannelSettings};
use sz_core::constants;
use sz_core::error::{SzError, SzResult};

use crate::reconnect::ReconnectPolicy;

/// Immutable settings of one channel instance.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// ws/wss endpoint.
    pub endpoint: Url,
    /// Sub-protocols offered during the handshake.
    pub protocols: Vec<String>,
    /// Retry bounds and delays after unintentional closes.
    pub reconnect: ReconnectPolicy,
    /// Connect as soon as the channel is spawned.
    pub auto_connect: bool,
    /// Send the authenticate frame after each open.
    pub auto_authenticate: bool,
    /// Capacity of the event broadcast buffer.
    pub event_buffer: usize,
}

impl ChannelConfig {
    /// Config with defaults for everything but the endpoint.
    pub fn new(endpoint: &str) -> SzResult<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            protocols: Vec::new(),
            reconnect: ReconnectPolicy::default(),
            auto_connect: true,
            auto_authenticate: true,
            event_buffer: constants::DEFAULT_EVENT_BUFFER,
        })
    }

    /// Build from the `[channel]` section of the config file.
    pub fn from_settings(settings: &ChannelSettings) -> SzResult<Self> {
        if settings.endpoint.trim().is_empty() {
            return Err(SzError::MissingConfig("channel.endpoint".into()));
        }
        if !(1..=constants::MAX_EVENT_BUFFER).contains(&settings.event_buffer) {
            return Err(SzError::Config(format!(
                "channel.event_buffer must be between 1 and {}, got {}",
                constants::MAX_EVENT_BUFFER,
                settings.event_buffer
            )));
        }
        let endpoint = AppConfig::sanitize_endpoint(&settings.endpoint);
        Ok(Self {
            endpoint: parse_endpoint(&endpoint)?,
            protocols: settings.protocols.clone(),
            reconnect: ReconnectPolicy::from_settings(settings),
            auto_connect: settings.auto_connect,
            auto_authenticate: settings.auto_authenticate,
            event_buffer: settings.event_buffer,
        })
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Fixed-interval reconnects with the given interval and attempt budget.
    pub fn with_fixed_reconnect(self, interval: Duration, max_attempts: u32) -> Self {
        self.with_reconnect(ReconnectPolicy::fixed(interval, max_attempts))
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_auto_authenticate(mut self, auto_authenticate: bool) -> Self {
        self.auto_authenticate = auto_authenticate;
        self
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect.interval
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.reconnect.max_attempts
    }
}

fn parse_endpoint(endpoint: &str) -> SzResult<Url> {
    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(SzError::InvalidEndpoint(format!(
            "unsupported scheme '{other}' in {endpoint}, expected ws or wss"
        ))),
    }
}
