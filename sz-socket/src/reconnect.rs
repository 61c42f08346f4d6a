//! Reconnect policy and the single pending retry timer.
//!
//! After an unintentional close the policy decides whether another attempt
//! is allowed and how long to wait first. The default is a fixed interval;
//! exponential backoff with jitter is opt-in.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use sz_core::config::{BackoffKind, ChannelSettings};

/// Delay strategy between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Every attempt waits the base interval.
    Fixed,
    /// `interval * 2^(attempt-1)`, capped at `max_delay`, +/- `jitter_factor`.
    Exponential { max_delay: Duration, jitter_factor: f64 },
}

/// Decides whether and after what delay a reconnect attempt follows a close.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Base delay before an attempt.
    pub interval: Duration,
    /// Attempts allowed after consecutive unintentional closes.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&ChannelSettings::default())
    }
}

impl ReconnectPolicy {
    /// Fixed-interval policy.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    /// Exponential policy with jitter.
    pub fn exponential(
        interval: Duration,
        max_attempts: u32,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Exponential {
                max_delay,
                jitter_factor: jitter_factor.clamp(0.0, 1.0),
            },
        }
    }

    pub fn from_settings(settings: &ChannelSettings) -> Self {
        let interval = Duration::from_millis(settings.reconnect_interval_ms);
        match settings.backoff {
            BackoffKind::Fixed => Self::fixed(interval, settings.max_reconnect_attempts),
            BackoffKind::Exponential => Self::exponential(
                interval,
                settings.max_reconnect_attempts,
                Duration::from_millis(settings.max_reconnect_delay_ms),
                settings.jitter_factor,
            ),
        }
    }

    /// The attempt number to schedule next, or `None` once the budget is spent.
    pub fn next_attempt(&self, attempts_so_far: u32) -> Option<u32> {
        (attempts_so_far < self.max_attempts).then(|| attempts_so_far + 1)
    }

    /// Delay before the given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                max_delay,
                jitter_factor,
            } => {
                let base = self.interval.as_secs_f64();
                let max = max_delay.as_secs_f64().max(base);
                let exponent = attempt.saturating_sub(1).min(30) as i32;
                let exponential = (base * 2.0_f64.powi(exponent)).min(max);

                let jitter_range = exponential * jitter_factor;
                let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
                Duration::from_secs_f64((exponential + jitter).max(0.0))
            }
        }
    }
}

/// The one outstanding retry timer of a channel.
///
/// Each scheduled timer gets a ticket; when it fires it sends the ticket to
/// the driver, which honours it only if it is still the current one.
#[derive(Debug, Default)]
pub(crate) struct RetryTimer {
    pending: Option<(u64, JoinHandle<()>)>,
    next_ticket: u64,
}

impl RetryTimer {
    /// Schedule a timer, cancelling any unfired one first.
    pub(crate) fn schedule(&mut self, delay: Duration, fired: &mpsc::UnboundedSender<u64>) -> u64 {
        self.cancel();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let fired = fired.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = fired.send(ticket);
        });
        self.pending = Some((ticket, handle));
        ticket
    }

    /// Cancel the pending timer, if any. Returns whether one was pending.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume a fired ticket. True only for the currently pending timer.
    pub(crate) fn take_fired(&mut self, ticket: u64) -> bool {
        let is_current = matches!(&self.pending, Some((current, _)) if *current == ticket);
        if is_current {
            self.pending = None;
        }
        is_current
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
