//! Reconnect delays
//!
//! Delays grow geometrically from `initial` up to `max`. Each delay gets a
//! random extra of up to `jitter` times itself, but never goes past `max`.

use std::time::Duration;

use gm_core::config::BackoffConfig;

/// Exponential backoff with jitter for reconnection attempts
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay the schedule starts from and returns to on reset
    initial: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            current: std::cmp::min(initial, max),
            max,
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Get the next delay and advance the backoff.
    ///
    /// Jitter is added on top of the base delay, but the result never
    /// exceeds the configured maximum.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        // Calculate next delay with multiplier
        let next = Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier);
        self.current = std::cmp::min(next, self.max);

        // Add jitter
        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        std::cmp::min(delay + Duration::from_secs_f64(jitter_amount), self.max)
    }

    /// Return to the initial delay after a successful connection
    pub fn reset(&mut self) {
        self.current = std::cmp::min(self.initial, self.max);
    }
}
