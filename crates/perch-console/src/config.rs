//! Console bridge configuration.

use std::time::Duration;

/// Configuration for one console bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,
    /// Maximum console lines retained (oldest dropped first).
    pub buffer_lines: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            buffer_lines: 200,
        }
    }
}

/// Exponential backoff reconnection policy.
///
/// Bounded on purpose: retrying forever on a fixed delay keeps a dead
/// console spinning invisibly; exhaustion instead surfaces a terminal
/// gave-up state the UI can render.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Initial delay before first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Multiplier applied to delay after each failed attempt.
    pub multiplier: f64,
    /// Maximum number of reconnect attempts (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Calculate the delay for a given attempt number (0-indexed).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base_ms = self.initial_delay.as_millis() as f64;
        #[allow(clippy::cast_possible_wrap)]
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        #[allow(clippy::cast_precision_loss)]
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether another attempt should be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }
}
