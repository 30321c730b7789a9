use std::time::Duration;

/// Retry schedule for remote metadata calls.
///
/// Applies only to the cheap freshness probes — full downloads are never
/// retried by this subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.initial_delay.mul_f64(self.backoff_factor.powi(exponent))
    }
}
