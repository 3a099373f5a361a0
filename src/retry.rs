/// Bounded retry budget for controller communication
/// One counter is shared across every network step of a cycle (status poll
/// and fill command alike), so a flapping link cannot be retried forever by
/// bouncing between phases. Any successful exchange refunds the budget.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    count: u32,
    max: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max: u32, backoff: Duration) -> Self {
        Self {
            count: 0,
            max,
            backoff,
        }
    }

    /// True while the budget has not been exhausted. Crossing `max` is
    /// terminal: with max = 5, the sixth consecutive failure gives up.
    pub fn should_retry(&self) -> bool {
        self.count <= self.max
    }

    pub fn record_failure(&mut self) {
        self.count += 1;
    }

    /// Any successful exchange resets the counter to zero.
    pub fn record_success(&mut self) {
        self.count = 0;
    }

    /// Fixed delay before the next attempt.
    pub fn backoff_duration(&self) -> Duration {
        self.backoff
    }

    pub fn failures(&self) -> u32 {
        self.count
    }
}
