//! Exponential reconnect delay

use std::time::Duration;

/// Doubling delay between reconnect attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    init: Duration,
    max: Duration,
    /// 0 means retry forever
    max_retries: u32,
    attempts: u32,
    next: Duration,
}

impl Backoff {
    pub fn new(init: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            init,
            max,
            max_retries,
            attempts: 0,
            next: init,
        }
    }

    /// Delay before the next attempt, or `None` once the retry limit is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_retries != 0 && self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        let delay = self.next.min(self.max);
        self.next = self.next.saturating_mul(2).min(self.max);
        Some(delay)
    }

    /// Start over after a successful attempt
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next = self.init;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
