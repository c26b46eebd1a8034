//! Retry policy for opening the serial port.
//!
//! A device that was just plugged in, or that is still held by another
//! process, usually becomes available within a few seconds. Opening is
//! retried at a fixed interval until it succeeds or the attempt budget is
//! spent.

use otpkey_protocol::DEFAULT_OPEN_RETRY_INTERVAL;
use std::fmt::Display;
use std::time::Duration;

/// Default number of open attempts (about one minute at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub interval: Duration,
    /// Attempt budget; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_OPEN_RETRY_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the attempt budget. Zero means unbounded.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 { None } else { Some(attempts) };
        self
    }

    /// Runs `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. On failure the last error is
    /// returned together with the number of attempts made.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, (u32, E)>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err((attempt, e));
                    }
                    tracing::warn!(
                        "attempt {} failed: {}; retrying in {:?}",
                        attempt,
                        e,
                        self.interval
                    );
                    std::thread::sleep(self.interval);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(Duration::ZERO, max_attempts)
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, Some(DEFAULT_MAX_ATTEMPTS));
    }

    #[test]
    fn test_zero_attempts_means_unbounded() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, None);
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert_eq!(policy.max_attempts, Some(3));
    }

    #[test]
    fn test_succeeds_after_failures() {
        let mut calls = 0;
        let result = fast(Some(5)).run(|attempt| {
            calls += 1;
            if attempt < 3 {
                Err("busy")
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<(), _> = fast(Some(4)).run(|_| {
            calls += 1;
            Err("permission denied")
        });
        assert_eq!(result, Err((4, "permission denied")));
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_unbounded_keeps_trying() {
        let result = fast(None).run(|attempt| if attempt < 50 { Err("busy") } else { Ok(()) });
        assert!(result.is_ok());
    }
}
