//! Bounded fixed-delay retry.

use std::thread;
use std::time::Duration;

use diskforge_shared::constants::loopdev::{REMOVE_MAX_ATTEMPTS, REMOVE_RETRY_DELAY_MS};

/// Retry an operation up to `max_attempts` times, sleeping `delay` between
/// consecutive attempts. There is no sleep after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

/// All attempts failed; carries the last error.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl Default for RetryPolicy {
    /// Policy used for loop device removal: 60 attempts, one second apart.
    fn default() -> Self {
        Self::new(
            REMOVE_MAX_ATTEMPTS,
            Duration::from_millis(REMOVE_RETRY_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy without any delay, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E>(&self, mut op: impl FnMut(u32) -> Result<T, E>) -> Result<T, Exhausted<E>> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(last) if attempt >= self.max_attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last,
                    });
                }
                Err(_) => {
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 60);
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(0).run(|_| {
            calls += 1;
            Err("nope")
        });
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[test]
    fn test_stops_at_first_success() {
        let mut calls = 0;
        let result = RetryPolicy::immediate(60).run(|attempt| {
            calls += 1;
            if attempt == 3 { Ok(attempt) } else { Err("busy") }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_exhausted_after_last_attempt() {
        let mut seen = Vec::new();
        let result: Result<(), _> = RetryPolicy::immediate(60).run(|attempt| {
            seen.push(attempt);
            Err(attempt)
        });
        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 60);
        assert_eq!(exhausted.last, 60);
        assert_eq!(seen, (1..=60).collect::<Vec<_>>());
    }

    #[test]
    fn test_sleeps_between_attempts_only() {
        let policy = RetryPolicy::new(5, Duration::from_millis(20));
        let start = Instant::now();
        let result: Result<(), _> = policy.run(|_| Err(()));
        let elapsed = start.elapsed();

        assert_eq!(result.unwrap_err().attempts, 5);
        // Four gaps between five attempts.
        assert!(elapsed >= Duration::from_millis(80));
    }
}
