//! Bounded exponential backoff with jitter

use rand::Rng;
use std::time::Duration;

/// Exponential backoff schedule capped at a fixed number of attempts.
///
/// Each delay doubles the previous one and adds up to 25% random jitter so
/// parallel workers do not retry in lockstep.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempt: 0,
        }
    }

    /// Returns the next delay, or `None` once the attempt cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }

        let exp = 1u32 << self.attempt.min(16);
        self.attempt += 1;

        let delay = self.base.saturating_mul(exp);
        let jitter = delay.mul_f64(rand::thread_rng().gen_range(0.0..0.25));
        Some(delay + jitter)
    }

    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_exponentially() {
        let mut backoff = Backoff::new(Duration::from_millis(100), 4);

        let first = backoff.next_delay().unwrap();
        let second = backoff.next_delay().unwrap();
        let third = backoff.next_delay().unwrap();

        assert!(first >= Duration::from_millis(100));
        assert!(first < Duration::from_millis(125));
        assert!(second >= Duration::from_millis(200));
        assert!(second < Duration::from_millis(250));
        assert!(third >= Duration::from_millis(400));
        assert!(third < Duration::from_millis(500));
    }

    #[test]
    fn test_attempt_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(10), 2);

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn test_zero_attempts_never_delays() {
        let mut backoff = Backoff::new(Duration::from_millis(10), 0);
        assert!(backoff.next_delay().is_none());
    }
}
