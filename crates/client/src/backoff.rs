use std::time::Duration;

/// Poll interval schedule for read-only confirmation polling.
///
/// Delays grow geometrically from `initial` and saturate at `max`. State
/// changing calls are never retried, so this is only ever used between
/// receipt lookups.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: u32,
    attempt: u32,
    waited: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: 2,
            attempt: 0,
            waited: Duration::ZERO,
        }
    }

    pub fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor.max(1);
        self
    }

    pub fn next_delay(&mut self) -> Duration {
        let scale = self.factor.checked_pow(self.attempt).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(scale).min(self.max);

        self.attempt = self.attempt.saturating_add(1);
        self.waited = self.waited.saturating_add(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.waited = Duration::ZERO;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Sum of every delay handed out since the last reset
    pub fn total_waited(&self) -> Duration {
        self.waited
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_cap() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(2));

        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
            ]
        );
        assert_eq!(backoff.attempt(), 6);
        assert_eq!(backoff.total_waited(), Duration::from_millis(7750));
    }

    #[test]
    fn test_custom_factor() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10))
            .with_factor(3);

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(), Duration::from_millis(900));
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = ExponentialBackoff::default();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.total_waited(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_many_attempts_do_not_overflow() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_secs(1));
        for _ in 0..200 {
            assert!(backoff.next_delay() <= Duration::from_secs(1));
        }
    }

    #[test]
    fn test_max_below_initial_is_raised() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
