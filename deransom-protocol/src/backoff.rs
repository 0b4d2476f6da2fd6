//! Reconnection Backoff
//!
//! Exponential backoff state for the event socket's reconnection procedure.
//! The delay before the Nth attempt is `min(base * factor^(N-1), ceiling)`;
//! once the attempt budget is exhausted no further delay is handed out and
//! the socket stays disconnected until an explicit reconnect request.

use std::time::Duration;

/// Default delay before the first reconnection attempt
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Default ceiling on the reconnection delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default multiplicative growth applied after each attempt
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Default number of reconnection attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Tunable parameters of the reconnection procedure
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    pub base_delay: Duration,
    /// Ceiling the growing delay is clamped to
    pub max_delay: Duration,
    /// Multiplicative growth applied after each attempt
    pub growth_factor: f64,
    /// Attempt budget; exhaustion is terminal until a manual reconnect
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Reconnection state: attempt counter plus the current delay
///
/// # Examples
///
/// ```
/// use deransom_protocol::{ReconnectPolicy, ReconnectStrategy};
/// use std::time::Duration;
///
/// let mut strategy = ReconnectStrategy::new(ReconnectPolicy::default());
/// assert_eq!(strategy.next_delay(), Some(Duration::from_millis(2000)));
/// assert_eq!(strategy.next_delay(), Some(Duration::from_millis(3000)));
///
/// // A successful connection resets the sequence.
/// strategy.reset();
/// assert_eq!(strategy.next_delay(), Some(Duration::from_millis(2000)));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectStrategy {
    policy: ReconnectPolicy,
    attempt: u32,
    current_delay: Duration,
}

impl ReconnectStrategy {
    /// Create a fresh strategy for the given policy
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            current_delay: policy.base_delay,
        }
    }

    /// Reset to the initial state, called on successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = self.policy.base_delay;
    }

    /// Number of attempts consumed so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Check if more attempts are available
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempt < self.policy.max_attempts
    }

    /// Hand out the delay for the next attempt and advance the state
    ///
    /// Returns `None` once the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.has_attempts_remaining() {
            return None;
        }

        let delay = self.current_delay;
        self.attempt += 1;

        let grown = self.current_delay.mul_f64(self.policy.growth_factor);
        self.current_delay = std::cmp::min(grown, self.policy.max_delay);

        Some(delay)
    }

    /// Human-readable progress, for logging
    pub fn status(&self) -> String {
        format!(
            "attempt {}/{}, next delay {:?}",
            self.attempt, self.policy.max_attempts, self.current_delay
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_sequence_follows_growth_factor() {
        let mut strategy = ReconnectStrategy::new(ReconnectPolicy::default());

        // min(2000 * 1.5^(n-1), 30000) for n = 1..=5
        let expected = [2000u64, 3000, 4500, 6750, 10125];
        for (n, millis) in expected.iter().enumerate() {
            let delay = strategy.next_delay();
            assert_eq!(
                delay,
                Some(Duration::from_millis(*millis)),
                "attempt {}",
                n + 1
            );
        }

        assert!(!strategy.has_attempts_remaining());
        assert_eq!(strategy.next_delay(), None);
    }

    #[test]
    fn test_delay_is_clamped_to_ceiling() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(4000),
            growth_factor: 1.5,
            max_attempts: 10,
        };
        let mut strategy = ReconnectStrategy::new(policy);

        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(3000)));
        // 4500 clamps to 4000, and stays there
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(4000)));
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut strategy = ReconnectStrategy::new(ReconnectPolicy::default());

        strategy.next_delay();
        strategy.next_delay();
        assert_eq!(strategy.attempt(), 2);

        strategy.reset();
        assert_eq!(strategy.attempt(), 0);
        assert_eq!(strategy.next_delay(), Some(DEFAULT_BASE_DELAY));
    }

    #[test]
    fn test_exhaustion_is_terminal_until_reset() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        };
        let mut strategy = ReconnectStrategy::new(policy);

        assert!(strategy.next_delay().is_some());
        assert!(strategy.next_delay().is_some());
        assert_eq!(strategy.next_delay(), None);
        assert_eq!(strategy.next_delay(), None);

        strategy.reset();
        assert_eq!(strategy.next_delay(), Some(DEFAULT_BASE_DELAY));
    }

    #[test]
    fn test_status_reports_progress() {
        let mut strategy = ReconnectStrategy::new(ReconnectPolicy::default());
        strategy.next_delay();
        let status = strategy.status();
        assert!(status.contains("attempt 1/5"), "status was: {}", status);
    }
}
