//! Capped exponential reconnect delay.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Yields `initial`, then doubles on every call until `max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            next: policy.initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.policy.max);
        self.next = delay.saturating_mul(2).min(self.policy.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.policy.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn doubles_up_to_cap() {
        let mut b = Backoff::new(BackoffPolicy { initial: ms(500), max: ms(3000) });
        let delays: Vec<_> = (0..6).map(|_| b.next_delay()).collect();
        assert_eq!(delays, vec![ms(500), ms(1000), ms(2000), ms(3000), ms(3000), ms(3000)]);
    }

    #[test]
    fn reset_starts_over() {
        let mut b = Backoff::new(BackoffPolicy::default());
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), ms(500));
    }

    #[test]
    fn initial_above_max_is_clamped() {
        let mut b = Backoff::new(BackoffPolicy { initial: ms(50), max: ms(10) });
        assert_eq!(b.next_delay(), ms(10));
    }
}
