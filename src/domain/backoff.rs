use std::time::Duration;

/// Consecutive-failure counter for the reconnection supervisor. Resets on any
/// successful connection; the attempt number feeds the delay schedule.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconnectionState {
    attempt: u32,
}

impl ReconnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn record_failure(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    pub fn record_success(&mut self) {
        self.attempt = 0;
    }
}

/// `min(base * 2^attempt, max)`, saturating well before the shift can
/// overflow. Attempt numbers are 1-based for the first failed connection.
pub fn reconnect_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let max_ms = max.as_millis().max(1) as u64;
    let shift = attempt.min(20);
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt_until_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);

        assert_eq!(reconnect_delay(base, max, 1), Duration::from_secs(2));
        assert_eq!(reconnect_delay(base, max, 2), Duration::from_secs(4));
        assert_eq!(reconnect_delay(base, max, 3), Duration::from_secs(8));
        assert_eq!(reconnect_delay(base, max, 4), Duration::from_secs(16));
        assert_eq!(reconnect_delay(base, max, 5), Duration::from_secs(30));
        assert_eq!(reconnect_delay(base, max, 6), Duration::from_secs(30));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let delay = reconnect_delay(Duration::from_secs(1), Duration::from_secs(30), u32::MAX);
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn counter_resets_after_success() {
        let mut reconnection = ReconnectionState::new();
        assert_eq!(reconnection.record_failure(), 1);
        assert_eq!(reconnection.record_failure(), 2);

        reconnection.record_success();
        assert_eq!(reconnection.attempt(), 0);

        // The failure after a reset is attempt 1 again, i.e. base * 2^1.
        assert_eq!(reconnection.record_failure(), 1);
        assert_eq!(
            reconnect_delay(
                Duration::from_secs(1),
                Duration::from_secs(30),
                reconnection.attempt()
            ),
            Duration::from_secs(2)
        );
    }
}
