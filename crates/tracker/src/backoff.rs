// crates/tracker/src/backoff.rs
//! Consecutive-failure tracking and interval backoff for one job.

use std::time::Duration;

/// Polling stops for a job after this many consecutive failures.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Backed-off intervals never exceed this.
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(60);

/// The multiplier doubles per failure up to this cap.
const MAX_MULTIPLIER: u32 = 8;

/// Transient per-job error state. Reset on any successful poll and
/// discarded when polling stops.
#[derive(Debug, Clone, Default)]
pub struct ErrorTracking {
    consecutive: u32,
    /// Epoch ms of the most recent failure, for diagnostics.
    last_error_at: Option<i64>,
}

impl ErrorTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed poll. Returns the new consecutive-failure count.
    pub fn record_failure(&mut self, now: i64) -> u32 {
        self.consecutive += 1;
        self.last_error_at = Some(now);
        self.consecutive
    }

    /// A single success resets the streak entirely.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
        self.last_error_at = None;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn exhausted(&self) -> bool {
        self.consecutive >= MAX_CONSECUTIVE_FAILURES
    }

    /// Current multiplier: 1 with no failures, doubling per failure,
    /// capped.
    pub fn multiplier(&self) -> u32 {
        1u32.checked_shl(self.consecutive)
            .unwrap_or(MAX_MULTIPLIER)
            .min(MAX_MULTIPLIER)
    }

    /// Scale a base poll interval by the current multiplier, capped at
    /// [`MAX_BACKOFF_INTERVAL`].
    pub fn scaled(&self, base: Duration) -> Duration {
        (base * self.multiplier()).min(MAX_BACKOFF_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_doubles_and_caps() {
        let mut errors = ErrorTracking::new();
        assert_eq!(errors.multiplier(), 1);

        errors.record_failure(1);
        assert_eq!(errors.multiplier(), 2);
        errors.record_failure(2);
        assert_eq!(errors.multiplier(), 4);
        errors.record_failure(3);
        assert_eq!(errors.multiplier(), 8);
        errors.record_failure(4);
        assert_eq!(errors.multiplier(), 8);
    }

    #[test]
    fn success_resets_streak() {
        let mut errors = ErrorTracking::new();
        for i in 0..5 {
            errors.record_failure(i);
        }
        assert_eq!(errors.consecutive(), 5);

        errors.record_success();
        assert_eq!(errors.consecutive(), 0);
        assert_eq!(errors.multiplier(), 1);
    }

    #[test]
    fn scaled_interval_caps_at_sixty_seconds() {
        let mut errors = ErrorTracking::new();
        let base = Duration::from_secs(30);
        assert_eq!(errors.scaled(base), Duration::from_secs(30));

        errors.record_failure(1);
        assert_eq!(errors.scaled(base), Duration::from_secs(60));
        errors.record_failure(2);
        assert_eq!(errors.scaled(base), Duration::from_secs(60));
    }

    #[test]
    fn exhausted_after_ten_failures() {
        let mut errors = ErrorTracking::new();
        for i in 0..9 {
            errors.record_failure(i);
            assert!(!errors.exhausted());
        }
        errors.record_failure(9);
        assert!(errors.exhausted());
    }
}
