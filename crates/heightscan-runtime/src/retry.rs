//! [`AcquisitionRetry`] – consecutive acquisition-failure tracker.
//!
//! The processing loop records every failed and successful frame wait. A run
//! of failures is retried with exponential backoff until it exceeds the
//! configured limit, at which point the loop gives up and stops.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use heightscan_runtime::retry::{AcquisitionRetry, RetryDecision};
//!
//! let mut retry = AcquisitionRetry::new(2, Duration::from_millis(50), Duration::from_secs(1));
//!
//! assert_eq!(
//!     retry.record_failure(),
//!     RetryDecision::Retry { attempt: 1, backoff: Duration::from_millis(50) }
//! );
//! assert_eq!(
//!     retry.record_failure(),
//!     RetryDecision::Retry { attempt: 2, backoff: Duration::from_millis(100) }
//! );
//! assert_eq!(retry.record_failure(), RetryDecision::GiveUp { failures: 3 });
//!
//! // A successful frame clears the run.
//! retry.record_success();
//! assert!(matches!(retry.record_failure(), RetryDecision::Retry { attempt: 1, .. }));
//! ```

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// RetryDecision
// ─────────────────────────────────────────────────────────────────────────────

/// What the loop should do after a failed acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `backoff`, then try again.
    Retry { attempt: u32, backoff: Duration },
    /// The failure run exceeded the limit.
    GiveUp { failures: u32 },
}

// ─────────────────────────────────────────────────────────────────────────────
// AcquisitionRetry
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks a run of consecutive acquisition failures.
pub struct AcquisitionRetry {
    /// Number of consecutive failures that are retried before giving up.
    max_retries: u32,
    base: Duration,
    cap: Duration,
    consecutive: u32,
}

impl AcquisitionRetry {
    /// Create a tracker.
    ///
    /// The `n`-th consecutive failure waits `base * 2^(n-1)`, capped at
    /// `cap`. Failure number `max_retries + 1` gives up.
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            base,
            cap,
            consecutive: 0,
        }
    }

    /// Record a failed frame wait.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive > self.max_retries {
            return RetryDecision::GiveUp {
                failures: self.consecutive,
            };
        }
        RetryDecision::Retry {
            attempt: self.consecutive,
            backoff: self.backoff_for(self.consecutive),
        }
    }

    /// Record a delivered frame, ending any failure run.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Length of the current failure run.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << shift)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(max: u32) -> AcquisitionRetry {
        AcquisitionRetry::new(max, Duration::from_millis(50), Duration::from_secs(1))
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let mut r = retry(10);
        let waits: Vec<u64> = (0..7)
            .map(|_| match r.record_failure() {
                RetryDecision::Retry { backoff, .. } => backoff.as_millis() as u64,
                RetryDecision::GiveUp { .. } => panic!("gave up too early"),
            })
            .collect();
        assert_eq!(waits, vec![50, 100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn gives_up_after_limit() {
        let mut r = retry(3);
        for _ in 0..3 {
            assert!(matches!(r.record_failure(), RetryDecision::Retry { .. }));
        }
        assert_eq!(r.record_failure(), RetryDecision::GiveUp { failures: 4 });
        assert_eq!(r.consecutive_failures(), 4);
    }

    #[test]
    fn zero_retries_gives_up_immediately() {
        let mut r = retry(0);
        assert_eq!(r.record_failure(), RetryDecision::GiveUp { failures: 1 });
    }

    #[test]
    fn success_resets_the_run() {
        let mut r = retry(1);
        assert!(matches!(r.record_failure(), RetryDecision::Retry { .. }));
        r.record_success();
        assert_eq!(r.consecutive_failures(), 0);
        assert!(matches!(r.record_failure(), RetryDecision::Retry { .. }));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let r = AcquisitionRetry::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(r.backoff_for(u32::MAX), Duration::from_secs(5));
    }
}
