//! Polling schedule for waiting on an extract.
//!
//! The wait loop sleeps, checks the status, and repeats. [`WaitPolicy`]
//! decides how long each sleep lasts and when to give up:
//!
//! ```text
//! delay(n) = min(initial * 2^(n-1), max_interval, timeout - elapsed)
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ipums_extract::api::{WaitDecision, WaitPolicy};
//!
//! let policy = WaitPolicy::default().with_max_polls(2);
//! assert_eq!(
//!     policy.next(0, Duration::ZERO),
//!     WaitDecision::Poll { delay: Duration::from_secs(1), poll: 1 }
//! );
//! assert!(matches!(policy.next(2, Duration::ZERO), WaitDecision::GiveUp { .. }));
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::constants::{INITIAL_POLL_INTERVAL, MAX_POLL_INTERVAL, WAIT_TIMEOUT};

/// Factor applied to the delay after every status check.
const BACKOFF_MULTIPLIER: u32 = 2;

/// What the wait loop should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitDecision {
    /// Sleep for `delay`, then perform status check number `poll` (1-indexed).
    Poll {
        /// How long to sleep before the check.
        delay: Duration,
        /// Which check this will be.
        poll: u32,
    },

    /// Stop waiting.
    GiveUp {
        /// Human-readable reason.
        reason: String,
    },
}

/// Backoff and budget for [`wait_for_extract_with`](super::IpumsApiClient::wait_for_extract_with).
///
/// # Default Values
///
/// - `initial_interval`: 1 second
/// - `max_interval`: 300 seconds
/// - `timeout`: 3 hours
/// - `max_polls`: unlimited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    initial_interval: Duration,
    max_interval: Duration,
    timeout: Duration,
    max_polls: Option<u32>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_interval: INITIAL_POLL_INTERVAL,
            max_interval: MAX_POLL_INTERVAL,
            timeout: WAIT_TIMEOUT,
            max_polls: None,
        }
    }
}

impl WaitPolicy {
    /// Creates a policy with explicit intervals and timeout. `max_interval`
    /// is raised to `initial_interval` if it is smaller.
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_interval,
            max_interval: max_interval.max(initial_interval),
            timeout,
            max_polls: None,
        }
    }

    /// Sets the total time budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the delay between checks.
    #[must_use]
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval.max(self.initial_interval);
        self
    }

    /// Limits the number of status checks.
    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Total time budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Status-check budget, if any.
    #[must_use]
    pub fn max_polls(&self) -> Option<u32> {
        self.max_polls
    }

    /// Decides the next step after `polls_done` checks and `elapsed` time.
    #[instrument(level = "trace", skip(self), fields(timeout = ?self.timeout))]
    pub fn next(&self, polls_done: u32, elapsed: Duration) -> WaitDecision {
        if let Some(max_polls) = self.max_polls
            && polls_done >= max_polls
        {
            debug!(polls_done, max_polls, "poll budget exhausted");
            return WaitDecision::GiveUp {
                reason: format!("poll budget ({max_polls}) exhausted"),
            };
        }

        let Some(remaining) = self.timeout.checked_sub(elapsed).filter(|r| !r.is_zero()) else {
            debug!(?elapsed, "wait timeout reached");
            return WaitDecision::GiveUp {
                reason: format!("timeout ({:?}) reached", self.timeout),
            };
        };

        let poll = polls_done.saturating_add(1);
        let delay = self.interval(poll).min(remaining);
        WaitDecision::Poll { delay, poll }
    }

    /// Backoff interval before check number `poll`, ignoring the timeout.
    fn interval(&self, poll: u32) -> Duration {
        let exponent = poll.saturating_sub(1);
        let factor = BACKOFF_MULTIPLIER.saturating_pow(exponent);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay_of(decision: &WaitDecision) -> Option<Duration> {
        match decision {
            WaitDecision::Poll { delay, .. } => Some(*delay),
            WaitDecision::GiveUp { .. } => None,
        }
    }

    #[test]
    fn test_default_policy_values() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.timeout(), Duration::from_secs(10_800));
        assert_eq!(policy.max_polls(), None);
    }

    #[test]
    fn test_delays_double_from_one_second() {
        let policy = WaitPolicy::default();
        let delays: Vec<Option<Duration>> = (0..4)
            .map(|done| delay_of(&policy.next(done, Duration::ZERO)))
            .collect();
        assert_eq!(
            delays,
            [1, 2, 4, 8].map(|s| Some(Duration::from_secs(s)))
        );
    }

    #[test]
    fn test_delay_is_capped_at_max_interval() {
        let policy = WaitPolicy::default();
        assert_eq!(
            delay_of(&policy.next(20, Duration::ZERO)),
            Some(Duration::from_secs(300))
        );
        // large poll counts must not overflow
        assert_eq!(
            delay_of(&policy.next(u32::MAX - 1, Duration::ZERO)),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_delay_never_exceeds_remaining_time() {
        let policy = WaitPolicy::default().with_timeout(Duration::from_secs(10));
        assert_eq!(
            delay_of(&policy.next(5, Duration::from_secs(7))),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_gives_up_after_timeout() {
        let policy = WaitPolicy::default().with_timeout(Duration::from_secs(10));
        let decision = policy.next(3, Duration::from_secs(10));
        assert!(matches!(decision, WaitDecision::GiveUp { ref reason } if reason.contains("timeout")));
    }

    #[test]
    fn test_gives_up_when_poll_budget_spent() {
        let policy = WaitPolicy::default().with_max_polls(3);
        assert!(matches!(policy.next(2, Duration::ZERO), WaitDecision::Poll { poll: 3, .. }));
        assert!(matches!(
            policy.next(3, Duration::ZERO),
            WaitDecision::GiveUp { ref reason } if reason.contains("budget")
        ));
    }

    #[test]
    fn test_max_interval_not_below_initial() {
        let policy = WaitPolicy::new(
            Duration::from_millis(50),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        assert_eq!(
            delay_of(&policy.next(4, Duration::ZERO)),
            Some(Duration::from_millis(50))
        );
    }
}
