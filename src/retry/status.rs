//! Retry attempt state.

use std::time::Duration;

/// The state of one retry sequence.
///
/// A fresh execution starts at iteration 0 with no previous delay and zero
/// cumulative delay. Each retry advances the status by one iteration,
/// recording the delay that was slept before the attempt.
///
/// `RetryStatus` is pure data. Policies read it, the retry executor
/// advances it, and `RetryPolicy::simulate` produces sequences of it
/// without running anything.
///
/// # Examples
///
/// ```rust
/// use millrace::RetryStatus;
/// use std::time::Duration;
///
/// let status = RetryStatus::initial();
/// assert_eq!(status.iteration(), 0);
/// assert_eq!(status.previous_delay(), None);
///
/// let next = status.advanced_by(Duration::from_millis(100));
/// assert_eq!(next.iteration(), 1);
/// assert_eq!(next.previous_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(next.cumulative_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStatus {
    iteration: u32,
    previous_delay: Option<Duration>,
    cumulative_delay: Duration,
}

impl RetryStatus {
    /// The status of a fresh execution: iteration 0, no delays recorded.
    pub fn initial() -> Self {
        Self {
            iteration: 0,
            previous_delay: None,
            cumulative_delay: Duration::ZERO,
        }
    }

    /// How many retries have already happened (0 for the first attempt).
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// The delay slept before the current attempt, if any.
    pub fn previous_delay(&self) -> Option<Duration> {
        self.previous_delay
    }

    /// Total delay accumulated across all retries so far.
    pub fn cumulative_delay(&self) -> Duration {
        self.cumulative_delay
    }

    /// The status after one more retry that slept `delay`.
    pub fn advanced_by(&self, delay: Duration) -> Self {
        Self {
            iteration: self.iteration.saturating_add(1),
            previous_delay: Some(delay),
            cumulative_delay: self.cumulative_delay.saturating_add(delay),
        }
    }
}

impl Default for RetryStatus {
    fn default() -> Self {
        Self::initial()
    }
}
