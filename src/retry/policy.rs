//! Retry policy algebra.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::RetryStatus;

/// What a policy tells the executor to do at a given [`RetryStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then run the effect again.
    Retry(Duration),
    /// Stop retrying and surface the last failure.
    GiveUp,
}

impl RetryDecision {
    /// The delay if this decision retries, `None` if it gives up.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::Retry(d) => Some(*d),
            RetryDecision::GiveUp => None,
        }
    }

    /// Returns true if this decision retries.
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry(_))
    }
}

type DecideFn = dyn Fn(&RetryStatus) -> RetryDecision + Send + Sync;

/// A retry policy: a pure function from [`RetryStatus`] to [`RetryDecision`].
///
/// Policies are immutable values. Every combinator returns a new policy and
/// leaves its inputs untouched, so a policy can be cloned freely and shared
/// between effects, composites, and deployments.
///
/// Because a policy is pure, its behavior can be inspected offline with
/// [`RetryPolicy::simulate`] instead of running real effects against a
/// real clock.
///
/// # Examples
///
/// ```rust
/// use millrace::RetryPolicy;
/// use std::time::Duration;
///
/// // Exponential backoff, at most 5 retries, never more than 2s per delay.
/// let policy = RetryPolicy::exponential_backoff(Duration::from_millis(100))
///     .append(RetryPolicy::limit_retries(5))
///     .cap_delay(Duration::from_secs(2));
///
/// let statuses = policy.simulate(10);
/// assert_eq!(statuses.len(), 6); // initial status + 5 retries
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    decide: Arc<DecideFn>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("decide", &"<function>")
            .finish()
    }
}

impl RetryPolicy {
    /// Build a policy from a raw decision function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RetryStatus) -> RetryDecision + Send + Sync + 'static,
    {
        Self { decide: Arc::new(f) }
    }

    /// Evaluate the policy at a status.
    pub fn decide(&self, status: &RetryStatus) -> RetryDecision {
        (self.decide)(status)
    }

    // ---- base policies ----

    /// Retry up to `n` times with no delay, then give up.
    ///
    /// Usually combined with a backoff shape via [`RetryPolicy::append`].
    ///
    /// ```rust
    /// use millrace::RetryPolicy;
    ///
    /// let policy = RetryPolicy::limit_retries(2);
    /// assert_eq!(policy.simulate(10).len(), 3); // initial + 2 retries
    /// ```
    pub fn limit_retries(n: u32) -> Self {
        Self::from_fn(move |status| {
            if status.iteration() < n {
                RetryDecision::Retry(Duration::ZERO)
            } else {
                RetryDecision::GiveUp
            }
        })
    }

    /// Always retry with a fixed delay.
    pub fn constant_delay(delay: Duration) -> Self {
        Self::from_fn(move |_| RetryDecision::Retry(delay))
    }

    /// Delay grows linearly: `previous_delay + base`, starting at `base`.
    pub fn incremental_delay(base: Duration) -> Self {
        Self::from_fn(move |status| {
            let previous = status.previous_delay().unwrap_or(Duration::ZERO);
            RetryDecision::Retry(previous.saturating_add(base))
        })
    }

    /// Delay doubles each attempt: `base * 2^iteration`.
    ///
    /// ```rust
    /// use millrace::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential_backoff(Duration::from_millis(100))
    ///     .append(RetryPolicy::limit_retries(3));
    ///
    /// let delays: Vec<_> = policy
    ///     .simulate(10)
    ///     .iter()
    ///     .filter_map(|s| s.previous_delay())
    ///     .collect();
    /// assert_eq!(
    ///     delays,
    ///     vec![
    ///         Duration::from_millis(100),
    ///         Duration::from_millis(200),
    ///         Duration::from_millis(400),
    ///     ]
    /// );
    /// ```
    pub fn exponential_backoff(base: Duration) -> Self {
        Self::from_fn(move |status| {
            RetryDecision::Retry(base.saturating_mul(2u32.saturating_pow(status.iteration())))
        })
    }

    // ---- combinators ----

    /// Logical AND of two policies.
    ///
    /// Continues only if both continue; the resulting delay is the max of
    /// the two computed delays. The standard way to combine a count limit
    /// with a backoff shape.
    pub fn append(self, other: RetryPolicy) -> Self {
        Self::from_fn(move |status| {
            match (self.decide(status), other.decide(status)) {
                (RetryDecision::Retry(a), RetryDecision::Retry(b)) => {
                    RetryDecision::Retry(a.max(b))
                }
                _ => RetryDecision::GiveUp,
            }
        })
    }

    /// Clamp every computed delay to `max`.
    pub fn cap_delay(self, max: Duration) -> Self {
        Self::from_fn(move |status| match self.decide(status) {
            RetryDecision::Retry(d) => RetryDecision::Retry(d.min(max)),
            RetryDecision::GiveUp => RetryDecision::GiveUp,
        })
    }

    /// Give up once the next computed delay would exceed `max`.
    pub fn limit_retries_by_delay(self, max: Duration) -> Self {
        Self::from_fn(move |status| match self.decide(status) {
            RetryDecision::Retry(d) if d <= max => RetryDecision::Retry(d),
            _ => RetryDecision::GiveUp,
        })
    }

    /// Give up once the cumulative delay plus the next delay would
    /// exceed `max`.
    pub fn limit_retries_by_cumulative_delay(self, max: Duration) -> Self {
        Self::from_fn(move |status| match self.decide(status) {
            RetryDecision::Retry(d)
                if status.cumulative_delay().saturating_add(d) <= max =>
            {
                RetryDecision::Retry(d)
            }
            _ => RetryDecision::GiveUp,
        })
    }

    /// Run `self` until it first gives up, then consult `other` for all
    /// subsequent attempts.
    ///
    /// The same [`RetryStatus`] keeps advancing across the switch; the
    /// iteration count and cumulative delay are not reset.
    pub fn followed_by(self, other: RetryPolicy) -> Self {
        Self::from_fn(move |status| match self.decide(status) {
            RetryDecision::Retry(d) => RetryDecision::Retry(d),
            RetryDecision::GiveUp => other.decide(status),
        })
    }

    /// Replay the policy against a synthetic status sequence, without
    /// executing anything or sleeping.
    ///
    /// Returns the ordered statuses the executor would observe: the
    /// initial status, then one advanced status per allowed retry. The
    /// sequence stops when the policy gives up or `max_attempts` entries
    /// have been produced.
    pub fn simulate(&self, max_attempts: usize) -> Vec<RetryStatus> {
        let mut statuses = Vec::new();
        if max_attempts == 0 {
            return statuses;
        }
        let mut current = RetryStatus::initial();
        statuses.push(current.clone());

        while statuses.len() < max_attempts {
            match self.decide(&current) {
                RetryDecision::Retry(delay) => {
                    current = current.advanced_by(delay);
                    statuses.push(current.clone());
                }
                RetryDecision::GiveUp => break,
            }
        }
        statuses
    }
}
