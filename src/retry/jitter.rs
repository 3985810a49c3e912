//! Jittered backoff policies.
//!
//! Jitter spreads retry delays across callers so that a herd of failed
//! requests does not reconverge on the same instant. The random source is
//! an injected dependency: production code uses the thread-local generator,
//! tests supply a deterministic sequence and assert exact delays.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::retry::{RetryDecision, RetryPolicy};

/// Source of uniformly distributed delays for jittered policies.
pub trait RandomSource: Send + Sync {
    /// Uniform sample in `[min, max]` inclusive, in milliseconds.
    fn sample_millis(&self, min: u64, max: u64) -> u64;
}

/// Default source backed by the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn sample_millis(&self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        rand::rng().random_range(min..=max)
    }
}

/// Deterministic source replaying a fixed sequence, clamped into the
/// requested range. Cycles when the sequence is exhausted.
#[derive(Debug)]
pub struct SequenceSource {
    values: Vec<u64>,
    next: AtomicUsize,
}

impl SequenceSource {
    /// Build a source from raw millisecond samples.
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            next: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceSource {
    fn sample_millis(&self, min: u64, max: u64) -> u64 {
        if self.values.is_empty() || min >= max {
            return min;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[index].clamp(min, max)
    }
}

fn backoff_millis(base: Duration, iteration: u32) -> u64 {
    (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(iteration))
}

impl RetryPolicy {
    /// Full jitter: delay uniformly sampled in `[0, min(cap, base * 2^n)]`.
    ///
    /// ```rust
    /// use millrace::{RetryPolicy, SequenceSource};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let source = Arc::new(SequenceSource::new(vec![40]));
    /// let policy = RetryPolicy::full_jitter(
    ///     Duration::from_millis(100),
    ///     Duration::from_secs(10),
    ///     source,
    /// );
    /// let first = policy.simulate(2)[1].previous_delay().unwrap();
    /// assert_eq!(first, Duration::from_millis(40));
    /// ```
    pub fn full_jitter(base: Duration, cap: Duration, source: Arc<dyn RandomSource>) -> Self {
        let cap_millis = cap.as_millis() as u64;
        Self::from_fn(move |status| {
            let ceiling = backoff_millis(base, status.iteration()).min(cap_millis);
            let sampled = source.sample_millis(0, ceiling);
            RetryDecision::Retry(Duration::from_millis(sampled))
        })
    }

    /// Equal jitter: half the capped backoff is fixed, the other half is
    /// random. `delay = half + uniform(0, half)` where
    /// `half = min(cap, base * 2^n) / 2`.
    pub fn equal_jitter(base: Duration, cap: Duration, source: Arc<dyn RandomSource>) -> Self {
        let cap_millis = cap.as_millis() as u64;
        Self::from_fn(move |status| {
            let half = backoff_millis(base, status.iteration()).min(cap_millis) / 2;
            let sampled = half + source.sample_millis(0, half);
            RetryDecision::Retry(Duration::from_millis(sampled))
        })
    }

    /// Decorrelated jitter: `delay = min(cap, uniform(base, prev * 3))`,
    /// where `prev` starts at `base` on the first retry.
    pub fn decorrelated_jitter(
        base: Duration,
        cap: Duration,
        source: Arc<dyn RandomSource>,
    ) -> Self {
        let base_millis = base.as_millis() as u64;
        let cap_millis = cap.as_millis() as u64;
        Self::from_fn(move |status| {
            let previous = status
                .previous_delay()
                .map(|d| d.as_millis() as u64)
                .unwrap_or(base_millis);
            let sampled = source.sample_millis(base_millis, previous.saturating_mul(3));
            RetryDecision::Retry(Duration::from_millis(sampled.min(cap_millis)))
        })
    }
}
