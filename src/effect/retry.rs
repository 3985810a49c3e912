//! Retry operators for [`Effect`].
//!
//! Retry leans on effects being cold: re-executing the whole description
//! is always safe because nothing from the failed attempt is retained.
//! Each execution of a retried effect carries its own [`RetryStatus`],
//! starting at iteration zero; concurrent executions never share state.

use std::sync::Arc;
use std::time::Duration;

use super::Effect;
use crate::clock::{default_clock, Clock};
use crate::retry::{RetryDecision, RetryPolicy, RetryStatus, TimeoutError};

impl<T, E> Effect<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Retry the whole effect according to a policy.
    ///
    /// On failure the policy is consulted with the current status. A
    /// `Retry` decision sleeps for the prescribed delay and re-executes
    /// the effect from scratch. Once the policy gives up, the last
    /// underlying error surfaces unchanged.
    ///
    /// ```rust
    /// use millrace::{Effect, RetryPolicy};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// # tokio_test::block_on(async {
    /// let attempts = Arc::new(AtomicU32::new(0));
    /// let counter = Arc::clone(&attempts);
    /// let flaky = Effect::from_fn(move || {
    ///     if counter.fetch_add(1, Ordering::SeqCst) < 2 {
    ///         Err("not yet")
    ///     } else {
    ///         Ok("done")
    ///     }
    /// });
    ///
    /// let result = flaky.retry(RetryPolicy::limit_retries(3)).run().await;
    /// assert_eq!(result, Ok("done"));
    /// assert_eq!(attempts.load(Ordering::SeqCst), 3);
    /// # });
    /// ```
    pub fn retry(self, policy: RetryPolicy) -> Effect<T, E> {
        self.retry_with_clock(policy, default_clock())
    }

    /// Like [`Effect::retry`] with an injected clock for the delays.
    pub fn retry_with_clock(self, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Effect<T, E> {
        Effect::new(move || {
            let effect = self.clone();
            let policy = policy.clone();
            let clock = Arc::clone(&clock);
            async move {
                let mut status = RetryStatus::initial();
                loop {
                    match effect.run().await {
                        Ok(value) => return Ok(value),
                        Err(error) => match policy.decide(&status) {
                            RetryDecision::Retry(delay) => {
                                tracing::debug!(
                                    iteration = status.iteration(),
                                    delay_ms = delay.as_millis() as u64,
                                    "retrying failed effect"
                                );
                                clock.sleep(delay).await;
                                status = status.advanced_by(delay);
                            }
                            RetryDecision::GiveUp => {
                                tracing::debug!(
                                    iteration = status.iteration(),
                                    "retry policy gave up"
                                );
                                return Err(error);
                            }
                        },
                    }
                }
            }
        })
    }

    /// Retry only failures matched by a predicate.
    ///
    /// Errors the predicate rejects surface immediately without
    /// consulting the policy.
    pub fn retry_if<P>(self, predicate: P, policy: RetryPolicy) -> Effect<T, E>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let clock = default_clock();
        Effect::new(move || {
            let effect = self.clone();
            let policy = policy.clone();
            let predicate = Arc::clone(&predicate);
            let clock = Arc::clone(&clock);
            async move {
                let mut status = RetryStatus::initial();
                loop {
                    match effect.run().await {
                        Ok(value) => return Ok(value),
                        Err(error) => {
                            if !predicate(&error) {
                                return Err(error);
                            }
                            match policy.decide(&status) {
                                RetryDecision::Retry(delay) => {
                                    clock.sleep(delay).await;
                                    status = status.advanced_by(delay);
                                }
                                RetryDecision::GiveUp => return Err(error),
                            }
                        }
                    }
                }
            }
        })
    }

    /// Re-execute while a success satisfies the predicate.
    ///
    /// A value matching `should_repeat` is treated as a retry signal.
    /// The effect terminates with the first value that does not match,
    /// or with `exhausted(last_value)` once the policy stops. A genuine
    /// failure surfaces immediately, without consulting the policy.
    ///
    /// ```rust
    /// use millrace::{Effect, RetryPolicy};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// # tokio_test::block_on(async {
    /// let polls = Arc::new(AtomicU32::new(0));
    /// let counter = Arc::clone(&polls);
    /// let poll = Effect::<_, String>::lazy(move || counter.fetch_add(1, Ordering::SeqCst));
    ///
    /// // Repeat while the value is below 3.
    /// let result = poll
    ///     .repeat(
    ///         |n| *n < 3,
    ///         RetryPolicy::limit_retries(10),
    ///         |n| format!("stuck at {n}"),
    ///     )
    ///     .run()
    ///     .await;
    /// assert_eq!(result, Ok(3));
    /// # });
    /// ```
    pub fn repeat<P, X>(self, should_repeat: P, policy: RetryPolicy, exhausted: X) -> Effect<T, E>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        X: Fn(T) -> E + Send + Sync + 'static,
    {
        let should_repeat = Arc::new(should_repeat);
        let exhausted = Arc::new(exhausted);
        let clock = default_clock();
        Effect::new(move || {
            let effect = self.clone();
            let policy = policy.clone();
            let should_repeat = Arc::clone(&should_repeat);
            let exhausted = Arc::clone(&exhausted);
            let clock = Arc::clone(&clock);
            async move {
                let mut status = RetryStatus::initial();
                loop {
                    let value = effect.run().await?;
                    if !should_repeat(&value) {
                        return Ok(value);
                    }
                    match policy.decide(&status) {
                        RetryDecision::Retry(delay) => {
                            clock.sleep(delay).await;
                            status = status.advanced_by(delay);
                        }
                        RetryDecision::GiveUp => return Err(exhausted(value)),
                    }
                }
            }
        })
    }

    /// Bound an execution by a deadline.
    ///
    /// Completes with `TimeoutError::Timeout` when the deadline elapses
    /// first, otherwise wraps the underlying outcome.
    pub fn with_timeout(self, duration: Duration) -> Effect<T, TimeoutError<E>> {
        Effect::new(move || {
            let effect = self.clone();
            async move {
                match tokio::time::timeout(duration, effect.run()).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(TimeoutError::Inner(error)),
                    Err(_) => Err(TimeoutError::Timeout { duration }),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn failing_until(succeed_on: u32) -> (Effect<u32, String>, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let effect = Effect::from_fn(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            if attempt + 1 < succeed_on {
                Err(format!("attempt {attempt} failed"))
            } else {
                Ok(attempt)
            }
        });
        (effect, attempts)
    }

    #[tokio::test]
    async fn test_retry_succeeds_within_budget() {
        let (effect, attempts) = failing_until(3);
        let result = effect.retry(RetryPolicy::limit_retries(5)).run().await;
        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_last_error() {
        let (effect, attempts) = failing_until(10);
        let result = effect.retry(RetryPolicy::limit_retries(2)).run().await;
        assert_eq!(result, Err("attempt 2 failed".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_waits_between_attempts() {
        let (effect, _) = failing_until(3);
        let policy = RetryPolicy::constant_delay(Duration::from_millis(30))
            .append(RetryPolicy::limit_retries(5));

        let start = Instant::now();
        let result = effect.retry(policy).run().await;
        assert_eq!(result, Ok(2));
        // Two retries at 30 ms each.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[tokio::test]
    async fn test_retried_executions_have_independent_status() {
        let (effect, attempts) = failing_until(3);
        let retried = effect.retry(RetryPolicy::limit_retries(5));

        assert_eq!(retried.run().await, Ok(2));
        // The second execution starts over at iteration 0 and succeeds
        // immediately since the shared counter is already past the
        // failure window.
        assert_eq!(retried.run().await, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_if_skips_unmatched_errors() {
        let (effect, attempts) = failing_until(5);
        let result = effect
            .retry_if(|e| e.contains("recoverable"), RetryPolicy::limit_retries(5))
            .run()
            .await;
        assert_eq!(result, Err("attempt 0 failed".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_if_retries_matched_errors() {
        let (effect, attempts) = failing_until(3);
        let result = effect
            .retry_if(|e| e.contains("failed"), RetryPolicy::limit_retries(5))
            .run()
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_repeat_stops_at_first_non_matching_value() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&polls);
        let effect = Effect::<_, String>::lazy(move || counter.fetch_add(1, Ordering::SeqCst));

        let result = effect
            .repeat(|n| *n < 4, RetryPolicy::limit_retries(10), |n| {
                format!("stuck at {n}")
            })
            .run()
            .await;
        assert_eq!(result, Ok(4));
        assert_eq!(polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_repeat_exhaustion_maps_last_value() {
        let effect = Effect::<_, String>::succeed(7u32);
        let result = effect
            .repeat(|n| *n == 7, RetryPolicy::limit_retries(2), |n| {
                format!("stuck at {n}")
            })
            .run()
            .await;
        assert_eq!(result, Err("stuck at 7".to_string()));
    }

    #[tokio::test]
    async fn test_repeat_surfaces_genuine_failure() {
        let effect = Effect::<u32, _>::fail("broken".to_string());
        let result = effect
            .repeat(|_| true, RetryPolicy::limit_retries(10), |_| {
                "exhausted".to_string()
            })
            .run()
            .await;
        assert_eq!(result, Err("broken".to_string()));
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let slow: Effect<i32, String> = Effect::from_async(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        });

        let result = slow.with_timeout(Duration::from_millis(50)).run().await;
        match result {
            Err(err) => assert!(err.is_timeout()),
            Ok(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through_completion() {
        let fast = Effect::<_, String>::succeed(42);
        let result = fast.with_timeout(Duration::from_secs(1)).run().await;
        assert_eq!(result.ok(), Some(42));

        let failing = Effect::<i32, _>::fail("inner".to_string());
        let result = failing.with_timeout(Duration::from_secs(1)).run().await;
        match result {
            Err(err) => assert_eq!(err.into_inner(), Some("inner".to_string())),
            Ok(_) => panic!("expected inner failure"),
        }
    }
}
