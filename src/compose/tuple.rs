//! Heterogeneous tuple composites.
//!
//! [`Pair`] and [`Triple`] aggregate children of distinct types into an
//! ordered tuple, with the same strategy and failure semantics as
//! [`Group`](super::Group): sequential stops at the first failure,
//! parallel lets every child finish and reports the first failed child
//! in declared order.

use std::sync::Arc;

use super::Strategy;
use crate::effect::Effect;
use crate::retry::RetryPolicy;

/// Two child effects of distinct types collected into a tuple.
///
/// ```rust
/// use millrace::{Effect, Pair};
///
/// # tokio_test::block_on(async {
/// let pair = Pair::parallel(
///     Effect::<_, String>::succeed(1),
///     Effect::succeed("two".to_string()),
/// );
/// assert_eq!(pair.collect().run().await, Ok((1, "two".to_string())));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Pair<A, B, E> {
    first: Effect<A, E>,
    second: Effect<B, E>,
    strategy: Strategy,
}

impl<A, B, E> Pair<A, B, E>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
{
    /// The second child starts only after the first succeeds.
    pub fn sequential(first: Effect<A, E>, second: Effect<B, E>) -> Self {
        Self {
            first,
            second,
            strategy: Strategy::Sequential,
        }
    }

    /// Both children start concurrently.
    pub fn parallel(first: Effect<A, E>, second: Effect<B, E>) -> Self {
        Self {
            first,
            second,
            strategy: Strategy::Parallel,
        }
    }

    /// Apply a retry policy independently to each branch.
    pub fn retry_each(self, policy: RetryPolicy) -> Self {
        Self {
            first: self.first.retry(policy.clone()),
            second: self.second.retry(policy),
            strategy: self.strategy,
        }
    }

    /// Like [`Pair::retry_each`], retrying only errors matched by the
    /// predicate.
    pub fn retry_each_if<P>(self, predicate: P, policy: RetryPolicy) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let first_predicate = Arc::clone(&predicate);
        Self {
            first: self
                .first
                .retry_if(move |error| first_predicate(error), policy.clone()),
            second: self
                .second
                .retry_if(move |error| predicate(error), policy),
            strategy: self.strategy,
        }
    }

    /// Collect both success values, preserving declared order.
    pub fn collect(self) -> Effect<(A, B), E> {
        let first = self.first;
        let second = self.second;
        match self.strategy {
            Strategy::Sequential => Effect::new(move || {
                let first = first.clone();
                let second = second.clone();
                async move {
                    let a = first.run().await?;
                    let b = second.run().await?;
                    Ok((a, b))
                }
            }),
            Strategy::Parallel => Effect::new(move || {
                let first = first.clone();
                let second = second.clone();
                async move {
                    let (a, b) = futures::future::join(first.run(), second.run()).await;
                    Ok((a?, b?))
                }
            }),
        }
    }
}

/// Three child effects of distinct types collected into a tuple.
#[derive(Debug, Clone)]
pub struct Triple<A, B, C, E> {
    first: Effect<A, E>,
    second: Effect<B, E>,
    third: Effect<C, E>,
    strategy: Strategy,
}

impl<A, B, C, E> Triple<A, B, C, E>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
{
    /// Children start one at a time in declared order.
    pub fn sequential(first: Effect<A, E>, second: Effect<B, E>, third: Effect<C, E>) -> Self {
        Self {
            first,
            second,
            third,
            strategy: Strategy::Sequential,
        }
    }

    /// All three children start concurrently.
    pub fn parallel(first: Effect<A, E>, second: Effect<B, E>, third: Effect<C, E>) -> Self {
        Self {
            first,
            second,
            third,
            strategy: Strategy::Parallel,
        }
    }

    /// Apply a retry policy independently to each branch.
    pub fn retry_each(self, policy: RetryPolicy) -> Self {
        Self {
            first: self.first.retry(policy.clone()),
            second: self.second.retry(policy.clone()),
            third: self.third.retry(policy),
            strategy: self.strategy,
        }
    }

    /// Like [`Triple::retry_each`], retrying only errors matched by the
    /// predicate.
    pub fn retry_each_if<P>(self, predicate: P, policy: RetryPolicy) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let first_predicate = Arc::clone(&predicate);
        let second_predicate = Arc::clone(&predicate);
        Self {
            first: self
                .first
                .retry_if(move |error| first_predicate(error), policy.clone()),
            second: self
                .second
                .retry_if(move |error| second_predicate(error), policy.clone()),
            third: self
                .third
                .retry_if(move |error| predicate(error), policy),
            strategy: self.strategy,
        }
    }

    /// Collect all three success values, preserving declared order.
    pub fn collect(self) -> Effect<(A, B, C), E> {
        let first = self.first;
        let second = self.second;
        let third = self.third;
        match self.strategy {
            Strategy::Sequential => Effect::new(move || {
                let first = first.clone();
                let second = second.clone();
                let third = third.clone();
                async move {
                    let a = first.run().await?;
                    let b = second.run().await?;
                    let c = third.run().await?;
                    Ok((a, b, c))
                }
            }),
            Strategy::Parallel => Effect::new(move || {
                let first = first.clone();
                let second = second.clone();
                let third = third.clone();
                async move {
                    let (a, b, c) =
                        futures::future::join3(first.run(), second.run(), third.run()).await;
                    Ok((a?, b?, c?))
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pair_mixed_types() {
        let pair = Pair::sequential(
            Effect::<_, String>::succeed(42),
            Effect::succeed("answer".to_string()),
        );
        assert_eq!(pair.collect().run().await, Ok((42, "answer".to_string())));
    }

    #[tokio::test]
    async fn test_sequential_pair_skips_second_on_failure() {
        let started = Arc::new(AtomicU32::new(0));
        let witness = Arc::clone(&started);
        let pair = Pair::sequential(
            Effect::<i32, _>::fail("first failed"),
            Effect::<i32, &str>::lazy(move || {
                witness.fetch_add(1, Ordering::SeqCst);
                2
            }),
        );

        assert_eq!(pair.collect().run().await, Err("first failed"));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_pair_reports_first_declared_failure() {
        let slow_failure: Effect<i32, String> = Effect::from_async(|| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err("first".to_string())
        });
        let fast_failure: Effect<String, String> =
            Effect::from_async(|| async { Err("second".to_string()) });

        let pair = Pair::parallel(slow_failure, fast_failure);
        assert_eq!(pair.collect().run().await, Err("first".to_string()));
    }

    #[tokio::test]
    async fn test_pair_retry_each_recovers_each_branch() {
        fn flaky(counter: &Arc<AtomicU32>, failures: u32, value: u32) -> Effect<u32, String> {
            let counter = Arc::clone(counter);
            Effect::from_fn(move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt < failures {
                    Err(format!("attempt {attempt}"))
                } else {
                    Ok(value)
                }
            })
        }

        let left_runs = Arc::new(AtomicU32::new(0));
        let right_runs = Arc::new(AtomicU32::new(0));
        let pair = Pair::parallel(flaky(&left_runs, 2, 1), flaky(&right_runs, 2, 2))
            .retry_each(RetryPolicy::limit_retries(2));

        assert_eq!(pair.collect().run().await, Ok((1, 2)));
        assert_eq!(left_runs.load(Ordering::SeqCst), 3);
        assert_eq!(right_runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pair_retry_each_if_skips_unmatched_errors() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let failing: Effect<u32, String> = Effect::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("fatal".to_string())
        });

        let pair = Pair::sequential(failing, Effect::succeed(2)).retry_each_if(
            |e| e.contains("transient"),
            RetryPolicy::limit_retries(5),
        );
        assert_eq!(pair.collect().run().await, Err("fatal".to_string()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_triple_parallel_preserves_declared_order() {
        fn delayed<T: Clone + Send + Sync + 'static>(ms: u64, value: T) -> Effect<T, String> {
            Effect::from_async(move || {
                let value = value.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(value)
                }
            })
        }

        let triple = Triple::parallel(delayed(30, 1u32), delayed(5, "mid"), delayed(15, 2.5f64));
        assert_eq!(triple.collect().run().await, Ok((1, "mid", 2.5)));
    }
}
