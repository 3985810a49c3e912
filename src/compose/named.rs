//! Named-record composites.

use std::collections::HashMap;
use std::sync::Arc;

use super::Strategy;
use crate::effect::Effect;
use crate::retry::RetryPolicy;

/// Keyed child effects collected into a map.
///
/// Children are evaluated in declared order (sequentially or in
/// parallel, like [`Group`](super::Group)) and their values are inserted
/// in declared order, so a key declared twice keeps the later child's
/// value.
///
/// ```rust
/// use millrace::{Effect, Named};
///
/// # tokio_test::block_on(async {
/// let record = Named::parallel(vec![
///     ("width".to_string(), Effect::<_, String>::succeed(80)),
///     ("height".to_string(), Effect::succeed(24)),
/// ]);
///
/// let map = record.collect().run().await.unwrap();
/// assert_eq!(map["width"], 80);
/// assert_eq!(map["height"], 24);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct Named<T, E> {
    children: Vec<(String, Effect<T, E>)>,
    strategy: Strategy,
}

impl<T, E> Named<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Children run one at a time in declared order.
    pub fn sequential(children: Vec<(String, Effect<T, E>)>) -> Self {
        Self {
            children,
            strategy: Strategy::Sequential,
        }
    }

    /// All children start concurrently.
    pub fn parallel(children: Vec<(String, Effect<T, E>)>) -> Self {
        Self {
            children,
            strategy: Strategy::Parallel,
        }
    }

    /// Apply a retry policy independently to every child.
    pub fn retry_each(self, policy: RetryPolicy) -> Self {
        Self {
            children: self
                .children
                .into_iter()
                .map(|(key, child)| (key, child.retry(policy.clone())))
                .collect(),
            strategy: self.strategy,
        }
    }

    /// Like [`Named::retry_each`], retrying only errors matched by the
    /// predicate.
    pub fn retry_each_if<P>(self, predicate: P, policy: RetryPolicy) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Self {
            children: self
                .children
                .into_iter()
                .map(|(key, child)| {
                    let predicate = Arc::clone(&predicate);
                    (
                        key,
                        child.retry_if(move |error| predicate(error), policy.clone()),
                    )
                })
                .collect(),
            strategy: self.strategy,
        }
    }

    /// Collect into a key-value map, last-write-wins on duplicate keys.
    pub fn collect(self) -> Effect<HashMap<String, T>, E> {
        let children = self.children;
        match self.strategy {
            Strategy::Sequential => Effect::new(move || {
                let children = children.clone();
                async move {
                    let mut record = HashMap::with_capacity(children.len());
                    for (key, child) in &children {
                        record.insert(key.clone(), child.run().await?);
                    }
                    Ok(record)
                }
            }),
            Strategy::Parallel => Effect::new(move || {
                let children = children.clone();
                async move {
                    let running: Vec<_> =
                        children.iter().map(|(_, child)| child.run()).collect();
                    let outcomes = futures::future::join_all(running).await;
                    let mut record = HashMap::with_capacity(children.len());
                    for ((key, _), outcome) in children.iter().zip(outcomes) {
                        record.insert(key.clone(), outcome?);
                    }
                    Ok(record)
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_keys_to_values() {
        let record = Named::sequential(vec![
            ("a".to_string(), Effect::<_, String>::succeed(1)),
            ("b".to_string(), Effect::succeed(2)),
        ]);

        let map = record.collect().run().await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
    }

    #[tokio::test]
    async fn test_duplicate_key_last_write_wins() {
        let record = Named::parallel(vec![
            ("k".to_string(), Effect::<_, String>::succeed(1)),
            ("k".to_string(), Effect::succeed(2)),
        ]);

        let map = record.collect().run().await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["k"], 2);
    }

    #[tokio::test]
    async fn test_parallel_failure_in_declared_order() {
        let record = Named::parallel(vec![
            ("ok".to_string(), Effect::succeed(1)),
            ("bad".to_string(), Effect::fail("first declared".to_string())),
            (
                "worse".to_string(),
                Effect::fail("second declared".to_string()),
            ),
        ]);

        assert_eq!(
            record.collect().run().await,
            Err("first declared".to_string())
        );
    }

    #[tokio::test]
    async fn test_retry_each_recovers_flaky_child() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let flaky = Effect::from_fn(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 1 {
                Err("transient".to_string())
            } else {
                Ok(9)
            }
        });

        let record = Named::parallel(vec![("flaky".to_string(), flaky)])
            .retry_each(RetryPolicy::limit_retries(3));
        let map = record.collect().run().await.unwrap();
        assert_eq!(map["flaky"], 9);
    }
}
