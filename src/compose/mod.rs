//! Structural composition of effects.
//!
//! A composite runs several child effects under one evaluation strategy
//! and aggregates their outcomes:
//!
//! - [`Group`]: N children of one type, collected into an ordered `Vec`
//!   (or reduced to a boolean, see [`Group::all`] / [`Group::any`])
//! - [`Pair`] / [`Triple`]: two or three children of distinct types,
//!   collected into a tuple in declared order
//! - [`Named`]: keyed children collected into a map, last-write-wins on
//!   duplicate keys
//!
//! Every composite offers sequential evaluation (children start one at a
//! time; a failure stops the chain and unstarted children never run) and
//! parallel evaluation (all children start together; the composite
//! completes only after every child has a terminal outcome, and the
//! reported failure is the first failed child in declared order, not
//! completion order; siblings are never cancelled).
//!
//! # Retrying composites
//!
//! Two distinct forms, with very different cost profiles:
//!
//! - `collect().retry(policy)` re-executes all children from scratch on
//!   each attempt.
//! - [`retry_each`](Group::retry_each) applies the policy at each leaf
//!   with its own [`RetryStatus`](crate::RetryStatus), so a sibling that
//!   already succeeded is never re-run. Prefer this for parallel groups
//!   with costly children.
//!
//! ```rust
//! use millrace::{Effect, Group, RetryPolicy};
//!
//! # tokio_test::block_on(async {
//! let group = Group::parallel(vec![
//!     Effect::<_, String>::succeed(1),
//!     Effect::succeed(2),
//!     Effect::succeed(3),
//! ]);
//!
//! let values = group.retry_each(RetryPolicy::limit_retries(2)).collect();
//! assert_eq!(values.run().await, Ok(vec![1, 2, 3]));
//! # });
//! ```

mod boolean;
mod named;
mod tuple;

pub use named::Named;
pub use tuple::{Pair, Triple};

use std::sync::Arc;

use crate::effect::Effect;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Sequential,
    Parallel,
}

/// A homogeneous group of child effects evaluated under one strategy.
#[derive(Debug, Clone)]
pub struct Group<T, E> {
    children: Vec<Effect<T, E>>,
    strategy: Strategy,
}

impl<T, E> Group<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// A group whose children run one at a time in declared order.
    pub fn sequential(children: Vec<Effect<T, E>>) -> Self {
        Self {
            children,
            strategy: Strategy::Sequential,
        }
    }

    /// A group whose children all start concurrently.
    pub fn parallel(children: Vec<Effect<T, E>>) -> Self {
        Self {
            children,
            strategy: Strategy::Parallel,
        }
    }

    /// Apply a retry policy independently to every child.
    ///
    /// Each child carries its own retry state, so a child that already
    /// succeeded is not re-run when a sibling fails and retries.
    pub fn retry_each(self, policy: RetryPolicy) -> Self {
        Self {
            children: self
                .children
                .into_iter()
                .map(|child| child.retry(policy.clone()))
                .collect(),
            strategy: self.strategy,
        }
    }

    /// Like [`Group::retry_each`], retrying only errors matched by the
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
                .map(|child| {
                    let predicate = Arc::clone(&predicate);
                    child.retry_if(move |error| predicate(error), policy.clone())
                })
                .collect(),
            strategy: self.strategy,
        }
    }

    /// Collect the children's success values in declared order.
    pub fn collect(self) -> Effect<Vec<T>, E> {
        let children = self.children;
        match self.strategy {
            Strategy::Sequential => Effect::new(move || {
                let children = children.clone();
                async move {
                    let mut values = Vec::with_capacity(children.len());
                    for child in &children {
                        values.push(child.run().await?);
                    }
                    Ok(values)
                }
            }),
            Strategy::Parallel => Effect::new(move || {
                let children = children.clone();
                async move {
                    let running: Vec<_> = children.iter().map(|child| child.run()).collect();
                    let outcomes = futures::future::join_all(running).await;
                    // join_all preserves declared order, so collecting
                    // reports the first failed child in that order even
                    // when a later sibling failed sooner.
                    outcomes.into_iter().collect()
                }
            }),
        }
    }

    /// Collect, then retry the whole group from scratch on failure.
    ///
    /// Every attempt re-executes all children, including ones that
    /// succeeded before. See [`Group::retry_each`] for leaf-level retry.
    pub fn retry(self, policy: RetryPolicy) -> Effect<Vec<T>, E> {
        self.collect().retry(policy)
    }
}
