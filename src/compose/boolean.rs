//! Boolean reducers over groups of boolean effects.

use super::Group;
use crate::effect::Effect;

impl<E> Group<bool, E>
where
    E: Send + 'static,
{
    /// Logical AND of every child's boolean result.
    ///
    /// No short-circuit: all children execute even once a `false` is
    /// known, and any permanent child failure fails the composite.
    ///
    /// ```rust
    /// use millrace::{Effect, Group};
    ///
    /// # tokio_test::block_on(async {
    /// let all = Group::parallel(vec![
    ///     Effect::<_, String>::succeed(true),
    ///     Effect::succeed(false),
    /// ])
    /// .all();
    /// assert_eq!(all.run().await, Ok(false));
    /// # });
    /// ```
    pub fn all(self) -> Effect<bool, E> {
        self.collect().map(|values| values.into_iter().all(|b| b))
    }

    /// Logical OR of every child's boolean result.
    ///
    /// A permanent failure in any child fails the composite even when
    /// another child already produced `true`.
    pub fn any(self) -> Effect<bool, E> {
        self.collect().map(|values| values.into_iter().any(|b| b))
    }
}
