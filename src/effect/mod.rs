//! The deferred computation type.
//!
//! An [`Effect<T, E>`] is a cold description of an asynchronous computation
//! that eventually produces a `T` or fails with an `E`. Cold means
//! re-executable: running the same effect twice triggers two independent
//! executions, with nothing memoized between them. Retry depends on this;
//! a retried effect really does start over from scratch.
//!
//! # Quick example
//!
//! ```rust
//! use millrace::Effect;
//!
//! # tokio_test::block_on(async {
//! let effect = Effect::<_, String>::succeed(5)
//!     .map(|x| x * 2)
//!     .and_then(|x| Effect::succeed(x + 10));
//!
//! assert_eq!(effect.run().await, Ok(20));
//! // Cold: running again is a second, independent execution.
//! assert_eq!(effect.run().await, Ok(20));
//! # });
//! ```
//!
//! # Failure flow
//!
//! Errors are opaque values threaded through combinators untouched.
//! `map` and `and_then` short-circuit on failure; only
//! [`recover`](Effect::recover), [`or_else`](Effect::or_else),
//! [`fallback_to`](Effect::fallback_to) and the retry operators may
//! intercept an error.

mod retry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

type RunFn<T, E> = dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// A cold, re-executable description of an asynchronous computation.
///
/// Each call to [`Effect::run`] is an independent execution delivering one
/// terminal outcome, `Ok(T)` or `Err(E)`. Effects are cheap to clone (a
/// single reference count) and each clone describes the same computation.
pub struct Effect<T, E> {
    run_fn: Arc<RunFn<T, E>>,
}

impl<T, E> Clone for Effect<T, E> {
    fn clone(&self) -> Self {
        Self {
            run_fn: Arc::clone(&self.run_fn),
        }
    }
}

impl<T, E> fmt::Debug for Effect<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("run_fn", &"<function>")
            .finish()
    }
}

impl<T, E> Effect<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            run_fn: Arc::new(move || f().boxed()),
        }
    }

    /// An effect that always succeeds with the given value.
    ///
    /// ```rust
    /// use millrace::Effect;
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::<_, String>::succeed(42);
    /// assert_eq!(effect.run().await, Ok(42));
    /// # });
    /// ```
    pub fn succeed(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move || {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// An effect that always fails with the given error.
    ///
    /// ```rust
    /// use millrace::Effect;
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::<i32, _>::fail("boom");
    /// assert_eq!(effect.run().await, Err("boom"));
    /// # });
    /// ```
    pub fn fail(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::new(move || {
            let error = error.clone();
            async move { Err(error) }
        })
    }

    /// Defer a supplier until execution time.
    ///
    /// The supplier runs once per execution, so side effects inside it are
    /// repeated on retry.
    pub fn lazy<F>(supplier: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(move || {
            let value = supplier();
            async move { Ok(value) }
        })
    }

    /// An effect from a synchronous fallible function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self::new(move || {
            let result = f();
            async move { result }
        })
    }

    /// Lift a `Result` into an effect.
    pub fn from_result(result: Result<T, E>) -> Self
    where
        T: Clone + Sync,
        E: Clone + Sync,
    {
        Self::new(move || {
            let result = result.clone();
            async move { result }
        })
    }

    /// An effect from an async function.
    ///
    /// The function is invoked once per execution, producing a fresh
    /// future each time.
    ///
    /// ```rust
    /// use millrace::Effect;
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::from_async(|| async { Ok::<_, String>(42) });
    /// assert_eq!(effect.run().await, Ok(42));
    /// # });
    /// ```
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(f)
    }

    /// Execute the effect once.
    ///
    /// Every call is a fresh, independent execution.
    pub async fn run(&self) -> Result<T, E> {
        (self.run_fn)().await
    }

    /// Transform the success value. Failures pass through unchanged.
    pub fn map<U, F>(self, f: F) -> Effect<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move { fut.await.map(|value| f(value)) }
        })
    }

    /// Transform the error value. Successes pass through unchanged.
    pub fn map_err<E2, F>(self, f: F) -> Effect<T, E2>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move { fut.await.map_err(|error| f(error)) }
        })
    }

    /// Chain a dependent effect.
    ///
    /// On success the continuation produces the next effect and its
    /// outcome stands. On failure the continuation is never invoked.
    ///
    /// ```rust
    /// use millrace::Effect;
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::<_, String>::succeed(5)
    ///     .and_then(|x| Effect::succeed(x * 2));
    /// assert_eq!(effect.run().await, Ok(10));
    /// # });
    /// ```
    pub fn and_then<U, F>(self, f: F) -> Effect<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Effect<U, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                let value = fut.await?;
                f(value).run().await
            }
        })
    }

    /// Recover from any failure with a replacement value.
    ///
    /// The resulting effect never fails.
    pub fn recover<F>(self, f: F) -> Effect<T, E>
    where
        F: Fn(E) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(error) => Ok(f(error)),
                }
            }
        })
    }

    /// Substitute another effect on failure.
    ///
    /// The substitute's outcome, success or failure, becomes the result.
    /// Compare [`Effect::fallback_to`], which reports the original error
    /// when the substitute also fails.
    pub fn or_else<F>(self, f: F) -> Effect<T, E>
    where
        F: Fn(E) -> Effect<T, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(error) => f(error).run().await,
                }
            }
        })
    }

    /// Substitute another effect on failure, keeping the original error.
    ///
    /// If the substitute also fails, the reported failure cause is the
    /// original error, not the substitute's.
    ///
    /// ```rust
    /// use millrace::Effect;
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::<i32, _>::fail("original")
    ///     .fallback_to(|_| Effect::fail("substitute"));
    /// assert_eq!(effect.run().await, Err("original"));
    /// # });
    /// ```
    pub fn fallback_to<F>(self, f: F) -> Effect<T, E>
    where
        F: Fn(&E) -> Effect<T, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(error) => match f(&error).run().await {
                        Ok(value) => Ok(value),
                        Err(_) => Err(error),
                    },
                }
            }
        })
    }

    /// Observe a successful outcome.
    ///
    /// The observer runs exactly once per successful execution and cannot
    /// alter the outcome.
    pub fn on_success<F>(self, f: F) -> Effect<T, E>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                let outcome = fut.await;
                if let Ok(value) = &outcome {
                    f(value);
                }
                outcome
            }
        })
    }

    /// Observe the terminal outcome, success or failure.
    ///
    /// The observer runs exactly once per execution and cannot alter the
    /// outcome.
    pub fn on_complete<F>(self, f: F) -> Effect<T, E>
    where
        F: Fn(&Result<T, E>) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::new(move || {
            let fut = (self.run_fn)();
            let f = Arc::clone(&f);
            async move {
                let outcome = fut.await;
                f(&outcome);
                outcome
            }
        })
    }

    /// Race several effects; the first terminal outcome wins.
    ///
    /// Whichever effect completes first, with success or failure,
    /// determines the result. The losing executions are dropped and their
    /// outcomes are never observable.
    ///
    /// # Panics
    ///
    /// Panics if `effects` is empty.
    ///
    /// ```rust
    /// use millrace::Effect;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// fn delayed(ms: u64, label: &'static str) -> Effect<&'static str, String> {
    ///     Effect::from_async(move || async move {
    ///         tokio::time::sleep(Duration::from_millis(ms)).await;
    ///         Ok(label)
    ///     })
    /// }
    ///
    /// let winner = Effect::race(vec![delayed(40, "slow"), delayed(5, "fast")]);
    /// assert_eq!(winner.run().await, Ok("fast"));
    /// # });
    /// ```
    pub fn race(effects: Vec<Effect<T, E>>) -> Effect<T, E> {
        assert!(!effects.is_empty(), "race requires at least one effect");
        Effect::new(move || {
            let racers: Vec<_> = effects.iter().map(|effect| (effect.run_fn)()).collect();
            async move {
                let (outcome, _index, _losers) = futures::future::select_all(racers).await;
                outcome
            }
        })
    }
}
