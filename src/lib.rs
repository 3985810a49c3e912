//! # Millrace
//!
//! > *"The race is the channel that drives the wheel"*
//!
//! An asynchronous effect runtime: cold, re-executable computations with
//! a composable retry algebra, structural composition, and actor-style
//! message addressing.
//!
//! ## The model
//!
//! - An [`Effect<T, E>`] is a **description** of an async computation,
//!   not a running one. Executing it twice gives two independent runs,
//!   which is exactly what retrying safely requires.
//! - A [`RetryPolicy`] is a **pure function** from retry state to a
//!   decision. Policies compose with [`append`](RetryPolicy::append),
//!   caps and jitter, and can be inspected offline with
//!   [`simulate`](RetryPolicy::simulate) before ever touching a clock.
//! - Composites ([`Group`], [`Pair`], [`Triple`], [`Named`]) aggregate
//!   child effects sequentially or in parallel, with retry applied per
//!   leaf so a succeeded sibling is never re-run.
//! - A [`MessageBus`] turns functions into addressable handlers behind
//!   serial mailboxes, reached by [`ask`](MessageBus::ask) (request and
//!   reply as an effect) or [`tell`](MessageBus::tell) (fire-and-forget).
//!
//! ## Quick example
//!
//! ```rust
//! use millrace::{Effect, Group, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential_backoff(Duration::from_millis(10))
//!     .append(RetryPolicy::limit_retries(3));
//!
//! let fetch_config = Effect::<_, String>::succeed("config");
//! let fetch_schema = Effect::succeed("schema");
//!
//! let startup = Group::parallel(vec![fetch_config, fetch_schema])
//!     .retry_each(policy)
//!     .collect();
//!
//! assert_eq!(startup.run().await, Ok(vec!["config", "schema"]));
//! # });
//! ```
//!
//! ## Failure kinds
//!
//! Three failure kinds stay distinct end to end: the handler's own `E`
//! (threaded opaquely through every combinator), delivery failures
//! ([`DeliveryError`], [`TellError`]), and retry exhaustion, which
//! surfaces the last underlying error unchanged rather than wrapping it.

pub mod bus;
pub mod clock;
pub mod compose;
pub mod effect;
pub mod retry;

pub use bus::{
    Asker, CodecError, CodecRegistry, DeliveryError, DeployError, DeployOptions,
    DeploymentHandle, JsonCodec, MessageBus, TellError, ValueCodec,
};
pub use clock::{default_clock, Clock, TokioClock};
pub use compose::{Group, Named, Pair, Triple};
pub use effect::Effect;
pub use retry::{
    RandomSource, RetryDecision, RetryPolicy, RetryStatus, SequenceSource, ThreadRngSource,
    TimeoutError,
};

/// Convenience glob import.
///
/// ```rust
/// use millrace::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bus::{DeliveryError, DeployOptions, MessageBus, TellError};
    pub use crate::compose::{Group, Named, Pair, Triple};
    pub use crate::effect::Effect;
    pub use crate::retry::{RetryDecision, RetryPolicy, RetryStatus};
}
