//! Composable retry policies.
//!
//! A [`RetryPolicy`] is pure data: a function from the current
//! [`RetryStatus`] to a decision, with no side effects of its own. The
//! retry executors in [`crate::effect`] drive the policy against a clock;
//! [`RetryPolicy::simulate`] drives it against nothing at all, which is how
//! policies are tested.
//!
//! # Quick start
//!
//! ```rust
//! use millrace::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::exponential_backoff(Duration::from_millis(100))
//!     .append(RetryPolicy::limit_retries(3))
//!     .cap_delay(Duration::from_secs(1));
//!
//! // Offline inspection: initial status + 3 retries.
//! assert_eq!(policy.simulate(10).len(), 4);
//! ```
//!
//! # Composition
//!
//! - [`RetryPolicy::append`] joins two policies: retry only while both
//!   allow it, sleeping the longer of the two delays.
//! - [`RetryPolicy::followed_by`] switches to a second policy once the
//!   first gives up, without resetting the status.
//! - [`RetryPolicy::cap_delay`] and the `limit_retries_by_*` combinators
//!   bound individual and cumulative delays.
//!
//! Jittered policies (`full_jitter`, `equal_jitter`, `decorrelated_jitter`)
//! take an injectable [`RandomSource`] so tests can assert exact delays.

mod error;
mod jitter;
mod policy;
mod status;

pub use error::TimeoutError;
pub use jitter::{RandomSource, SequenceSource, ThreadRngSource};
pub use policy::{RetryDecision, RetryPolicy};
pub use status::RetryStatus;
