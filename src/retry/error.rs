//! Error types for timed effect execution.

use std::time::Duration;

/// Error produced by [`Effect::with_timeout`](crate::Effect::with_timeout).
///
/// Wraps either the timeout itself or an error the effect produced before
/// the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The effect did not complete within the deadline.
    Timeout {
        /// The deadline that was exceeded.
        duration: Duration,
    },
    /// The effect failed before the deadline.
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Returns true if this is the timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The effect's own error, if it failed before the deadline.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { duration } => write!(f, "effect timed out after {:?}", duration),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Inner(e) => Some(e),
        }
    }
}
