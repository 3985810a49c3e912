//! Bus failure kinds.
//!
//! Failures of the messaging layer are kept distinct from failures
//! reported by handlers: a [`DeliveryError::Timeout`] means the reply
//! never arrived, while [`DeliveryError::Handler`] carries the handler's
//! own error untouched.

use std::fmt;
use std::io;
use std::time::Duration;

/// Why an ask did not produce a handler success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError<E> {
    /// No reply arrived before the deadline.
    Timeout { duration: Duration },
    /// No handler is registered under the address, with compatible
    /// message types, at resolution time.
    NoHandler { address: String },
    /// The handler ran and reported this failure.
    Handler(E),
}

impl<E> DeliveryError<E> {
    /// Returns true for the deadline-elapsed variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Extracts the handler-reported failure, if that is what this is.
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            Self::Handler(error) => Some(error),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for DeliveryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { duration } => {
                write!(f, "no reply within {:?}", duration)
            }
            Self::NoHandler { address } => {
                write!(f, "no handler registered at '{}'", address)
            }
            Self::Handler(error) => write!(f, "handler failed: {}", error),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for DeliveryError<E> {}

/// Why a fire-and-forget send was not enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TellError {
    /// No handler is registered under the address.
    NoHandler { address: String },
    /// The target instance's bounded mailbox is full.
    MailboxFull { address: String },
    /// A handler exists but its input type differs from the sent value.
    IncompatibleInput { address: String },
}

impl fmt::Display for TellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHandler { address } => {
                write!(f, "no handler registered at '{}'", address)
            }
            Self::MailboxFull { address } => {
                write!(f, "mailbox full at '{}'", address)
            }
            Self::IncompatibleInput { address } => {
                write!(f, "input type does not match handler at '{}'", address)
            }
        }
    }
}

impl std::error::Error for TellError {}

/// Why a deployment was rejected.
#[derive(Debug)]
pub enum DeployError {
    /// The address already has a live deployment.
    AddressInUse { address: String },
    /// Codec enforcement was requested but a message type has no
    /// registered codec.
    MissingCodec {
        address: String,
        type_name: &'static str,
    },
    /// A dedicated worker thread could not be spawned.
    WorkerSpawn { address: String, source: io::Error },
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressInUse { address } => {
                write!(f, "address '{}' already deployed", address)
            }
            Self::MissingCodec { address, type_name } => {
                write!(
                    f,
                    "deploy at '{}' requires a codec for {}",
                    address, type_name
                )
            }
            Self::WorkerSpawn { address, source } => {
                write!(f, "failed to spawn worker for '{}': {}", address, source)
            }
        }
    }
}

impl std::error::Error for DeployError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_classification() {
        let timeout: DeliveryError<String> = DeliveryError::Timeout {
            duration: Duration::from_millis(100),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.into_handler_error(), None);

        let handler = DeliveryError::Handler("boom".to_string());
        assert!(!handler.is_timeout());
        assert_eq!(handler.into_handler_error(), Some("boom".to_string()));
    }

    #[test]
    fn test_display_messages() {
        let err: DeliveryError<String> = DeliveryError::NoHandler {
            address: "inc".to_string(),
        };
        assert_eq!(err.to_string(), "no handler registered at 'inc'");

        let err = TellError::MailboxFull {
            address: "inc".to_string(),
        };
        assert_eq!(err.to_string(), "mailbox full at 'inc'");
    }
}
