//! Error types for the DDNS system
//!
//! Every failure a reconciliation pass can produce maps onto one variant of
//! [`Error`]. The scheduler uses [`Error::is_fatal`] to decide whether a failure
//! ends the process or is counted and retried on the next tick.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the response query engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No structural `"key":` occurrence exists in the view
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// No array element carries the requested key/value pair
    #[error("no array element with \"{key}\":\"{value}\"")]
    ElementNotFound {
        /// Key that was matched against
        key: String,
        /// Expected value
        value: String,
    },

    /// Unterminated string or unbalanced braces
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The value following the key has the wrong syntactic shape
    #[error("type mismatch for \"{key}\": expected {expected}")]
    TypeMismatch {
        /// Key whose value was inspected
        key: String,
        /// Shape the caller asked for
        expected: &'static str,
    },
}

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// A bounded operation exceeded its deadline
    #[error("{operation} timed out after {deadline:?}")]
    Timeout {
        /// Name of the abandoned operation
        operation: String,
        /// Deadline that elapsed
        deadline: Duration,
    },

    /// Connection refused/reset, unreachable network, name resolution failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote closed the connection before completing the response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Response body did not contain what we expected
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Remote API reported failure
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Missing or placeholder credentials, unsupported provider, invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O failure (configuration file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded operation panicked instead of returning
    #[error("{operation} panicked: {message}")]
    Panicked {
        /// Name of the operation
        operation: String,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl Error {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, deadline: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            deadline,
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a panic report for a bounded operation
    pub fn panicked(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this failure must stop the scheduler instead of being retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Io(_))
    }

    /// Short category label used in logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Timeout { .. } => "timeout",
            Error::Transport(_) => "transport",
            Error::Protocol(_) => "protocol",
            Error::Parse(_) => "parse",
            Error::Provider { .. } => "provider",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Panicked { .. } => "panic",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Client-level timeouts land in Transport: the caller-facing deadline
        // belongs to the bounded executor.
        if err.is_body() || err.is_decode() || is_incomplete_message(&err) {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Hyper's wording for a connection closed before the response completed
const INCOMPLETE_MESSAGE: &str = "connection closed before message completed";

/// Whether any error in the source chain reports a truncated response
///
/// A close before the response headers surfaces as a request error, so the
/// chain is inspected rather than the outer classification.
fn is_incomplete_message(err: &(dyn std::error::Error + 'static)) -> bool {
    std::iter::successors(Some(err), |e| e.source()).any(|e| {
        e.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::UnexpectedEof)
            || e.to_string().contains(INCOMPLETE_MESSAGE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("error sending request")]
    struct RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>);

    #[test]
    fn only_config_and_io_are_fatal() {
        assert!(Error::config("placeholder credentials").is_fatal());
        assert!(Error::Io(std::io::Error::other("denied")).is_fatal());

        assert!(!Error::timeout("list", Duration::from_secs(1)).is_fatal());
        assert!(!Error::transport("refused").is_fatal());
        assert!(!Error::protocol("eof").is_fatal());
        assert!(!Error::from(ParseError::KeyNotFound("Ip".into())).is_fatal());
        assert!(!Error::provider("dnspod", "code 8").is_fatal());
    }

    #[test]
    fn parse_errors_render_their_key() {
        let err = Error::from(ParseError::TypeMismatch {
            key: "ttl".into(),
            expected: "integer",
        });
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("\"ttl\""));
    }

    #[test]
    fn early_close_is_found_in_source_chain() {
        let hyper_like = std::io::Error::other(INCOMPLETE_MESSAGE);
        let truncated = RequestFailed(Box::new(hyper_like));
        assert!(is_incomplete_message(&truncated));

        let eof = RequestFailed(Box::new(std::io::Error::from(
            std::io::ErrorKind::UnexpectedEof,
        )));
        assert!(is_incomplete_message(&eof));

        let refused = RequestFailed(Box::new(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )));
        assert!(!is_incomplete_message(&refused));
    }

    #[test]
    fn panics_are_recoverable() {
        let err = Error::panicked("list record", "index out of bounds");
        assert_eq!(err.kind(), "panic");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("list record panicked"));
    }
}
