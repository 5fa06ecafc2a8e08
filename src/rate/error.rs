//! Error types.
//!
//! Underlying stream errors are never wrapped: they reach the caller exactly as
//! the wrapped stream produced them. The types here only cover what the crate
//! itself reports: invalid configuration, closed decorators, and the replay of
//! a failure a monitored decorator already saw.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Rejected limiter or monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `bytes_per_second * quantum` does not fit in `usize`.
    #[error("budget of {bytes_per_second} B/s over {quantum:?} exceeds usize::MAX bytes per quantum")]
    BudgetOverflow {
        /// Configured rate.
        bytes_per_second: u64,
        /// Configured quantum.
        quantum: Duration,
    },

    /// The sample channel would have no buffer at all.
    #[error("sample channel capacity must be greater than 0")]
    ZeroCapacity,
}

/// Errors produced by the stream decorators themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The decorator was closed or never had an underlying stream.
    #[error("stream is closed")]
    Closed,

    /// A failure the underlying stream reported on an earlier call.
    #[error("previous operation failed: {message}")]
    Previous {
        /// Kind of the original error.
        kind: io::ErrorKind,
        /// Display text of the original error.
        message: String,
    },
}

impl StreamError {
    /// Remembers `err` so it can be replayed later.
    ///
    /// Returns `None` for `Interrupted` and `WouldBlock`, which callers are
    /// expected to retry.
    pub(crate) fn remember(err: &io::Error) -> Option<Self> {
        match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => None,
            kind => Some(Self::Previous {
                kind,
                message: err.to_string(),
            }),
        }
    }

    /// The `io::ErrorKind` this error is reported with.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Closed => io::ErrorKind::UnexpectedEof,
            Self::Previous { kind, .. } => *kind,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

/// The error every operation on a closed decorator returns.
pub(crate) fn closed() -> io::Error {
    StreamError::Closed.into()
}

/// Returns true if `err` reports a closed decorator.
///
/// ```rust
/// use std::io::Read;
/// use streamrate::{is_closed, LimitReader};
///
/// let mut reader = LimitReader::new(&b"abc"[..], 1024);
/// reader.close().unwrap();
///
/// let err = reader.read(&mut [0u8; 3]).unwrap_err();
/// assert!(is_closed(&err));
/// ```
pub fn is_closed(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<StreamError>())
        .is_some_and(|inner| *inner == StreamError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_error() {
        let err = closed();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(is_closed(&err));
        assert_eq!(err.to_string(), "stream is closed");
    }

    #[test]
    fn test_foreign_error_is_not_closed() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(!is_closed(&err));

        let err = io::Error::from(io::ErrorKind::BrokenPipe);
        assert!(!is_closed(&err));
    }

    #[test]
    fn test_remember_keeps_kind_and_message() {
        let original = io::Error::new(io::ErrorKind::ConnectionReset, "peer went away");
        let remembered = StreamError::remember(&original).unwrap();

        let replayed: io::Error = remembered.clone().into();
        assert_eq!(replayed.kind(), io::ErrorKind::ConnectionReset);
        assert!(replayed.to_string().contains("peer went away"));
        assert!(!is_closed(&replayed));
    }

    #[test]
    fn test_remember_skips_retriable_kinds() {
        assert!(StreamError::remember(&io::Error::from(io::ErrorKind::Interrupted)).is_none());
        assert!(StreamError::remember(&io::Error::from(io::ErrorKind::WouldBlock)).is_none());
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroCapacity.to_string(),
            "sample channel capacity must be greater than 0"
        );
    }
}
