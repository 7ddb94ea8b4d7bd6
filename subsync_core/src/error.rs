//! Error types for the subtitle synchronizer core
//!
//! Errors are grouped by where they originate so that the scheduler can decide
//! whether an item is worth another attempt.

use std::path::PathBuf;
use thiserror::Error;

pub mod internal;
pub mod io;
pub mod validation;

pub use self::io::{IoError, IoErrorKind};
pub use self::validation::ValidationError;
pub use crate::protocol::ProtocolError;
pub use internal::InternalError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the core library
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Remote service errors (transport, session, quota, wire format)
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No usable subtitle candidate was found
    #[error("No subtitle found for '{name}'")]
    NotFound { name: String },

    /// Downloaded archive wraps another archive
    #[error("Nested archive is not supported, kept at {}", path.display())]
    NestedArchiveUnsupported { path: PathBuf },

    /// Downloaded archive format cannot be unpacked
    #[error("Unsupported archive format '{format}', kept at {}", path.display())]
    UnsupportedArchive { path: PathBuf, format: String },

    /// Validation and configuration errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal library errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a nested archive error
    pub fn nested_archive(path: impl Into<PathBuf>) -> Self {
        Self::NestedArchiveUnsupported { path: path.into() }
    }

    /// Create an unsupported archive error
    pub fn unsupported_archive(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self::UnsupportedArchive {
            path: path.into(),
            format: format.into(),
        }
    }

    /// Whether another attempt at the same item could succeed.
    ///
    /// Archive problems leave a file on disk for manual handling and are
    /// never requeued; configuration mistakes will not fix themselves either.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NestedArchiveUnsupported { .. }
                | Self::UnsupportedArchive { .. }
                | Self::Validation(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_not_found_error_display() {
        let error = Error::not_found("Show.S01E02.mkv");
        assert_eq!(
            error.to_string(),
            "No subtitle found for 'Show.S01E02.mkv'"
        );
        assert!(error.is_retryable());
    }

    #[test]
    fn test_archive_errors_are_terminal() {
        let nested = Error::nested_archive("/media/show.srt.gz");
        assert!(!nested.is_retryable());
        assert!(nested.to_string().contains("/media/show.srt.gz"));

        let unsupported = Error::unsupported_archive("/media/show.zip", "zip");
        assert!(!unsupported.is_retryable());
        assert!(unsupported.to_string().contains("zip"));
    }

    #[test]
    fn test_validation_errors_are_terminal() {
        let error = Error::from(ValidationError::EmptyProviderChain);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_protocol_errors_are_retryable() {
        let errors = vec![
            Error::from(ProtocolError::QuotaExceeded),
            Error::from(ProtocolError::rate_limited(Duration::from_secs(3))),
            Error::from(ProtocolError::authentication_failed("bad password")),
            Error::from(ProtocolError::transport("connection reset")),
        ];

        for error in errors {
            assert!(error.is_retryable(), "{error} should be retryable");
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let error: Error = io_error.into();

        match error {
            Error::Io(io_err) => assert_eq!(io_err.kind, IoErrorKind::FileNotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_source_chain() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Access denied");
        let error = Error::Io(IoError::at(Path::new("/media/a.srt"), io_error));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
