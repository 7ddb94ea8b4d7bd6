//! Filesystem error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem error with the path it happened on
#[derive(Error, Debug)]
#[error("{}", describe(self))]
pub struct IoError {
    /// The kind of I/O error
    pub kind: IoErrorKind,
    /// Path associated with the error (if any)
    pub path: Option<PathBuf>,
    /// Underlying I/O error
    #[source]
    pub source: std::io::Error,
}

/// Kind of I/O error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    FileNotFound,
    PermissionDenied,
    AlreadyExists,
    Other,
}

impl From<std::io::ErrorKind> for IoErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => Self::FileNotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::Other,
        }
    }
}

impl IoError {
    /// Wrap a standard I/O error without path context
    pub fn from_std(source: std::io::Error) -> Self {
        Self {
            kind: source.kind().into(),
            path: None,
            source,
        }
    }

    /// Wrap a standard I/O error that happened on `path`
    pub fn at(path: &Path, source: std::io::Error) -> Self {
        Self::from_std(source).with_path(path)
    }

    /// Attach a path to the error
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

fn describe(error: &IoError) -> String {
    let what = match error.kind {
        IoErrorKind::FileNotFound => "File not found",
        IoErrorKind::PermissionDenied => "Permission denied",
        IoErrorKind::AlreadyExists => "File already exists",
        IoErrorKind::Other => "I/O error",
    };

    match &error.path {
        Some(path) => format!("{what}: {} ({})", path.display(), error.source),
        None => format!("{what}: {}", error.source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_kind_mapping() {
        let cases = [
            (io::ErrorKind::NotFound, IoErrorKind::FileNotFound),
            (io::ErrorKind::PermissionDenied, IoErrorKind::PermissionDenied),
            (io::ErrorKind::AlreadyExists, IoErrorKind::AlreadyExists),
            (io::ErrorKind::Interrupted, IoErrorKind::Other),
        ];

        for (std_kind, expected) in cases {
            let error = IoError::from_std(io::Error::new(std_kind, "boom"));
            assert_eq!(error.kind, expected);
        }
    }

    #[test]
    fn test_display_includes_path() {
        let path = Path::new("/media/show/episode.srt");
        let error = IoError::at(path, io::Error::new(io::ErrorKind::NotFound, "gone"));

        let message = error.to_string();
        assert!(message.contains("File not found"));
        assert!(message.contains("/media/show/episode.srt"));
        assert!(message.contains("gone"));
    }

    #[test]
    fn test_display_without_path() {
        let error = IoError::from_std(io::Error::other("disk on fire"));
        assert_eq!(error.to_string(), "I/O error: disk on fire");
    }
}
