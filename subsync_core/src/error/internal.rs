//! Internal library error types

use thiserror::Error;

/// Internal library errors
#[derive(Error, Debug)]
pub enum InternalError {
    /// A fetch job panicked instead of returning
    #[error("Job for '{key}' panicked: {message}")]
    JobPanicked { key: String, message: String },
}

impl InternalError {
    /// Create a job panic error
    pub fn job_panicked(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JobPanicked {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_panicked_error() {
        let error = InternalError::job_panicked("/media/a.mkv", "index out of bounds");
        assert!(error.to_string().contains("/media/a.mkv"));
        assert!(error.to_string().contains("index out of bounds"));
    }
}
