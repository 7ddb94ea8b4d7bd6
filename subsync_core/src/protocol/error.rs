//! Protocol-specific error types
//!
//! This module defines error types for the XML-RPC subtitle service client.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol-specific error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Connection-level failure (DNS, reset, TLS, ...)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Request timeout
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    /// Local request window is full
    #[error("Rate limit exceeded: must wait {wait:?} before next request")]
    RateLimited { wait: Duration },

    /// Daily download quota is used up
    #[error("Daily download quota exceeded")]
    QuotaExceeded,

    /// Authentication failed or the session was rejected
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Encoding error
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Decoding error
    #[error("Decoding error: {message}")]
    Decoding { message: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Invalid response format
    #[error("Invalid response format: expected {expected}, got {actual}")]
    InvalidResponse { expected: String, actual: String },

    /// XML-RPC fault returned by the server
    #[error("Server fault {code}: {message}")]
    ServerFault { code: i64, message: String },

    /// Status line in the response body was not a success
    #[error("Server error: {status}")]
    ServerError { status: StatusLine },
}

impl ProtocolError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rate limited error
    pub fn rate_limited(wait: Duration) -> Self {
        Self::RateLimited { wait }
    }

    /// Create an authentication failed error
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a decoding error
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidResponse {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a server fault error
    pub fn server_fault(code: i64, message: impl Into<String>) -> Self {
        Self::ServerFault {
            code,
            message: message.into(),
        }
    }

    /// Create a server error from a status line
    pub fn server_error(status: StatusLine) -> Self {
        Self::ServerError { status }
    }

    /// Check if this error is transient and can be retried in place
    ///
    /// Quota and rate errors are never transient; they surface to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout(_) | Self::HttpStatus { status: 500..=599 }
        ) || matches!(self, Self::ServerError { status } if status.code == 503)
    }

    /// Check if this error indicates a need to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
            || matches!(self, Self::ServerError { status } if status.code == 401)
    }
}

/// `"<code> <text>"` status carried in every response struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: u16,
    pub text: String,
}

impl StatusLine {
    /// Parse a status such as `"200 OK"` or `"407 Download limit reached"`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (code, text) = raw.split_once(' ').unwrap_or((raw, ""));
        Some(Self {
            code: code.parse().ok()?,
            text: text.trim().to_string(),
        })
    }

    /// Only `200` counts as success
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Check if the session token was rejected
    pub fn is_unauthorized(&self) -> bool {
        self.code == 401
    }

    /// Check if the download limit was reached
    pub fn is_download_limit(&self) -> bool {
        self.code == 407
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.text)
        }
    }
}
