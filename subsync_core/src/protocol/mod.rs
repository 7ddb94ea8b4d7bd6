//! OpenSubtitles XML-RPC protocol implementation
//!
//! This module implements the XML-RPC subtitle service with a modular architecture:
//! - `rate_limit`: Cooperative request window and daily download quotas
//! - `codec`: Tagged value tree with XML-RPC encoding and decoding
//! - `transport`: HTTP POST transport behind a trait seam
//! - `query`: Search query derivation from video file names
//! - `client`: Session handling, keep-alive, retries and the public calls

pub mod client;
pub mod codec;
pub mod error;
pub mod query;
pub mod rate_limit;
pub mod session;
pub mod transport;

// Re-export main types
pub use client::{Candidate, ProtocolClient, ProtocolConfig};
pub use codec::{MethodCall, MethodResponse, RpcArg, RpcMember, RpcValue};
pub use error::{ProtocolError, Result, StatusLine};
pub use query::SearchQuery;
pub use rate_limit::{QuotaState, RateLimitConfig, RateLimitedSession, RequestKind};
pub use session::Session;
pub use transport::{HttpReply, HttpTransport, RpcTransport};

use std::time::Duration;

/// Regular endpoint
pub const API_URL: &str = "http://api.opensubtitles.org/xml-rpc";

/// Endpoint used once the account is detected as privileged
pub const VIP_API_URL: &str = "https://vip-api.opensubtitles.org/xml-rpc";

/// `Content-Location` value returned to privileged accounts
pub const VIP_CONTENT_LOCATION: &str = "https://vip-api.opensubtitles.org.local/xml-rpc";

/// Default user agent registered with the service
pub const DEFAULT_USER_AGENT: &str = "TemporaryUserAgent";

/// Length of the request window
pub const REQUEST_WINDOW: Duration = Duration::from_secs(10);

/// Requests allowed per window
pub const MAX_REQUESTS_PER_WINDOW: u32 = 40;

/// Downloads per day for a regular account
pub const MAX_DOWNLOADS_PER_DAY: u32 = 200;

/// Downloads per day for a privileged account
pub const PRIVILEGED_MAX_DOWNLOADS_PER_DAY: u32 = 1000;

/// Interval between keep-alive pings (sessions expire after 15 minutes)
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(14 * 60);
