//! Transport layer for XML-RPC calls
//!
//! The protocol client only needs "POST this body, give me status, headers
//! and body back". Keeping that behind [`RpcTransport`] lets tests script
//! the service without a network.

mod http;

pub use http::HttpTransport;

use crate::protocol::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// Raw HTTP reply
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpReply {
    /// Successful reply with the given body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Sends XML-RPC request bodies to an endpoint
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// POST `body` to `url`
    ///
    /// Connection failures and timeouts are reported as transient
    /// [`ProtocolError`](crate::protocol::ProtocolError)s; any HTTP status is
    /// returned as a reply.
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpReply>;
}
