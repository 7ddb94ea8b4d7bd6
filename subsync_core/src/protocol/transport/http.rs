//! HTTP transport using reqwest

use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::transport::{HttpReply, RpcTransport};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace, warn};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::time::Duration;

/// Reqwest-based transport
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| ProtocolError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpReply> {
        debug!("POST {url} ({} bytes)", body.len());

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("HTTP request to {url} failed: {e}");
                if e.is_timeout() {
                    ProtocolError::Timeout(self.timeout)
                } else {
                    ProtocolError::transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProtocolError::Timeout(self.timeout)
            } else {
                ProtocolError::transport(format!("Failed to read response body: {e}"))
            }
        })?;

        trace!("HTTP {status} with {} byte body", body.len());
        Ok(HttpReply {
            status,
            headers,
            body,
        })
    }
}
