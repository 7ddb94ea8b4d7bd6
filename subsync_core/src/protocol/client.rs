//! High-level protocol client with session handling, quotas and retry logic
//!
//! This module provides the main interface for talking to the OpenSubtitles
//! XML-RPC API: login, search, download, keep-alive and logout.

use crate::protocol::codec::{Codec, MethodCall, MethodResponse, RpcValue};
use crate::protocol::error::{ProtocolError, Result, StatusLine};
use crate::protocol::query::SearchQuery;
use crate::protocol::rate_limit::{QuotaState, RateLimitConfig, RateLimitedSession, RequestKind};
use crate::protocol::session::Session;
use crate::protocol::transport::{HttpReply, HttpTransport, RpcTransport};
use crate::security::CredentialProvider;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use flate2::read::GzDecoder;
use log::{debug, info, trace, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at, sleep};

/// Protocol client configuration
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Regular endpoint
    pub api_url: String,
    /// Endpoint used for privileged accounts
    pub vip_api_url: String,
    /// User agent sent with `LogIn`
    pub user_agent: String,
    /// Language of server messages
    pub login_language: String,
    /// Subtitle language ids (ISO 639-2, e.g. `eng`)
    pub languages: Vec<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Retry delay, multiplied by the attempt number
    pub retry_delay: Duration,
    /// Interval between keep-alive pings
    pub keep_alive_interval: Duration,
    /// Request and download quotas
    pub rate_limits: RateLimitConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            api_url: crate::protocol::API_URL.to_string(),
            vip_api_url: crate::protocol::VIP_API_URL.to_string(),
            user_agent: crate::protocol::DEFAULT_USER_AGENT.to_string(),
            login_language: "en".to_string(),
            languages: vec!["eng".to_string()],
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            keep_alive_interval: crate::protocol::KEEP_ALIVE_INTERVAL,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// A subtitle returned by `SearchSubtitles`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Subtitle id
    pub id: String,
    /// Release name the subtitle was made for
    pub display_name: String,
    /// Language id, e.g. `eng`
    pub language: String,
    /// File id passed to `DownloadSubtitles`
    pub download_ref: String,
    /// Suggested subtitle file name
    pub file_name: String,
}

impl Candidate {
    fn from_value(value: &RpcValue) -> Option<Self> {
        let download_ref = value.str_field("IDSubtitleFile")?.to_string();
        let id = value
            .str_field("IDSubtitle")
            .unwrap_or(&download_ref)
            .to_string();
        let display_name = value
            .str_field("MovieReleaseName")
            .or_else(|| value.str_field("MovieName"))
            .unwrap_or_default()
            .trim()
            .to_string();

        Some(Self {
            id,
            display_name,
            language: value
                .str_field("SubLanguageID")
                .unwrap_or_default()
                .to_string(),
            file_name: value
                .str_field("SubFileName")
                .unwrap_or_default()
                .to_string(),
            download_ref,
        })
    }

    /// File name to write to; path components from the server are dropped
    pub fn safe_file_name(&self) -> String {
        Path::new(&self.file_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty() && name != "..")
            .unwrap_or_else(|| format!("{}.srt", self.download_ref))
    }
}

struct ClientInner {
    config: ProtocolConfig,
    transport: Arc<dyn RpcTransport>,
    credentials: Arc<dyn CredentialProvider>,
    limiter: Arc<RateLimitedSession>,
    codec: Mutex<Codec>,
    session: RwLock<Session>,
    /// Serializes logins so concurrent callers share one attempt
    login_gate: Mutex<()>,
}

struct KeepAlive {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// High-level protocol client
pub struct ProtocolClient {
    inner: Arc<ClientInner>,
    keep_alive: std::sync::Mutex<Option<KeepAlive>>,
}

impl ProtocolClient {
    /// Create a client over `transport` and start its keep-alive task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: ProtocolConfig,
        transport: Arc<dyn RpcTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        debug!("Creating new protocol client with config: {config:?}");

        let limiter = Arc::new(RateLimitedSession::new(config.rate_limits.clone()));
        let inner = Arc::new(ClientInner {
            config,
            transport,
            credentials,
            limiter,
            codec: Mutex::new(Codec::new()),
            session: RwLock::new(Session::default()),
            login_gate: Mutex::new(()),
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(keep_alive_loop(Arc::clone(&inner), shutdown_rx));

        Self {
            inner,
            keep_alive: std::sync::Mutex::new(Some(KeepAlive { shutdown, handle })),
        }
    }

    /// Create a client talking HTTP to the configured endpoints
    pub fn connect(
        config: ProtocolConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(&config.user_agent, config.request_timeout)?;
        Ok(Self::new(config, Arc::new(transport), credentials))
    }

    /// Search subtitles for a video file name
    pub async fn search(&self, file_name: &str) -> Result<Vec<Candidate>> {
        self.ensure_authenticated().await?;

        let query = SearchQuery::from_file_name(file_name);
        debug!("Searching for '{file_name}' with query {query:?}");

        let languages = self.inner.config.languages.join(",");
        let response = self
            .inner
            .call(&query.to_call(&languages), RequestKind::Request)
            .await?;

        let candidates = match response.find("data") {
            Some(RpcValue::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    let candidate = Candidate::from_value(item);
                    if candidate.is_none() {
                        warn!("Skipping search result without IDSubtitleFile: {item}");
                    }
                    candidate
                })
                .collect(),
            // The service answers `false` when nothing matched
            Some(RpcValue::Boolean(_)) | None => Vec::new(),
            Some(other) => {
                return Err(ProtocolError::invalid_response(
                    "array of subtitles",
                    other.type_name(),
                ));
            }
        };

        debug!("Search for '{file_name}' returned {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Download a candidate into `output_dir` and return the written path
    pub async fn download(
        &self,
        candidate: &Candidate,
        output_dir: &Path,
    ) -> crate::Result<PathBuf> {
        self.ensure_authenticated().await?;

        debug!("Downloading '{}' ({})", candidate.display_name, candidate.download_ref);
        let call = MethodCall::new("DownloadSubtitles").arg(candidate.download_ref.clone());
        let response = self.inner.call(&call, RequestKind::Download).await?;

        let encoded = response
            .find("data")
            .and_then(RpcValue::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.str_field("data"))
            .ok_or_else(|| ProtocolError::missing_field("data"))?;
        let content = decode_payload(encoded)?;

        let path = output_dir.join(candidate.safe_file_name());
        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| crate::error::IoError::at(&path, e))?;

        info!("Downloaded subtitle to {}", path.display());
        Ok(path)
    }

    /// Log in unless a session is already established.
    ///
    /// Concurrent callers wait for a single login attempt.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        self.inner.ensure_authenticated().await
    }

    /// End the session on the server
    pub async fn logout(&self) -> Result<()> {
        if !self.is_authenticated().await {
            return Ok(());
        }

        let result = self
            .inner
            .call(&MethodCall::new("LogOut"), RequestKind::Request)
            .await;
        self.inner.reset_session().await;
        result.map(|_| ())
    }

    /// Stop the keep-alive task and log out. Errors are logged.
    pub async fn close(&self) {
        let keep_alive = self
            .keep_alive
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        if let Some(keep_alive) = keep_alive {
            let _ = keep_alive.shutdown.send(true);
            if let Err(e) = keep_alive.handle.await {
                warn!("Keep-alive task ended abnormally: {e}");
            }
        }

        if let Err(e) = self.logout().await {
            warn!("Logout failed while closing: {e}");
        }
    }

    /// Check if authenticated
    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.is_authenticated()
    }

    /// Current session state
    pub async fn session(&self) -> Session {
        self.inner.session.read().await.clone()
    }

    /// Current quota counters
    pub fn quota(&self) -> QuotaState {
        self.inner.limiter.snapshot()
    }

    /// Shared quota guard
    pub fn rate_limiter(&self) -> &Arc<RateLimitedSession> {
        &self.inner.limiter
    }
}

impl Drop for ProtocolClient {
    fn drop(&mut self) {
        // The keep-alive task exits on the next shutdown signal
        if let Ok(mut keep_alive) = self.keep_alive.lock()
            && let Some(keep_alive) = keep_alive.take()
        {
            let _ = keep_alive.shutdown.send(true);
        }
    }
}

impl ClientInner {
    async fn ensure_authenticated(&self) -> Result<()> {
        if self.session.read().await.is_authenticated() {
            return Ok(());
        }

        trace!("Waiting for login gate...");
        let _gate = self.login_gate.lock().await;
        if self.session.read().await.is_authenticated() {
            trace!("Another caller logged in while we waited");
            return Ok(());
        }

        let credentials = self.credentials.get().await.map_err(|e| {
            ProtocolError::authentication_failed(format!("credentials unavailable: {e}"))
        })?;

        self.reset_session().await;
        let call = MethodCall::new("LogIn")
            .arg(credentials.username.clone())
            .secret_arg(credentials.password.expose())
            .arg(self.config.login_language.clone())
            .arg(self.config.user_agent.clone());

        let response = self
            .call(&call, RequestKind::Request)
            .await
            .map_err(|e| match e {
                ProtocolError::AuthenticationFailed { .. }
                | ProtocolError::RateLimited { .. }
                | ProtocolError::QuotaExceeded => e,
                other => ProtocolError::authentication_failed(other.to_string()),
            })?;

        let token = response
            .find("token")
            .and_then(RpcValue::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProtocolError::authentication_failed("login returned no token"))?;

        let mut session = Session::authenticated(token);
        if self.limiter.is_privileged() {
            session.mark_privileged();
        }
        *self.session.write().await = session;

        if credentials.is_anonymous() {
            info!("Logged in anonymously");
        } else {
            info!("Logged in as '{}'", credentials.username);
        }
        Ok(())
    }

    /// Execute a call and fail on a non-success status in the response body.
    ///
    /// Errors that invalidate the session clear it, so the next call logs in.
    async fn call(&self, call: &MethodCall, kind: RequestKind) -> Result<MethodResponse> {
        let result = match self.execute(call, kind).await {
            Ok(response) => match response.status() {
                Some(status) => self.check_status(&status).map(|()| response),
                None => Ok(response),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &result
            && e.requires_reauth()
        {
            warn!("{} rejected the session ({e}), logging in again on next call", call.name);
            self.reset_session().await;
        }
        result
    }

    /// Send a call with retries; checks HTTP status only
    async fn execute(&self, call: &MethodCall, kind: RequestKind) -> Result<MethodResponse> {
        trace!("execute called with: {call}");

        let token = self.session.read().await.token().map(str::to_string);
        let body = {
            let mut codec = self.codec.lock().await;
            codec.encode(call, token.as_deref())?
        };
        debug!("Sending {call}");

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                sleep(self.config.retry_delay * attempt).await;
            }

            // Only the first attempt consumes a download
            let kind = if attempt == 0 { kind } else { RequestKind::Request };
            self.limiter.check_and_reserve(kind)?;

            match self.send_once(body.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_transient() || attempt == self.config.max_retries {
                        return Err(e);
                    }
                    warn!(
                        "{} failed (attempt {}/{}): {e}",
                        call.name,
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProtocolError::Timeout(self.config.request_timeout)))
    }

    async fn send_once(&self, body: Bytes) -> Result<MethodResponse> {
        let url = if self.limiter.is_privileged() {
            &self.config.vip_api_url
        } else {
            &self.config.api_url
        };

        let reply = self.transport.post(url, body).await?;
        self.apply_headers(&reply).await;

        if reply.status != 200 {
            let status = StatusLine {
                code: reply.status,
                text: String::new(),
            };
            if status.is_unauthorized() || status.is_download_limit() {
                self.check_status(&status)?;
            }
            return Err(ProtocolError::HttpStatus {
                status: reply.status,
            });
        }

        let codec = self.codec.lock().await;
        codec.decode(&reply.body)
    }

    async fn apply_headers(&self, reply: &HttpReply) {
        if let Some(location) = reply.header("content-location")
            && location.eq_ignore_ascii_case(crate::protocol::VIP_CONTENT_LOCATION)
            && !self.limiter.is_privileged()
        {
            info!("Privileged account detected, switching to {}", self.config.vip_api_url);
            self.limiter.set_privileged(true);
            self.session.write().await.mark_privileged();
        }

        if let Some(quota) = reply.header("download-quota") {
            match quota.trim().parse::<i64>() {
                Ok(remaining) => {
                    trace!("Server reports {remaining} downloads left today");
                    self.limiter.override_daily_remaining(remaining);
                }
                Err(_) => warn!("Ignoring unparseable Download-Quota header '{quota}'"),
            }
        }
    }

    fn check_status(&self, status: &StatusLine) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }

        if status.is_unauthorized() {
            return Err(ProtocolError::authentication_failed(status.to_string()));
        }

        if status.is_download_limit() {
            warn!("Server reports download limit reached ({status})");
            self.limiter.override_daily_remaining(0);
            return Err(ProtocolError::QuotaExceeded);
        }

        Err(ProtocolError::server_error(status.clone()))
    }

    async fn reset_session(&self) {
        self.session.write().await.clear();
        self.limiter.set_privileged(false);
    }

    /// Ping the server; a non-success status ends the session
    async fn keep_alive(&self) {
        if !self.session.read().await.is_authenticated() {
            return;
        }

        match self
            .execute(&MethodCall::new("NoOperation"), RequestKind::Request)
            .await
        {
            Ok(response) => match response.status() {
                Some(status) if status.is_success() => trace!("Keep-alive acknowledged"),
                status => {
                    warn!("Keep-alive rejected ({status:?}), session cleared");
                    self.reset_session().await;
                }
            },
            Err(e) => warn!("Keep-alive failed: {e}"),
        }
    }
}

async fn keep_alive_loop(inner: Arc<ClientInner>, mut shutdown: watch::Receiver<bool>) {
    let period = inner.config.keep_alive_interval;
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => inner.keep_alive().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Keep-alive task stopped");
}

/// Decode a base64 encoded, gzip compressed subtitle
fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let compressed = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProtocolError::decoding(format!("Invalid base64 payload: {e}")))?;

    let mut content = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut content)
        .map_err(|e| ProtocolError::decoding(format!("Invalid gzip payload: {e}")))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn encode_payload(content: &[u8]) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        STANDARD.encode(encoder.finish().unwrap())
    }

    #[test]
    fn test_decode_payload() {
        let encoded = encode_payload(b"1\n00:00:01,000 --> 00:00:02,000\nHello\n");
        let wrapped = format!("{}\n{}", &encoded[..10], &encoded[10..]);
        assert_eq!(
            decode_payload(&wrapped).unwrap(),
            b"1\n00:00:01,000 --> 00:00:02,000\nHello\n"
        );
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert!(matches!(
            decode_payload("!!!").unwrap_err(),
            ProtocolError::Decoding { .. }
        ));
        let not_gzip = STANDARD.encode(b"plain text");
        assert!(matches!(
            decode_payload(&not_gzip).unwrap_err(),
            ProtocolError::Decoding { .. }
        ));
    }

    #[test]
    fn test_candidate_from_value() {
        let value = RpcValue::Struct(vec![
            crate::protocol::RpcMember::new("IDSubtitle", "77"),
            crate::protocol::RpcMember::new("IDSubtitleFile", "1951976245"),
            crate::protocol::RpcMember::new("SubFileName", "Show.S01E02.srt"),
            crate::protocol::RpcMember::new("SubLanguageID", "eng"),
            crate::protocol::RpcMember::new("MovieReleaseName", " Show.S01E02.720p "),
        ]);

        let candidate = Candidate::from_value(&value).unwrap();
        assert_eq!(candidate.id, "77");
        assert_eq!(candidate.download_ref, "1951976245");
        assert_eq!(candidate.display_name, "Show.S01E02.720p");
        assert_eq!(candidate.language, "eng");

        assert!(Candidate::from_value(&RpcValue::Struct(vec![])).is_none());
    }

    #[test]
    fn test_safe_file_name_drops_directories() {
        let mut candidate = Candidate {
            id: "1".to_string(),
            display_name: String::new(),
            language: "eng".to_string(),
            download_ref: "42".to_string(),
            file_name: "../../etc/passwd".to_string(),
        };
        assert_eq!(candidate.safe_file_name(), "passwd");

        candidate.file_name = String::new();
        assert_eq!(candidate.safe_file_name(), "42.srt");
    }

    #[test]
    fn test_default_config() {
        let config = ProtocolConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.languages, vec!["eng".to_string()]);
        assert_eq!(config.user_agent, "TemporaryUserAgent");
    }
}
