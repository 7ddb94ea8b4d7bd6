//! Credential providers consumed by the protocol client

use crate::error::{IoError, Result};
use crate::security::SecureString;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default name of the credentials file
pub const AUTH_FILE_NAME: &str = "opensubtitles.auth";

/// Username and password for the subtitle service
///
/// Both may be empty, which asks the service for an anonymous session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCredentials {
    pub username: String,
    pub password: SecureString,
}

impl AuthCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Anonymous credentials
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// Parse `username=` and `password=` lines; anything else is ignored
    pub fn parse(content: &str) -> Self {
        let mut credentials = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "username" => credentials.username = value.trim().to_string(),
                "password" => credentials.password = SecureString::new(value.trim()),
                _ => {}
            }
        }
        credentials
    }

    /// Serialize into the format read by [`parse`](Self::parse)
    pub fn to_file_content(&self) -> String {
        format!(
            "username={}\npassword={}\n",
            self.username,
            self.password.expose()
        )
    }
}

/// Supplies credentials for logging in
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get(&self) -> Result<AuthCredentials>;
}

/// Fixed credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: AuthCredentials,
}

impl StaticCredentialProvider {
    pub fn new(credentials: AuthCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get(&self) -> Result<AuthCredentials> {
        Ok(self.credentials.clone())
    }
}

/// Credentials read from a `username=`/`password=` file
///
/// The file is read again on every call until one read succeeds; after that
/// the parsed credentials are reused. A missing file yields anonymous
/// credentials.
#[derive(Debug)]
pub struct FileCredentialProvider {
    path: PathBuf,
    cached: Mutex<Option<AuthCredentials>>,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write credentials to `path`, readable only by the owner on unix
    pub async fn write(path: &Path, credentials: &AuthCredentials) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IoError::at(parent, e))?;
        }

        tokio::fs::write(path, credentials.to_file_content())
            .await
            .map_err(|e| IoError::at(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| IoError::at(path, e))?;
        }

        debug!("Wrote credentials to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn get(&self) -> Result<AuthCredentials> {
        let cached = self
            .cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let credentials = AuthCredentials::parse(&content);
                debug!(
                    "Loaded credentials for '{}' from {}",
                    credentials.username,
                    self.path.display()
                );
                *self
                    .cached
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(credentials.clone());
                Ok(credentials)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No credentials file at {}, logging in anonymously",
                    self.path.display()
                );
                Ok(AuthCredentials::anonymous())
            }
            Err(e) => {
                warn!("Failed to read credentials from {}: {e}", self.path.display());
                Err(IoError::at(&self.path, e).into())
            }
        }
    }
}
