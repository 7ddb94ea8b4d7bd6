//! SubSync Core Library
//!
//! This is the core library for SubSync, providing the quota-aware
//! OpenSubtitles client, release name matching, fallback provider chains and
//! the bounded-concurrency job scheduler that drives subtitle fetching.

pub mod error;
pub mod finalize;
pub mod matching;
pub mod protocol;
pub mod provider;
pub mod scheduler;
pub mod security;
pub mod sync_list;

// Re-export main types
pub use error::{Error, Result};
pub use finalize::{ArchiveFinalizer, SubtitleFinalizer};
pub use provider::{
    FallbackProvider, OpenSubtitlesProvider, ProviderCache, SubtitleProvider, SyncItem,
};
pub use scheduler::{
    ChannelSink, JobScheduler, QueueProcessReporter, QueueProcessResult, ReportSink,
    SchedulerConfig,
};
pub use sync_list::SyncList;

/// Video extensions scanned by default
pub const DEFAULT_VIDEO_EXTENSIONS: &str = "avi,mp4,mkv,mpeg,flv,webm";

/// Subtitle extensions recognized by default
pub const DEFAULT_SUBTITLE_EXTENSIONS: &str = "srt,txt,sub,idx,ssa,ass";

/// Core client configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub concurrent_workers: usize,
    pub retry_limit: u32,
    /// Subtitle language ids, e.g. `eng`
    pub languages: Vec<String>,
    pub user_agent: String,
    pub video_extensions: Vec<String>,
    pub subtitle_extensions: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            concurrent_workers: 5,
            retry_limit: 3,
            languages: vec!["eng".to_string()],
            user_agent: protocol::DEFAULT_USER_AGENT.to_string(),
            video_extensions: split_list(DEFAULT_VIDEO_EXTENSIONS),
            subtitle_extensions: split_list(DEFAULT_SUBTITLE_EXTENSIONS),
        }
    }
}

impl ClientConfig {
    /// Scheduler settings derived from this configuration
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrent_workers: self.concurrent_workers,
            retry_limit: self.retry_limit,
            ..SchedulerConfig::default()
        }
    }

    /// Protocol settings derived from this configuration
    pub fn protocol_config(&self) -> protocol::ProtocolConfig {
        protocol::ProtocolConfig {
            user_agent: self.user_agent.clone(),
            languages: self.languages.clone(),
            ..protocol::ProtocolConfig::default()
        }
    }

    /// Validate values that would stall or break the scheduler
    pub fn validate(&self) -> std::result::Result<(), error::ValidationError> {
        if self.concurrent_workers == 0 {
            return Err(error::ValidationError::invalid_parameter(
                "concurrent_workers",
                "must be at least 1",
            ));
        }
        if self.retry_limit == 0 {
            return Err(error::ValidationError::invalid_parameter(
                "retry_limit",
                "must be at least 1",
            ));
        }
        if self.languages.is_empty() {
            return Err(error::ValidationError::invalid_parameter(
                "languages",
                "at least one language is required",
            ));
        }
        Ok(())
    }
}

/// Split a comma separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.concurrent_workers, 5);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.languages, vec!["eng"]);
        assert!(config.video_extensions.contains(&"mkv".to_string()));
        assert!(config.subtitle_extensions.contains(&"srt".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ClientConfig {
            concurrent_workers: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" srt, ,ass,"), vec!["srt", "ass"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_derived_configs() {
        let config = ClientConfig {
            concurrent_workers: 7,
            languages: vec!["eng".into(), "swe".into()],
            ..ClientConfig::default()
        };
        assert_eq!(config.scheduler_config().concurrent_workers, 7);
        assert_eq!(config.protocol_config().languages.len(), 2);
    }
}
