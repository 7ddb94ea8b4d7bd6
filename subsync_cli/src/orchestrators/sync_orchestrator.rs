//! Sync command orchestrator
//!
//! Scans a library, enqueues the videos that still need subtitles and
//! prints each batch report the scheduler flushes.

use crate::config::AppConfig;
use crate::file_discovery::{FileDiscovery, FileDiscoveryOptions, subtitle_beside};
use crate::paths;
use anyhow::{Context, Result};
use colored::*;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use subsync_core::protocol::ProtocolClient;
use subsync_core::security::FileCredentialProvider;
use subsync_core::{
    ArchiveFinalizer, ChannelSink, FallbackProvider, JobScheduler, OpenSubtitlesProvider,
    QueueProcessReporter, QueueProcessResult, SubtitleProvider, SyncItem, SyncList,
};
use tokio::sync::mpsc;

/// Which already-handled videos get fetched again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncMode {
    /// Only videos without a subtitle beside them
    #[default]
    Missing,
    /// Also videos whose subtitle was not fetched by subsync
    Unsynced,
    /// Every discovered video
    All,
}

impl ResyncMode {
    pub fn from_flags(resync: bool, resync_all: bool) -> Self {
        if resync_all {
            Self::All
        } else if resync {
            Self::Unsynced
        } else {
            Self::Missing
        }
    }

    /// Whether a video needs a fetch
    ///
    /// `synced` means the sync list has the video; `has_subtitle` means a
    /// `<stem>.<subtitle ext>` file sits next to it.
    pub fn needs_sync(self, synced: bool, has_subtitle: bool) -> bool {
        match self {
            Self::All => true,
            _ if synced && has_subtitle => false,
            Self::Unsynced => true,
            Self::Missing => !has_subtitle,
        }
    }
}

/// Sync command options
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Library root to scan
    pub root: PathBuf,
    /// Extra exclude patterns
    pub exclude_patterns: Vec<String>,
    pub mode: ResyncMode,
    /// Return once the queue drains instead of waiting for Ctrl-C
    pub exit_when_done: bool,
    /// Sync list location; defaults to a hidden file in the library root
    pub sync_list: Option<PathBuf>,
}

impl SyncOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_patterns: Vec::new(),
            mode: ResyncMode::default(),
            exit_when_done: false,
            sync_list: None,
        }
    }

    fn sync_list_path(&self) -> PathBuf {
        self.sync_list
            .clone()
            .unwrap_or_else(|| paths::default_sync_list_path(&self.root))
    }
}

/// Videos selected by a library scan
#[derive(Debug, Default)]
pub struct ScanResult {
    pub videos: Vec<PathBuf>,
    pub skipped: usize,
}

/// Totals across every batch of one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub skipped: usize,
}

impl SyncSummary {
    fn absorb(&mut self, report: &QueueProcessResult) {
        self.processed += report.total;
        self.succeeded += report.succeeded;
        self.failed
            .extend(report.failed.iter().map(|item| item.name.clone()));
    }
}

/// Orchestrator for the sync command
pub struct SyncOrchestrator {
    config: AppConfig,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(config: AppConfig, options: SyncOptions) -> Self {
        debug!("Creating sync orchestrator with options: {options:?}");
        Self { config, options }
    }

    /// Walk the library and pick the videos that need a subtitle
    pub fn scan(&self, sync_list: &SyncList) -> Result<ScanResult> {
        let discovery_options = FileDiscoveryOptions::new()
            .with_video_extensions(self.config.client.video_extensions.clone())
            .with_exclude_patterns(self.options.exclude_patterns.clone());
        let discovery = FileDiscovery::new(&self.options.root, discovery_options)
            .with_context(|| format!("Failed to scan {}", self.options.root.display()))?;

        let subtitle_extensions = &self.config.client.subtitle_extensions;
        let mut result = ScanResult::default();
        let mut total_bytes = 0u64;

        for file in discovery {
            let file = file?;
            let name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let synced = sync_list.contains(&name);
            let has_subtitle = subtitle_beside(&file.path, subtitle_extensions).is_some();

            if self.options.mode.needs_sync(synced, has_subtitle) {
                total_bytes += file.size;
                result.videos.push(file.path);
            } else {
                debug!("Skipping {}", file.path.display());
                result.skipped += 1;
            }
        }

        info!(
            "Scan found {} video(s) to sync ({} bytes), {} skipped",
            result.videos.len(),
            total_bytes,
            result.skipped
        );
        Ok(result)
    }

    /// Build the OpenSubtitles provider chain
    pub fn build_provider(&self) -> Result<Arc<dyn SubtitleProvider>> {
        let credentials = Arc::new(FileCredentialProvider::new(paths::get_auth_path()));
        let client = ProtocolClient::connect(self.config.protocol_config(), credentials)
            .context("Failed to create protocol client")?;

        let chain: Vec<Arc<dyn SubtitleProvider>> =
            vec![Arc::new(OpenSubtitlesProvider::new(client))];
        let fallback = FallbackProvider::new(chain).context("Failed to build provider chain")?;
        Ok(Arc::new(fallback))
    }

    /// Run against the OpenSubtitles backend
    pub async fn run(self) -> Result<SyncSummary> {
        self.config
            .client
            .validate()
            .context("Invalid client configuration")?;
        let provider = self.build_provider()?;
        self.run_with(provider).await
    }

    /// Run against `provider`
    pub async fn run_with(self, provider: Arc<dyn SubtitleProvider>) -> Result<SyncSummary> {
        let sync_list = Arc::new(
            SyncList::load(self.options.sync_list_path())
                .await
                .context("Failed to load sync list")?,
        );
        let scan = self.scan(&sync_list)?;

        print_banner(&self.options);

        let (sink, mut reports) = ChannelSink::new();
        let reporter = Arc::new(QueueProcessReporter::with_sink(Arc::new(sink)));
        let scheduler = JobScheduler::builder(Arc::clone(&provider))
            .config(self.config.client.scheduler_config())
            .finalizer(Arc::new(ArchiveFinalizer::new(
                &self.config.client.subtitle_extensions,
            )))
            .sync_list(Arc::clone(&sync_list))
            .reporter(reporter)
            .build();

        let mut summary = SyncSummary {
            skipped: scan.skipped,
            ..SyncSummary::default()
        };
        let mut pending_skipped = scan.skipped;

        let enqueued = scan
            .videos
            .iter()
            .filter(|video| scheduler.enqueue(SyncItem::from_video_path(video)))
            .count();

        if enqueued == 0 {
            print_report(
                &QueueProcessResult::default(),
                std::mem::take(&mut pending_skipped),
            );
        }

        if enqueued > 0 || !self.options.exit_when_done {
            scheduler.start();
            if !self.options.exit_when_done {
                println!("  Press {} to quit.", "Ctrl-C".green());
                println!();
            }
            self.wait(&scheduler, &mut reports, &sync_list, &mut summary, &mut pending_skipped)
                .await?;
        }

        scheduler.stop().await;
        while let Ok(report) = reports.try_recv() {
            summary.absorb(&report);
            print_report(&report, std::mem::take(&mut pending_skipped));
        }

        provider.close().await;
        sync_list.save().await.context("Failed to save sync list")?;
        Ok(summary)
    }

    async fn wait(
        &self,
        scheduler: &JobScheduler,
        reports: &mut mpsc::UnboundedReceiver<QueueProcessResult>,
        sync_list: &SyncList,
        summary: &mut SyncSummary,
        pending_skipped: &mut usize,
    ) -> Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                report = reports.recv() => {
                    let Some(report) = report else {
                        break;
                    };
                    summary.absorb(&report);
                    print_report(&report, std::mem::take(pending_skipped));
                    sync_list.save().await.context("Failed to save sync list")?;

                    if self.options.exit_when_done && scheduler.is_idle() {
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn print_banner(options: &SyncOptions) {
    println!("{}", format!("subsync v{}", env!("CARGO_PKG_VERSION")).bold());
    println!("  Synchronizing subtitles for");
    println!("    {}", options.root.display().to_string().white().bold());
    println!();
}

fn print_report(report: &QueueProcessResult, skipped: usize) {
    if report.total == 0 && skipped == 0 {
        return;
    }

    println!();
    println!(
        " Synchronization completed with a total of {} video(s) processed.",
        report.total.to_string().yellow()
    );
    println!("    {skipped} video(s) were skipped.");
    if report.succeeded > 0 {
        println!(
            "    {} video(s) were successfully synchronized.",
            report.succeeded.to_string().green()
        );
    }
    if !report.failed.is_empty() {
        println!(
            "    {} video(s) failed to synchronize.",
            report.failed_count().to_string().red()
        );
        for item in &report.failed {
            println!("    {}", format!("* {}", item.name).red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resync_mode_from_flags() {
        assert_eq!(ResyncMode::from_flags(false, false), ResyncMode::Missing);
        assert_eq!(ResyncMode::from_flags(true, false), ResyncMode::Unsynced);
        assert_eq!(ResyncMode::from_flags(true, true), ResyncMode::All);
    }

    #[test]
    fn test_missing_mode_skips_subtitled_videos() {
        let mode = ResyncMode::Missing;
        assert!(mode.needs_sync(false, false));
        assert!(mode.needs_sync(true, false));
        assert!(!mode.needs_sync(false, true));
        assert!(!mode.needs_sync(true, true));
    }

    #[test]
    fn test_unsynced_mode_refetches_foreign_subtitles() {
        let mode = ResyncMode::Unsynced;
        assert!(mode.needs_sync(false, true));
        assert!(!mode.needs_sync(true, true));
    }

    #[test]
    fn test_all_mode_refetches_everything() {
        let mode = ResyncMode::All;
        assert!(mode.needs_sync(true, true));
        assert!(mode.needs_sync(false, false));
    }

    #[test]
    fn test_sync_list_defaults_to_library_root() {
        let options = SyncOptions::new("/media/shows");
        assert_eq!(
            options.sync_list_path(),
            paths::default_sync_list_path(std::path::Path::new("/media/shows"))
        );
    }
}
