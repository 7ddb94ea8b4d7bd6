//! Subtitle provider backends
//!
//! A provider turns a [`SyncItem`] into a subtitle file on disk. Backends are
//! composed with [`FallbackProvider`], which tries them in priority order.

mod fallback;
mod opensubtitles;

pub use fallback::{FallbackProvider, ProviderCache};
pub use opensubtitles::OpenSubtitlesProvider;

use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One unit of work: a video that needs a subtitle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncItem {
    /// Stable identity used for retry and fallback bookkeeping
    pub key: String,
    /// Video file name, used for searching and reporting
    pub name: String,
    /// Directory the subtitle is written to
    pub output_dir: PathBuf,
}

impl SyncItem {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Item for a video on disk, keyed by its full path
    pub fn from_video_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self {
            key: path.to_string_lossy().into_owned(),
            name,
            output_dir,
        }
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        crate::matching::strip_extension(&self.name)
    }
}

/// A backend able to fetch a subtitle for an item
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch a subtitle for `item` into `item.output_dir`, returning its path
    async fn fetch(&self, item: &SyncItem) -> Result<PathBuf>;

    /// Release sessions and background tasks
    async fn close(&self) {}
}
