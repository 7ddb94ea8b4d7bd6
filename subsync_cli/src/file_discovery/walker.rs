//! Directory walker module for video discovery
//!
//! Streams video files below a library root using walkdir. Patterns are
//! matched against the path relative to the root.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::{
    DiscoveredFile, DiscoveryError, Result,
    extensions::{extensions_to_patterns, is_sample},
    filter::{FileFilter, read_ignore_file},
};
use crate::paths::IGNORE_FILE;

/// Options for video discovery
#[derive(Debug, Clone)]
pub struct FileDiscoveryOptions {
    /// Video extensions to look for, without the dot
    pub video_extensions: Vec<String>,
    /// Patterns to exclude in addition to the library's ignore file
    pub exclude_patterns: Vec<String>,
    /// Read `.subsyncignore` from the library root
    pub use_ignore_file: bool,
    /// Follow symbolic links
    pub follow_links: bool,
}

impl Default for FileDiscoveryOptions {
    fn default() -> Self {
        Self {
            video_extensions: subsync_core::split_list(subsync_core::DEFAULT_VIDEO_EXTENSIONS),
            exclude_patterns: Vec::new(),
            use_ignore_file: true,
            follow_links: false,
        }
    }
}

impl FileDiscoveryOptions {
    /// Create new options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video_extensions(mut self, extensions: Vec<String>) -> Self {
        self.video_extensions = extensions;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_ignore_file(mut self, use_ignore_file: bool) -> Self {
        self.use_ignore_file = use_ignore_file;
        self
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

/// Video discovery iterator for streaming file enumeration
pub struct FileDiscovery {
    root: PathBuf,
    walker: walkdir::IntoIter,
    filter: FileFilter,
}

impl FileDiscovery {
    /// Create a new discovery iterator over `root`
    pub fn new(root: &Path, options: FileDiscoveryOptions) -> Result<Self> {
        if !root.is_dir() {
            return Err(DiscoveryError::PathNotFound(root.to_path_buf()));
        }

        let mut exclude_patterns = options.exclude_patterns;
        if options.use_ignore_file {
            let ignored = read_ignore_file(&root.join(IGNORE_FILE))?;
            if !ignored.is_empty() {
                log::debug!("Loaded {} ignore pattern(s) from {IGNORE_FILE}", ignored.len());
            }
            exclude_patterns.extend(ignored);
        }

        let include_patterns = extensions_to_patterns(&options.video_extensions);
        if include_patterns.is_empty() {
            return Err(DiscoveryError::InvalidPattern(
                "no video extensions configured".to_string(),
            ));
        }

        let filter = FileFilter::new(include_patterns, exclude_patterns)?;
        let walker = WalkDir::new(root)
            .follow_links(options.follow_links)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root: root.to_path_buf(),
            walker,
            filter,
        })
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn should_include_entry(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_file() || is_sample(entry.path()) {
            return false;
        }

        self.filter.should_include(self.relative(entry.path()))
    }
}

impl Iterator for FileDiscovery {
    type Item = Result<DiscoveredFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Walk error: {e}");
                    continue;
                }
            };

            // Prune excluded directories instead of walking into them
            if entry.file_type().is_dir()
                && entry.depth() > 0
                && self.filter.is_excluded(self.relative(entry.path()))
            {
                log::debug!("Skipping excluded directory {}", entry.path().display());
                self.walker.skip_current_dir();
                continue;
            }

            if !self.should_include_entry(&entry) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => {
                    return Some(Ok(DiscoveredFile {
                        path: entry.path().to_path_buf(),
                        size: metadata.len(),
                    }));
                }
                Err(e) => {
                    log::warn!("Failed to read metadata for {:?}: {}", entry.path(), e);
                }
            }
        }
    }
}

/// Convenience function to discover videos in a directory
pub fn discover_files(path: &Path, options: FileDiscoveryOptions) -> Result<Vec<DiscoveredFile>> {
    FileDiscovery::new(path, options)?.collect()
}
