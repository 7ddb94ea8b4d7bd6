//! Video discovery for library scans
//!
//! Finds video files below a directory, honoring exclude patterns and the
//! library's ignore file, and answers whether a video already has a
//! subtitle next to it.

mod extensions;
mod filter;
mod walker;

pub use extensions::{is_sample, subtitle_beside};
pub use filter::read_ignore_file;
pub use walker::{FileDiscovery, FileDiscoveryOptions, discover_files};

use std::path::PathBuf;

/// Result of file discovery
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path to the discovered file
    pub path: PathBuf,
    /// Size of the file in bytes
    pub size: u64,
}

/// Error type for file discovery operations
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Result type for file discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
