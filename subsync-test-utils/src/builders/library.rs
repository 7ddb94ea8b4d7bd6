//! Temporary video library fixture

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory populated with fake videos and subtitles
///
/// The directory is removed when the library is dropped.
pub struct TestLibrary {
    dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file at `relative`, creating parent directories
    pub fn file(&self, relative: &str) -> PathBuf {
        self.write(relative, b"")
    }

    /// Create a file with `content` at `relative`
    pub fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create directories");
        }
        fs::write(&path, content).expect("failed to write fixture");
        path
    }

    /// Add a video and return its path
    pub fn video(&self, relative: &str) -> PathBuf {
        self.write(relative, b"\x1a\x45\xdf\xa3")
    }

    /// Add a video with a subtitle beside it
    pub fn subtitled_video(&self, relative: &str, subtitle_ext: &str) -> PathBuf {
        let video = self.video(relative);
        fs::write(video.with_extension(subtitle_ext), b"1\n").expect("failed to write subtitle");
        video
    }
}

impl Default for TestLibrary {
    fn default() -> Self {
        Self::new()
    }
}
