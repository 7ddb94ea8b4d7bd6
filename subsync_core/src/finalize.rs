//! Post-processing of fetched subtitle files
//!
//! A fetched file may be a gzip or zip archive or carry the upstream release
//! name.
//! Finalizing unpacks what can be unpacked and renames the subtitle after the
//! video so media players pick it up.

use crate::Result;
use crate::error::{Error, IoError};
use crate::provider::SyncItem;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

/// Archive formats recognized by extension
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "gzip", "gz", "7z", "tar"];

/// Turns a fetched file into the final subtitle beside the video
#[async_trait]
pub trait SubtitleFinalizer: Send + Sync {
    async fn finalize(&self, fetched: &Path, item: &SyncItem) -> Result<PathBuf>;
}

/// Unpacks gzip and zip archives and renames the subtitle after the video
#[derive(Debug, Clone)]
pub struct ArchiveFinalizer {
    subtitle_extensions: Vec<String>,
}

impl ArchiveFinalizer {
    /// Create a finalizer accepting the given subtitle extensions (without dots)
    pub fn new<I, S>(subtitle_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            subtitle_extensions: subtitle_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn is_subtitle(&self, extension: &str) -> bool {
        self.subtitle_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    async fn decompress_gzip(&self, archive: &Path) -> Result<PathBuf> {
        let compressed = tokio::fs::read(archive)
            .await
            .map_err(|e| IoError::at(archive, e))?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut content = Vec::new();
        decoder
            .read_to_end(&mut content)
            .map_err(|e| IoError::at(archive, e))?;

        let inner_name = decoder
            .header()
            .and_then(|header| header.filename())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .and_then(|name| {
                Path::new(&name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| file_stem(archive));

        let inner_ext = subtitle_extension(&inner_name);
        if is_archive(&inner_ext) {
            warn!("Nested archive '{inner_name}' inside {}", archive.display());
            return Err(Error::nested_archive(archive));
        }
        if !self.is_subtitle(&inner_ext) {
            warn!(
                "No subtitle found in {}, archive kept",
                archive.display()
            );
            return Err(Error::not_found(archive.display().to_string()));
        }

        let target = archive.with_file_name(&inner_name);
        tokio::fs::write(&target, &content)
            .await
            .map_err(|e| IoError::at(&target, e))?;
        tokio::fs::remove_file(archive)
            .await
            .map_err(|e| IoError::at(archive, e))?;

        debug!("Unpacked {} to {}", archive.display(), target.display());
        Ok(target)
    }

    async fn unpack_zip(&self, archive: &Path) -> Result<PathBuf> {
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|e| IoError::at(archive, e))?;
        let (inner_name, content) = self.zip_subtitle(archive, &bytes)?;

        let target = archive.with_file_name(&inner_name);
        tokio::fs::write(&target, &content)
            .await
            .map_err(|e| IoError::at(&target, e))?;
        tokio::fs::remove_file(archive)
            .await
            .map_err(|e| IoError::at(archive, e))?;

        debug!("Unpacked {} to {}", archive.display(), target.display());
        Ok(target)
    }

    /// First subtitle entry of a zip archive as `(file name, content)`
    fn zip_subtitle(&self, archive: &Path, bytes: &[u8]) -> Result<(String, Vec<u8>)> {
        let corrupt =
            |e: ZipError| IoError::at(archive, std::io::Error::new(ErrorKind::InvalidData, e));
        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;

        let mut nested = false;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(corrupt)?;
            if entry.is_dir() {
                continue;
            }
            // Entries escaping the archive root have no enclosed name
            let Some(name) = entry
                .enclosed_name()
                .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            else {
                continue;
            };

            let ext = subtitle_extension(&name);
            if self.is_subtitle(&ext) {
                let mut content = Vec::new();
                entry
                    .read_to_end(&mut content)
                    .map_err(|e| IoError::at(archive, e))?;
                return Ok((name, content));
            }
            nested |= is_archive(&ext);
        }

        if nested {
            warn!("Only nested archives inside {}", archive.display());
            return Err(Error::nested_archive(archive));
        }
        warn!("No subtitle found in {}, archive kept", archive.display());
        Err(Error::not_found(archive.display().to_string()))
    }
}

impl Default for ArchiveFinalizer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SUBTITLE_EXTENSIONS.split(','))
    }
}

#[async_trait]
impl SubtitleFinalizer for ArchiveFinalizer {
    async fn finalize(&self, fetched: &Path, item: &SyncItem) -> Result<PathBuf> {
        let mut subtitle = fetched.to_path_buf();
        let ext = lower_extension(fetched);

        if ext == "gz" || ext == "gzip" {
            if file_stem(fetched).to_lowercase().ends_with(".tar") {
                return Err(Error::unsupported_archive(fetched, "tar.gz"));
            }
            subtitle = self.decompress_gzip(fetched).await?;
        } else if ext == "zip" {
            subtitle = self.unpack_zip(fetched).await?;
        } else if is_archive(&ext) {
            warn!("Unsupported archive {}, kept for manual handling", fetched.display());
            return Err(Error::unsupported_archive(fetched, ext));
        }

        let file_name = subtitle
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = subtitle_extension(&file_name);
        let target_name = if ext.is_empty() {
            item.stem().to_string()
        } else {
            format!("{}.{ext}", item.stem())
        };
        let target = item.output_dir.join(target_name);

        if target != subtitle {
            tokio::fs::rename(&subtitle, &target)
                .await
                .map_err(|e| IoError::at(&subtitle, e))?;
        }
        Ok(target)
    }
}

/// Extension of a subtitle file name, lowercased; `.srt.txt` counts as `srt`
fn subtitle_extension(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".srt.txt") {
        return "srt".to_string();
    }
    lower_extension(Path::new(&lower))
}

fn lower_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_archive(extension: &str) -> bool {
    ARCHIVE_EXTENSIONS.contains(&extension)
}
