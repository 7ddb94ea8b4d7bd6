//! Plain-text list of already synced videos, one name per line

use crate::Result;
use crate::error::IoError;
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncWriteExt;

/// Default file name of the sync list
pub const SYNC_LIST_FILE: &str = ".sync-cache";

/// Names of videos that already received a subtitle
///
/// `add` appends to the file immediately; `save` rewrites it without
/// duplicates.
#[derive(Debug)]
pub struct SyncList {
    path: PathBuf,
    names: Mutex<BTreeSet<String>>,
}

impl SyncList {
    /// Read the list at `path`; a missing file yields an empty list
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let names = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(IoError::at(&path, e).into()),
        };

        debug!("Loaded {} synced entries from {}", names.len(), path.display());
        Ok(Self {
            path,
            names: Mutex::new(names),
        })
    }

    /// An empty list that will be written to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            names: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record `name` and append it to the file when new
    pub async fn add(&self, name: &str) -> Result<()> {
        if !self.lock().insert(name.to_string()) {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| IoError::at(&self.path, e))?;
        file.write_all(format!("{name}\n").as_bytes())
            .await
            .map_err(|e| IoError::at(&self.path, e))?;
        Ok(())
    }

    /// Rewrite the file from memory
    pub async fn save(&self) -> Result<()> {
        let content: String = self
            .lock()
            .iter()
            .map(|name| format!("{name}\n"))
            .collect();

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| IoError::at(&self.path, e))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let list = SyncList::load(dir.path().join(SYNC_LIST_FILE)).await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_add_appends_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SYNC_LIST_FILE);

        let list = SyncList::load(&path).await.unwrap();
        list.add("b.mkv").await.unwrap();
        list.add("a.mkv").await.unwrap();
        list.add("b.mkv").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "b.mkv\na.mkv\n");

        let reloaded = SyncList::load(&path).await.unwrap();
        assert!(reloaded.contains("a.mkv"));
        assert!(reloaded.contains("b.mkv"));
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_save_rewrites_without_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SYNC_LIST_FILE);
        std::fs::write(&path, "x.mkv\n\nx.mkv\n  \ny.mkv\n").unwrap();

        let list = SyncList::load(&path).await.unwrap();
        list.save().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x.mkv\ny.mkv\n");
    }
}
