use super::{SubtitleProvider, SyncItem};
use crate::Result;
use crate::error::Error;
use crate::matching::find_best_match;
use crate::protocol::ProtocolClient;
use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;

/// Provider backed by the OpenSubtitles XML-RPC client
pub struct OpenSubtitlesProvider {
    client: ProtocolClient,
}

impl OpenSubtitlesProvider {
    pub fn new(client: ProtocolClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ProtocolClient {
        &self.client
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        "opensubtitles"
    }

    async fn fetch(&self, item: &SyncItem) -> Result<PathBuf> {
        let candidates = self.client.search(&item.name).await?;
        if candidates.is_empty() {
            return Err(Error::not_found(&item.name));
        }

        let best = find_best_match(&item.name, &candidates, |c| c.display_name.as_str())
            .ok_or_else(|| Error::not_found(&item.name))?;
        debug!(
            "Best match for '{}' is '{}' ({} candidates)",
            item.name,
            best.display_name,
            candidates.len()
        );

        let path = self.client.download(best, &item.output_dir).await?;
        info!("Fetched '{}' for '{}'", best.file_name, item.name);
        Ok(path)
    }

    async fn close(&self) {
        self.client.close().await;
    }
}
