use super::{SubtitleProvider, SyncItem};
use crate::Result;
use crate::error::ValidationError;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Minimum number of attempts a chain allows per fetch
const MIN_RETRY: usize = 3;

/// Index of the provider to resume from, per item key
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct ProviderCache {
    entries: Arc<Mutex<HashMap<String, usize>>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index recorded for `key`, if any
    pub fn get(&self, key: &str) -> Option<usize> {
        self.lock().get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn set(&self, key: &str, index: usize) {
        self.lock().insert(key.to_string(), index);
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tries providers in priority order until one succeeds
///
/// After a failure the next provider is tried within the same call. The
/// cache entry for an item lives only while its fetch walks the chain and is
/// removed on success or once the chain is exhausted.
pub struct FallbackProvider {
    providers: Vec<Arc<dyn SubtitleProvider>>,
    cache: ProviderCache,
    max_retry: usize,
}

impl FallbackProvider {
    pub fn new(
        providers: Vec<Arc<dyn SubtitleProvider>>,
    ) -> std::result::Result<Self, ValidationError> {
        Self::with_cache(providers, ProviderCache::new())
    }

    /// Build a chain recording its progress in `cache`
    pub fn with_cache(
        providers: Vec<Arc<dyn SubtitleProvider>>,
        cache: ProviderCache,
    ) -> std::result::Result<Self, ValidationError> {
        if providers.is_empty() {
            return Err(ValidationError::EmptyProviderChain);
        }

        let max_retry = MIN_RETRY.max(providers.len());
        Ok(Self {
            providers,
            cache,
            max_retry,
        })
    }

    pub fn cache(&self) -> &ProviderCache {
        &self.cache
    }

    pub fn max_retry(&self) -> usize {
        self.max_retry
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl SubtitleProvider for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, item: &SyncItem) -> Result<PathBuf> {
        let mut index = self
            .cache
            .get(&item.key)
            .filter(|index| *index < self.providers.len())
            .unwrap_or(0);

        loop {
            let provider = &self.providers[index];
            debug!("Fetching '{}' with provider '{}'", item.name, provider.name());

            match provider.fetch(item).await {
                Ok(path) => {
                    self.cache.remove(&item.key);
                    return Ok(path);
                }
                Err(e) => {
                    let next = index + 1;
                    if next > self.max_retry || next >= self.providers.len() {
                        self.cache.remove(&item.key);
                        return Err(e);
                    }

                    warn!(
                        "Provider '{}' failed for '{}': {e}, trying '{}'",
                        provider.name(),
                        item.name,
                        self.providers[next].name()
                    );
                    self.cache.set(&item.key, next);
                    index = next;
                }
            }
        }
    }

    async fn close(&self) {
        for provider in &self.providers {
            provider.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        succeed: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SubtitleProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, item: &SyncItem) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(item.output_dir.join(format!("{}.srt", self.name)))
            } else {
                Err(Error::not_found(&item.name))
            }
        }
    }

    fn chain_of(providers: &[&Arc<Fixed>]) -> Vec<Arc<dyn SubtitleProvider>> {
        providers
            .iter()
            .map(|p| Arc::clone(*p) as Arc<dyn SubtitleProvider>)
            .collect()
    }

    fn item() -> SyncItem {
        SyncItem::new("k", "Show.S01E02.mkv", "/tmp")
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(
            FallbackProvider::new(Vec::new()),
            Err(ValidationError::EmptyProviderChain)
        ));
    }

    #[test]
    fn test_max_retry_floor() {
        let one = FallbackProvider::new(chain_of(&[&Fixed::new("a", true)])).unwrap();
        assert_eq!(one.max_retry(), 3);

        let providers: Vec<Arc<dyn SubtitleProvider>> =
            (0..5).map(|_| Fixed::new("p", false) as Arc<dyn SubtitleProvider>).collect();
        assert_eq!(FallbackProvider::new(providers).unwrap().max_retry(), 5);
    }

    #[tokio::test]
    async fn test_falls_through_to_working_provider() {
        let a = Fixed::new("a", false);
        let b = Fixed::new("b", false);
        let c = Fixed::new("c", true);
        let chain = FallbackProvider::new(chain_of(&[&a, &b, &c])).unwrap();

        let path = chain.fetch(&item()).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/c.srt"));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
        assert!(!chain.cache().contains("k"));
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_last_error() {
        let a = Fixed::new("a", false);
        let b = Fixed::new("b", false);
        let chain = FallbackProvider::new(chain_of(&[&a, &b])).unwrap();

        let err = chain.fetch(&item()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(chain.cache().is_empty());

        // A later call starts from the top again
        chain.fetch(&item()).await.unwrap_err();
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resumes_from_recorded_index() {
        let a = Fixed::new("a", true);
        let b = Fixed::new("b", true);
        let cache = ProviderCache::new();
        cache.set("k", 1);

        let chain = FallbackProvider::with_cache(chain_of(&[&a, &b]), cache.clone()).unwrap();
        chain.fetch(&item()).await.unwrap();

        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }
}
