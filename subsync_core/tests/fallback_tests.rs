//! Fallback chain progress tracking

use std::sync::{Arc, Mutex};
use subsync_core::{FallbackProvider, ProviderCache, SubtitleProvider, SyncItem};
use subsync_test_utils::{MockProvider, TestLibrary};

#[tokio::test]
async fn test_cache_points_at_working_provider_while_it_runs() {
    let library = TestLibrary::new();
    let item = SyncItem::from_video_path(&library.video("Show.S01E02.mkv"));

    let cache = ProviderCache::new();
    let observed = Arc::new(Mutex::new(None));

    let a = Arc::new(MockProvider::failing("a"));
    let b = Arc::new(MockProvider::failing("b"));
    let c = {
        let cache = cache.clone();
        let observed = Arc::clone(&observed);
        Arc::new(MockProvider::working("c").on_fetch(move |item| {
            *observed.lock().unwrap() = cache.get(&item.key);
        }))
    };

    let chain = FallbackProvider::with_cache(
        vec![
            a.clone() as Arc<dyn SubtitleProvider>,
            b.clone() as Arc<dyn SubtitleProvider>,
            c.clone() as Arc<dyn SubtitleProvider>,
        ],
        cache.clone(),
    )
    .unwrap();

    let path = chain.fetch(&item).await.unwrap();

    assert!(path.exists());
    assert_eq!(*observed.lock().unwrap(), Some(2));
    assert!(!cache.contains(&item.key));
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
}

#[tokio::test]
async fn test_first_success_skips_the_rest() {
    let library = TestLibrary::new();
    let item = SyncItem::from_video_path(&library.video("Movie.2019.mkv"));

    let a = Arc::new(MockProvider::working("a"));
    let b = Arc::new(MockProvider::working("b"));
    let chain = FallbackProvider::new(vec![
        a.clone() as Arc<dyn SubtitleProvider>,
        b.clone() as Arc<dyn SubtitleProvider>,
    ])
    .unwrap();

    chain.fetch(&item).await.unwrap();
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
    assert!(chain.cache().is_empty());
}
