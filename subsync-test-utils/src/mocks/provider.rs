//! Scripted subtitle provider

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subsync_core::error::IoError;
use subsync_core::protocol::ProtocolError;
use subsync_core::{Error, Result, SubtitleProvider, SyncItem};

/// What one `fetch` call does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// Write `<stem>.<provider>.srt` into the output directory
    Succeed,
    /// Fail with `NotFound`
    NotFound,
    /// Fail with a transient transport error
    Transport,
    /// Fail with `NestedArchiveUnsupported`
    NestedArchive,
    /// Panic inside the fetch
    Panic,
}

type FetchHook = Arc<dyn Fn(&SyncItem) + Send + Sync>;

/// Provider with scripted outcomes and call accounting
///
/// Outcomes are consumed in order; once the script is empty the default
/// outcome applies.
///
/// # Examples
///
/// ```rust,no_run
/// use subsync_test_utils::{MockOutcome, MockProvider};
///
/// let provider = MockProvider::new("flaky")
///     .then(MockOutcome::Transport)
///     .otherwise(MockOutcome::Succeed);
/// assert_eq!(provider.calls(), 0);
/// ```
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<MockOutcome>>,
    default: MockOutcome,
    delay: Duration,
    hook: Option<FetchHook>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    /// Provider that succeeds unless scripted otherwise
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            default: MockOutcome::Succeed,
            delay: Duration::ZERO,
            hook: None,
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn working(name: &str) -> Self {
        Self::new(name)
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name).otherwise(MockOutcome::NotFound)
    }

    /// Queue an outcome for the next unscripted call
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(outcome);
        self
    }

    /// Outcome once the script is exhausted
    pub fn otherwise(mut self, outcome: MockOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Sleep for `delay` inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook` at the start of every fetch
    pub fn on_fetch(mut self, hook: impl Fn(&SyncItem) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Total fetch calls
    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Fetch calls for one item key
    pub fn calls_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of fetches running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(self.default)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubtitleProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, item: &SyncItem) -> Result<PathBuf> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .expect("calls lock poisoned")
            .entry(item.key.clone())
            .or_default() += 1;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(hook) = &self.hook {
            hook(item);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.next_outcome() {
            MockOutcome::Succeed => {
                let path = item
                    .output_dir
                    .join(format!("{}.{}.srt", item.stem(), self.name));
                let content = format!("1\n00:00:01,000 --> 00:00:02,000\n{}\n", self.name);
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| IoError::at(&path, e))?;
                Ok(path)
            }
            MockOutcome::NotFound => Err(Error::not_found(&item.name)),
            MockOutcome::Transport => {
                Err(ProtocolError::transport(format!("{} unreachable", self.name)).into())
            }
            MockOutcome::NestedArchive => Err(Error::nested_archive(
                item.output_dir.join(format!("{}.zip", item.stem())),
            )),
            MockOutcome::Panic => panic!("{} panicked fetching {}", self.name, item.name),
        }
    }
}
