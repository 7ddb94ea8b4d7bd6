//! Bounded-concurrency job scheduler
//!
//! The scheduler owns a pending queue and a per-key retry count. One dispatch
//! task pulls jobs while fewer than `concurrent_workers` are in flight, waits
//! for any of them to finish and flushes the reporter once the working set
//! drains. Failed jobs go back through [`JobScheduler::enqueue`] so the retry
//! ceiling is enforced in one place.

mod reporter;

pub use reporter::{ChannelSink, JobStatus, QueueProcessReporter, QueueProcessResult, ReportSink};

use crate::Result;
use crate::error::InternalError;
use crate::finalize::SubtitleFinalizer;
use crate::provider::{SubtitleProvider, SyncItem};
use crate::sync_list::SyncList;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum jobs in flight
    pub concurrent_workers: usize,
    /// Maximum times one key may be enqueued
    pub retry_limit: u32,
    /// Sleep between polls while idle
    pub idle_interval: Duration,
    /// Delay per attempt number before a retried job starts
    pub retry_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrent_workers: 5,
            retry_limit: 3,
            idle_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// A queued item with the number of earlier attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAttempt {
    pub item: SyncItem,
    pub attempt: u32,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub pending: usize,
    pub in_flight: usize,
    pub tracked_keys: usize,
    pub running: bool,
}

struct Shared {
    config: SchedulerConfig,
    provider: Arc<dyn SubtitleProvider>,
    finalizer: Option<Arc<dyn SubtitleFinalizer>>,
    sync_list: Option<Arc<SyncList>>,
    reporter: Arc<QueueProcessReporter>,
    queue: Mutex<VecDeque<JobAttempt>>,
    retries: Mutex<HashMap<String, u32>>,
    /// Changed only while `queue` is locked
    in_flight: AtomicUsize,
}

struct Dispatcher {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Builder for [`JobScheduler`]
pub struct JobSchedulerBuilder {
    config: SchedulerConfig,
    provider: Arc<dyn SubtitleProvider>,
    finalizer: Option<Arc<dyn SubtitleFinalizer>>,
    sync_list: Option<Arc<SyncList>>,
    reporter: Option<Arc<QueueProcessReporter>>,
}

impl JobSchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Post-process every fetched file (decompress, rename)
    pub fn finalizer(mut self, finalizer: Arc<dyn SubtitleFinalizer>) -> Self {
        self.finalizer = Some(finalizer);
        self
    }

    /// Record successfully synced items
    pub fn sync_list(mut self, sync_list: Arc<SyncList>) -> Self {
        self.sync_list = Some(sync_list);
        self
    }

    pub fn reporter(mut self, reporter: Arc<QueueProcessReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> JobScheduler {
        let config = SchedulerConfig {
            concurrent_workers: self.config.concurrent_workers.max(1),
            ..self.config
        };

        JobScheduler {
            shared: Arc::new(Shared {
                config,
                provider: self.provider,
                finalizer: self.finalizer,
                sync_list: self.sync_list,
                reporter: self
                    .reporter
                    .unwrap_or_else(|| Arc::new(QueueProcessReporter::new())),
                queue: Mutex::new(VecDeque::new()),
                retries: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
            }),
            dispatcher: Mutex::new(None),
        }
    }
}

/// Dispatches fetch jobs with bounded concurrency and capped retries
pub struct JobScheduler {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl JobScheduler {
    pub fn builder(provider: Arc<dyn SubtitleProvider>) -> JobSchedulerBuilder {
        JobSchedulerBuilder {
            config: SchedulerConfig::default(),
            provider,
            finalizer: None,
            sync_list: None,
            reporter: None,
        }
    }

    /// Queue an item unless it reached the retry limit.
    ///
    /// Returns `false` when the item is dropped for good.
    pub fn enqueue(&self, item: SyncItem) -> bool {
        self.shared.enqueue(item)
    }

    /// Start the dispatch task. No-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut dispatcher = self.lock_dispatcher();
        if dispatcher.is_some() {
            return;
        }

        info!(
            "Starting scheduler with {} workers",
            self.shared.config.concurrent_workers
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(dispatch_loop(Arc::clone(&self.shared), shutdown_rx));
        *dispatcher = Some(Dispatcher { shutdown, handle });
    }

    /// Stop dispatching and wait for in-flight jobs. No-op when stopped.
    pub async fn stop(&self) {
        let dispatcher = self.lock_dispatcher().take();
        let Some(dispatcher) = dispatcher else {
            return;
        };

        info!("Stopping scheduler");
        let _ = dispatcher.shutdown.send(true);
        if let Err(e) = dispatcher.handle.await {
            error!("Dispatch task ended abnormally: {e}");
        }
    }

    /// Drop pending jobs and forget retry counts; in-flight jobs continue
    pub fn reset(&self) {
        let dropped = {
            let mut queue = self.shared.lock_queue();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        self.shared.lock_retries().clear();
        debug!("Scheduler reset, {dropped} pending jobs dropped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_dispatcher().is_some()
    }

    /// No pending and no in-flight jobs
    pub fn is_idle(&self) -> bool {
        let queue = self.shared.lock_queue();
        queue.is_empty() && self.shared.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Attempts recorded for `key`
    pub fn retry_count(&self, key: &str) -> u32 {
        self.shared.lock_retries().get(key).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> SchedulerStats {
        let pending = self.shared.lock_queue().len();
        SchedulerStats {
            pending,
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
            tracked_keys: self.shared.lock_retries().len(),
            running: self.is_running(),
        }
    }

    pub fn reporter(&self) -> &Arc<QueueProcessReporter> {
        &self.shared.reporter
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    fn lock_dispatcher(&self) -> std::sync::MutexGuard<'_, Option<Dispatcher>> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.lock_dispatcher().take() {
            let _ = dispatcher.shutdown.send(true);
        }
    }
}

impl Shared {
    fn enqueue(&self, item: SyncItem) -> bool {
        let attempt = {
            let mut retries = self.lock_retries();
            let tries = retries.get(&item.key).copied().unwrap_or(0);
            if tries >= self.config.retry_limit {
                debug!("'{}' reached the retry limit, dropping", item.name);
                return false;
            }
            retries.insert(item.key.clone(), tries + 1);
            tries
        };

        self.lock_queue().push_back(JobAttempt { item, attempt });
        true
    }

    /// Take the next job and count it as in flight
    fn take_next(&self) -> Option<JobAttempt> {
        let mut queue = self.lock_queue();
        let job = queue.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(job)
    }

    fn finish_job(&self) {
        let _queue = self.lock_queue();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn process(&self, item: &SyncItem) -> Result<PathBuf> {
        let fetched = self.provider.fetch(item).await?;
        let path = match &self.finalizer {
            Some(finalizer) => finalizer.finalize(&fetched, item).await?,
            None => fetched,
        };

        // The subtitle is on disk at this point, so a failed write only loses
        // the record until the next save
        if let Some(sync_list) = &self.sync_list
            && let Err(e) = sync_list.add(&item.name).await
        {
            warn!("Could not record {} as synced: {e}", item.name);
        }
        Ok(path)
    }

    async fn run(&self, job: JobAttempt) {
        if job.attempt > 0 {
            tokio::time::sleep(self.config.retry_backoff * job.attempt).await;
        }

        info!("Synchronizing {}", job.item.name);
        let outcome = AssertUnwindSafe(self.process(&job.item))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                Err(InternalError::job_panicked(&job.item.key, message).into())
            });

        match outcome {
            Ok(path) => {
                info!("Subtitle {} downloaded", path.display());
                self.reporter.report(JobStatus::succeeded(job.item));
            }
            Err(e) => {
                error!("Synchronization of {} failed with: {e}", job.item.name);
                if !e.is_retryable() || !self.enqueue(job.item.clone()) {
                    self.reporter.report(JobStatus::failed(job.item));
                }
            }
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<JobAttempt>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_retries(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.retries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn dispatch_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut active = JoinSet::new();

    loop {
        while active.len() < shared.config.concurrent_workers {
            let Some(job) = shared.take_next() else {
                break;
            };
            let shared = Arc::clone(&shared);
            active.spawn(async move {
                shared.run(job).await;
                shared.finish_job();
            });
        }

        if active.is_empty() {
            shared.reporter.finish_report();
            tokio::select! {
                _ = tokio::time::sleep(shared.config.idle_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        } else if let Some(Err(e)) = active.join_next().await {
            warn!("Job task failed to complete: {e}");
        }

        if *shutdown.borrow() {
            break;
        }
    }

    // In-flight jobs finish on their own; nothing is aborted mid-download
    while let Some(joined) = active.join_next().await {
        if let Err(e) = joined {
            warn!("Job task failed to complete: {e}");
        }
    }
    shared.reporter.finish_report();
    debug!("Dispatch loop stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
