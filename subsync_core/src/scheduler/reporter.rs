//! Batched job outcome reporting

use crate::provider::SyncItem;
use log::{debug, trace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Outcome of one finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub item: SyncItem,
    pub succeeded: bool,
}

impl JobStatus {
    pub fn succeeded(item: SyncItem) -> Self {
        Self {
            item,
            succeeded: true,
        }
    }

    pub fn failed(item: SyncItem) -> Self {
        Self {
            item,
            succeeded: false,
        }
    }
}

/// Counts accumulated between two flushes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueProcessResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<SyncItem>,
}

impl QueueProcessResult {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Consumer of flushed batches
pub trait ReportSink: Send + Sync {
    fn on_batch(&self, result: &QueueProcessResult);
}

/// Forwards batches to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<QueueProcessResult>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueProcessResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ReportSink for ChannelSink {
    fn on_batch(&self, result: &QueueProcessResult) {
        if self.sender.send(result.clone()).is_err() {
            debug!("Report receiver dropped, batch discarded");
        }
    }
}

/// Aggregates job outcomes and flushes them only when something changed
pub struct QueueProcessReporter {
    state: Mutex<QueueProcessResult>,
    changes: AtomicUsize,
    sink: Option<Arc<dyn ReportSink>>,
}

impl QueueProcessReporter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueProcessResult::default()),
            changes: AtomicUsize::new(0),
            sink: None,
        }
    }

    pub fn with_sink(sink: Arc<dyn ReportSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Record one finished job
    pub fn report(&self, status: JobStatus) {
        trace!("Reporting {:?} for '{}'", status.succeeded, status.item.name);
        {
            let mut state = self.lock();
            state.total += 1;
            if status.succeeded {
                state.succeeded += 1;
            } else {
                state.failed.push(status.item);
            }
        }
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    /// Emit the accumulated batch if anything was reported since the last flush
    pub fn finish_report(&self) -> Option<QueueProcessResult> {
        if self.changes.swap(0, Ordering::SeqCst) == 0 {
            return None;
        }

        let result = std::mem::take(&mut *self.lock());
        debug!(
            "Flushing report: {} total, {} succeeded, {} failed",
            result.total,
            result.succeeded,
            result.failed.len()
        );
        if let Some(sink) = &self.sink {
            sink.on_batch(&result);
        }
        Some(result)
    }

    /// Whether a flush would emit a batch
    pub fn is_dirty(&self) -> bool {
        self.changes.load(Ordering::SeqCst) > 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueProcessResult> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for QueueProcessReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> SyncItem {
        SyncItem::new(name, name, "/tmp")
    }

    #[test]
    fn test_no_report_no_batch() {
        let reporter = QueueProcessReporter::new();
        assert!(!reporter.is_dirty());
        assert_eq!(reporter.finish_report(), None);
        assert_eq!(reporter.finish_report(), None);
    }

    #[test]
    fn test_single_report_single_batch() {
        let reporter = QueueProcessReporter::new();
        reporter.report(JobStatus::succeeded(item("a.mkv")));

        let batch = reporter.finish_report().unwrap();
        assert_eq!(batch.total, 1);
        assert_eq!(batch.succeeded, 1);
        assert!(batch.failed.is_empty());

        assert_eq!(reporter.finish_report(), None);
    }

    #[test]
    fn test_counters_reset_after_flush() {
        let reporter = QueueProcessReporter::new();
        reporter.report(JobStatus::succeeded(item("a.mkv")));
        reporter.report(JobStatus::failed(item("b.mkv")));

        let batch = reporter.finish_report().unwrap();
        assert_eq!(batch.total, 2);
        assert_eq!(batch.failed, vec![item("b.mkv")]);

        reporter.report(JobStatus::failed(item("c.mkv")));
        let batch = reporter.finish_report().unwrap();
        assert_eq!(batch.total, 1);
        assert_eq!(batch.succeeded, 0);
        assert_eq!(batch.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_receives_batches() {
        let (sink, mut rx) = ChannelSink::new();
        let reporter = QueueProcessReporter::with_sink(Arc::new(sink));

        reporter.report(JobStatus::succeeded(item("a.mkv")));
        reporter.finish_report();
        reporter.finish_report();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.total, 1);
        assert!(rx.try_recv().is_err());
    }
}
