//! Report sink that keeps every batch

use std::sync::Mutex;
use subsync_core::{QueueProcessResult, ReportSink};

/// Records flushed batches for later assertions
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<QueueProcessResult>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<QueueProcessResult> {
        self.batches.lock().expect("sink lock poisoned").clone()
    }

    /// Sum of all batches
    pub fn merged(&self) -> QueueProcessResult {
        self.batches()
            .into_iter()
            .fold(QueueProcessResult::default(), |mut acc, batch| {
                acc.total += batch.total;
                acc.succeeded += batch.succeeded;
                acc.failed.extend(batch.failed);
                acc
            })
    }
}

impl ReportSink for RecordingSink {
    fn on_batch(&self, result: &QueueProcessResult) {
        self.batches
            .lock()
            .expect("sink lock poisoned")
            .push(result.clone());
    }
}
