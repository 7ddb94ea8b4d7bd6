//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;
use subsync_core::QueueProcessResult;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

/// Scheduler settings that keep tests fast
pub fn fast_scheduler_config(workers: usize) -> subsync_core::SchedulerConfig {
    subsync_core::SchedulerConfig {
        concurrent_workers: workers,
        retry_limit: 3,
        idle_interval: Duration::from_millis(10),
        retry_backoff: Duration::from_millis(10),
    }
}

/// Receive batches until `total` outcomes were reported, merging them
pub async fn collect_reports(
    rx: &mut UnboundedReceiver<QueueProcessResult>,
    total: usize,
) -> QueueProcessResult {
    let mut merged = QueueProcessResult::default();
    while merged.total < total {
        let batch = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for a report")
            .expect("report channel closed");
        merged.total += batch.total;
        merged.succeeded += batch.succeeded;
        merged.failed.extend(batch.failed);
    }
    merged
}
