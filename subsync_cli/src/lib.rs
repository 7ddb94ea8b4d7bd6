//! Library half of the `subsync` binary
//!
//! Kept separate from `main.rs` so the scan, config and orchestration pieces
//! can be exercised from integration tests.

pub mod auth;
pub mod config;
pub mod file_discovery;
pub mod orchestrators;
pub mod paths;

pub use config::{AppConfig, ConfigManager};
pub use orchestrators::{ResyncMode, SyncOptions, SyncOrchestrator, SyncSummary};
