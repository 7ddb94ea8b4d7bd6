//! Command orchestrators for business logic
//!
//! This module provides orchestrators that coordinate between the CLI layer
//! and the core library services.

pub mod sync_orchestrator;

pub use sync_orchestrator::{ResyncMode, SyncOptions, SyncOrchestrator, SyncSummary};
