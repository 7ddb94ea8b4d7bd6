//! Test utilities for SubSync
//!
//! This crate provides mock providers, a scripted XML-RPC transport, report
//! recorders and builders for service responses and video libraries.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{SubtitleEntry, TestLibrary, responses};
pub use mocks::{MockOutcome, MockProvider, MockTransport, RecordedRequest, RecordingSink};
