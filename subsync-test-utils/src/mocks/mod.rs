//! Mock implementations for testing

mod provider;
mod sink;
mod transport;

pub use provider::{MockOutcome, MockProvider};
pub use sink::RecordingSink;
pub use transport::{MockTransport, RecordedRequest};
