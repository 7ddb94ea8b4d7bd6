//! Builders for service responses and test fixtures

mod library;
pub mod responses;

pub use library::TestLibrary;
pub use responses::SubtitleEntry;
