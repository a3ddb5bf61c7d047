//! In-memory collaborators for exercising the gateway without a live overlay
//!
//! Enabled for this crate's own tests and, through the `tests` feature, for
//! the integration tests of the HTTP and proxy crates.


pub use overlay::{EchoOverlay, RecordedCall};
pub use security::InMemorySecurity;
