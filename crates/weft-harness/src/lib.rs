#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Weft.
//!
//! - [`FakeDocument`]: deterministic in-memory host (tree, events, virtual
//!   timers, batched mutation records).
//! - [`fixtures`]: small prebuilt trees and call recorders shared by the
//!   runtime's integration tests.

pub mod document;
pub mod fixtures;
pub mod selector;

pub use document::FakeDocument;
pub use fixtures::{Call, CallLog, ListFixture};
