#![forbid(unsafe_code)]

//! Keyed reactive state.
//!
//! - [`Store`]: string-keyed values with per-key watchers and versions.
//! - [`Disposer`]: handle that removes one watcher.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the current one is a no-op (no version bump,
//!    no notifications).
//! 2. Watchers of a key are notified in registration order.
//! 3. A change notifies exactly the watchers registered when it happened.

pub mod store;

pub use store::{Disposer, Store};
