#![forbid(unsafe_code)]

//! Runtime: reactive primitives over a host document.
//!
//! # Role in Weft
//! `weft-runtime` owns every piece of registry state and drives a host
//! through the traits in `weft-core`. It never touches a document directly.
//!
//! # Primary responsibilities
//! - **HandlerRegistry**: subscribe/unsubscribe/dispatch with fan-out,
//!   delegation, adaptive debouncing, and identifier-based removal.
//! - **Store**: keyed values with change notification and per-key versions.
//! - **ObserverPool**: structural-change observation sharing one host
//!   observer across up to `capacity` nodes.
//! - **Runtime**: the three composed over one host, built once per app.
//!
//! # Threading
//! Everything here is `!Send` and runs on the host's callback queue. No
//! borrow is held across a user callback, so callbacks may re-enter any
//! public operation.
//!
//! # Logging
//! Diagnostics go through `tracing`. Subscription lifecycle and pool growth
//! log at `debug`, per-event detail at `trace`, invalid arguments at `error`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod observer_pool;
pub mod reactive;
pub mod runtime;

pub use config::{DebounceConfig, PoolConfig, RearmPolicy, RuntimeConfig};
pub use error::RuntimeError;
pub use handlers::{
    DebounceMode, DispatchOptions, HandlerId, HandlerRecord, HandlerRef, HandlerRegistry,
    SubscribeOptions,
};
pub use observer_pool::{ObserverPool, RecordCallback};
pub use reactive::{Disposer, Store};
pub use runtime::Runtime;

#[cfg(feature = "tracing-json")]
pub use weft_core::logging::init_json_logging;
