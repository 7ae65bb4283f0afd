#![forbid(unsafe_code)]

//! Core: the host boundary for Weft.
//!
//! # Role in Weft
//! `weft-core` is the layer every other crate talks through. It owns the
//! handle and record types that cross between the runtime and the host
//! document environment, and the traits a host implements to plug in.
//!
//! # Primary responsibilities
//! - **NodeId**: opaque, copyable handle to a host node.
//! - **Target**: tagged variant normalizing "one node, many nodes, or a
//!   selector" at the boundary.
//! - **Event / EventInit / Listener**: delivered events and the callbacks
//!   that receive them.
//! - **MutationRecord / ObserveOptions**: structural-change observation data.
//! - **Host traits**: element resolution, event delivery, timers, and
//!   structural-change observation.
//!
//! # How it fits in the system
//! The runtime (`weft-runtime`) owns all registry state and calls into a
//! [`Host`]. The harness (`weft-harness`) provides a deterministic in-memory
//! host so the runtime can be exercised without a real document.

pub mod error;
pub mod event;
pub mod host;
pub mod logging;
pub mod mutation;
pub mod node;
pub mod target;

pub use error::CoreError;
pub use event::{DeliveryOptions, Event, EventInit, Listener, listener, same_listener};
pub use host::{ElementResolver, EventHost, Host, MutationHost, TimerHost, TimerId};
pub use mutation::{
    MutationCallback, MutationKind, MutationRecord, ObserveFlags, ObserveOptions, ObserverId,
};
pub use node::NodeId;
pub use target::Target;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, error, info, trace, trace_span, warn};
