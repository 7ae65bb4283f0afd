#![forbid(unsafe_code)]

//! Host traits.
//!
//! The runtime never touches a document directly. A host implements four
//! small traits, one per facility the runtime consumes:
//!
//! | Trait | Facility |
//! |-------|----------|
//! | [`ElementResolver`] | target resolution and tree queries |
//! | [`EventHost`] | listener registration and event dispatch |
//! | [`TimerHost`] | single-shot timers |
//! | [`MutationHost`] | batched structural-change observation |
//!
//! [`Host`] is implemented automatically for any type providing all four.
//!
//! # Threading
//!
//! All methods take `&self` and are called from the host's single callback
//! queue. Implementations use interior mutability and must not hold internal
//! borrows while invoking listener or observer callbacks, since those may
//! call straight back into the host.

use std::time::Duration;

use crate::error::CoreError;
use crate::event::{DeliveryOptions, EventInit, Listener};
use crate::mutation::{MutationCallback, ObserveOptions, ObserverId};
use crate::node::NodeId;
use crate::target::{DOCUMENT_SELECTOR, Target, WINDOW_SELECTOR};

/// Resolves targets to nodes and answers tree queries.
pub trait ElementResolver {
    /// The window node (event bubbling terminates here).
    fn window(&self) -> NodeId;

    /// The document node.
    fn document(&self) -> NodeId;

    /// Every element matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, CoreError>;

    /// Check that `selector` is accepted without running a query.
    fn validate_selector(&self, selector: &str) -> Result<(), CoreError>;

    /// Nearest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, CoreError>;

    /// Whether `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// Normalize a [`Target`] into a sequence of nodes.
    ///
    /// An empty result is not an error; callers decide whether "nothing
    /// matched" is benign.
    fn resolve(&self, target: &Target) -> Result<Vec<NodeId>, CoreError> {
        match target {
            Target::Single(node) => Ok(vec![*node]),
            Target::Many(nodes) => Ok(nodes.clone()),
            Target::BySelector(selector) => {
                let selector = selector.trim();
                let nodes = match selector {
                    WINDOW_SELECTOR => vec![self.window()],
                    DOCUMENT_SELECTOR => vec![self.document()],
                    _ => self.query_all(selector)?,
                };
                #[cfg(feature = "tracing")]
                crate::trace!(selector, matched = nodes.len(), "resolved selector target");
                Ok(nodes)
            }
        }
    }
}

/// Listener registration and event dispatch.
pub trait EventHost {
    /// Register `listener` for `class` on `node`.
    fn add_listener(&self, node: NodeId, class: &str, listener: Listener, options: DeliveryOptions);

    /// Unregister a listener previously added for `class` on `node`.
    /// Unknown listeners are ignored.
    fn remove_listener(&self, node: NodeId, class: &str, listener: &Listener);

    /// Synthesize an event and deliver it synchronously, bubbling if the
    /// init asks for it. Returns `false` if a listener canceled it.
    fn dispatch_event(&self, node: NodeId, init: &EventInit) -> bool;
}

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Single-shot timers.
pub trait TimerHost {
    /// Run `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancel a pending timer. Cancelling a fired or unknown timer is a no-op.
    fn clear_timeout(&self, id: TimerId);
}

/// Batched structural-change observation.
pub trait MutationHost {
    /// Create an observer that delivers every batch to `callback`.
    fn create_observer(&self, callback: MutationCallback) -> ObserverId;

    /// Start (or replace) the observer's registration on `node`.
    fn observe(&self, observer: ObserverId, node: NodeId, options: &ObserveOptions);

    /// Drop every registration of the observer and discard queued records.
    fn disconnect(&self, observer: ObserverId);
}

/// A complete host document environment.
pub trait Host: ElementResolver + EventHost + TimerHost + MutationHost {}

impl<T> Host for T where T: ElementResolver + EventHost + TimerHost + MutationHost {}
