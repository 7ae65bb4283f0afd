#![forbid(unsafe_code)]

//! Events delivered by the host and the listeners that receive them.
//!
//! # Design
//!
//! An [`Event`] is cheap to clone: the class name and payload are shared
//! behind `Rc`, and the cancellation flags live in a shared cell so that a
//! clone handed to a debounced or delegated listener still reports
//! `prevent_default` back to the dispatcher.
//!
//! ## Invariants
//! 1. `origin` never changes for the lifetime of a dispatch.
//! 2. `current_target` is the node whose listener is running.
//! 3. `subject` equals `current_target` unless a delegating listener
//!    rewrote it to the matched descendant.
//! 4. `prevent_default` is a no-op on non-cancelable events and on events
//!    delivered to passive listeners.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::node::NodeId;

/// Callback registered with the host for an event class.
///
/// Listener identity is pointer identity: two clones of the same `Rc` are the
/// same listener, two separately boxed closures never are.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Box a closure as a [`Listener`].
pub fn listener(f: impl Fn(&Event) + 'static) -> Listener {
    Rc::new(f)
}

/// Whether two listeners are the same instance.
#[must_use]
pub fn same_listener(a: &Listener, b: &Listener) -> bool {
    Rc::ptr_eq(a, b)
}

/// Per-registration delivery flags forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
    /// The listener promises not to call `prevent_default`.
    pub passive: bool,
}

/// Parameters for synthesizing an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInit {
    pub class: String,
    pub bubbles: bool,
    pub cancelable: bool,
    /// Structured payload; `None` synthesizes a plain event.
    pub detail: Option<Value>,
}

impl EventInit {
    /// A bubbling, cancelable event without payload.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            bubbles: true,
            cancelable: true,
            detail: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    #[must_use]
    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }
}

#[derive(Debug, Default)]
struct DispatchFlags {
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

/// An event in flight.
#[derive(Clone)]
pub struct Event {
    class: Rc<str>,
    origin: NodeId,
    current: NodeId,
    subject: NodeId,
    detail: Option<Rc<Value>>,
    bubbles: bool,
    cancelable: bool,
    passive: bool,
    flags: Rc<DispatchFlags>,
}

impl Event {
    /// Create an event originating at `origin`. Hosts call this once per
    /// dispatch and then retarget clones as the event bubbles.
    #[must_use]
    pub fn new(init: &EventInit, origin: NodeId) -> Self {
        Self {
            class: Rc::from(init.class.as_str()),
            origin,
            current: origin,
            subject: origin,
            detail: init.detail.clone().map(Rc::new),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            passive: false,
            flags: Rc::default(),
        }
    }

    /// Event class name (`"click"`, `"scroll"`, ...).
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The node the event was dispatched on.
    #[must_use]
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// The node whose listener is currently running.
    #[must_use]
    pub fn current_target(&self) -> NodeId {
        self.current
    }

    /// The node the listener should act on. For delegated listeners this is
    /// the matched descendant, otherwise the current target.
    #[must_use]
    pub fn subject(&self) -> NodeId {
        self.subject
    }

    /// Structured payload, if the event carries one.
    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_deref()
    }

    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    #[must_use]
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Request cancellation of the host's default action.
    pub fn prevent_default(&self) {
        if self.cancelable && !self.passive {
            self.flags.default_prevented.set(true);
        }
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.flags.default_prevented.get()
    }

    /// Stop bubbling after the current node's listeners finish.
    pub fn stop_propagation(&self) {
        self.flags.propagation_stopped.set(true);
    }

    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.flags.propagation_stopped.get()
    }

    /// Clone retargeted at `node` for delivery to its listeners.
    #[must_use]
    pub fn at(&self, node: NodeId, passive: bool) -> Self {
        Self {
            current: node,
            subject: node,
            passive,
            ..self.clone()
        }
    }

    /// Clone whose subject is `node`, keeping the current target.
    #[must_use]
    pub fn with_subject(&self, node: NodeId) -> Self {
        Self {
            subject: node,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("class", &self.class)
            .field("origin", &self.origin)
            .field("current", &self.current)
            .field("subject", &self.subject)
            .field("detail", &self.detail)
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_cancellation_state() {
        let ev = Event::new(&EventInit::new("click"), NodeId::from_raw(3));
        let delegated = ev.at(NodeId::from_raw(1), false).with_subject(NodeId::from_raw(2));
        delegated.prevent_default();
        assert!(ev.default_prevented());
        assert_eq!(delegated.current_target(), NodeId::from_raw(1));
        assert_eq!(delegated.subject(), NodeId::from_raw(2));
        assert_eq!(delegated.origin(), NodeId::from_raw(3));
    }

    #[test]
    fn passive_and_non_cancelable_ignore_prevent_default() {
        let init = EventInit::new("wheel");
        let ev = Event::new(&init, NodeId::from_raw(1));
        ev.at(NodeId::from_raw(1), true).prevent_default();
        assert!(!ev.default_prevented());

        let plain = Event::new(&init.with_cancelable(false), NodeId::from_raw(1));
        plain.prevent_default();
        assert!(!plain.default_prevented());
    }

    #[test]
    fn detail_round_trips_through_init() {
        let ev = Event::new(
            &EventInit::new("saved").with_detail(json!({"id": 7})),
            NodeId::from_raw(1),
        );
        assert_eq!(ev.detail(), Some(&json!({"id": 7})));
        assert!(ev.bubbles());
    }

    #[test]
    fn listener_identity_is_pointer_identity() {
        let a = listener(|_| {});
        let b = listener(|_| {});
        assert!(same_listener(&a, &Rc::clone(&a)));
        assert!(!same_listener(&a, &b));
    }
}
