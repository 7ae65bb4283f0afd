#![forbid(unsafe_code)]

//! Handler Registry: subscribe, unsubscribe and dispatch over a host.
//!
//! Every subscription is recorded in a [`HandlerStore`] under a fresh
//! [`HandlerId`] so it can be removed later without the caller keeping the
//! listener instance around.
//!
//! # Invariants
//!
//! 1. Each `(node, class)` pair produced by a fan-out gets its own record,
//!    its own wrapper, and its own identifier.
//! 2. A record's bound listener stays alive until after the host has
//!    detached it. With `cancel_on_unsubscribe`, dropping a debounce wrapper
//!    cancels its timer, which must not happen while the host is mid-removal.
//! 3. No store borrow is held while calling into the host.
//! 4. A `once` binding retires its own record on its first call, when the
//!    host drops the listener.
//!
//! # Failure Modes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | blank class list | `Err(InvalidEventClass)`, logged at `error!` |
//! | unparseable target or delegate selector | `Err(Core(InvalidSelector))` |
//! | target resolves to nothing | `Ok` with nothing bound or removed |
//! | unknown handler id | `Ok`, nothing removed |

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error, trace};
use weft_core::{Event, EventInit, Host, Listener, NodeId, Target, TimerHost, same_listener};

use super::store::{HandlerId, HandlerRecord, HandlerStore};
use super::{HandlerRef, SubscribeOptions, debounce, delegate, split_classes};
use crate::config::DebounceConfig;
use crate::error::RuntimeError;

/// Event construction flags for [`HandlerRegistry::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub bubbles: bool,
    pub cancelable: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            bubbles: true,
            cancelable: true,
        }
    }
}

impl DispatchOptions {
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

/// Managed event binding over a shared host.
pub struct HandlerRegistry<H: Host + 'static> {
    host: Rc<H>,
    config: DebounceConfig,
    store: Rc<RefCell<HandlerStore>>,
}

impl<H: Host + 'static> std::fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("config", &self.config)
            .field("bound", &self.bound_count())
            .finish_non_exhaustive()
    }
}

impl<H: Host + 'static> HandlerRegistry<H> {
    #[must_use]
    pub fn new(host: Rc<H>, config: DebounceConfig) -> Self {
        Self {
            host,
            config,
            store: Rc::new(RefCell::new(HandlerStore::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Bind `listener` for every class in `classes` on every node `target`
    /// resolves to. Returns one identifier per binding, class-major.
    pub fn subscribe(
        &self,
        target: impl Into<Target>,
        classes: &str,
        listener: Listener,
        options: SubscribeOptions,
    ) -> Result<Vec<HandlerId>, RuntimeError> {
        let target = target.into();
        let classes_list = split_classes(classes);
        if classes_list.is_empty() {
            error!(classes, "subscribe called without an event class");
            return Err(RuntimeError::InvalidEventClass(classes.to_owned()));
        }
        if let Some(selector) = options.delegate.as_deref() {
            self.host.validate_selector(selector)?;
        }
        let nodes = self.host.resolve(&target)?;
        if nodes.is_empty() {
            debug!(?target, classes, "subscribe target matched nothing");
            return Ok(Vec::new());
        }

        let timers: Rc<dyn TimerHost> = self.host.clone();
        let mut ids = Vec::with_capacity(classes_list.len() * nodes.len());
        for class in &classes_list {
            for &node in &nodes {
                let mut bound = self.wrap(node, class, &listener, &options, &timers);
                let own_id: Rc<OnceCell<HandlerId>> = Rc::default();
                if options.delivery.once {
                    bound = retire_on_first_call(bound, Rc::downgrade(&self.store), &own_id);
                }
                self.host
                    .add_listener(node, class, Rc::clone(&bound), options.delivery);
                let record = HandlerRecord::new(
                    node,
                    *class,
                    bound,
                    Rc::clone(&listener),
                    options.clone(),
                );
                let id = self.store.borrow_mut().insert(record);
                let _ = own_id.set(id.clone());
                debug!(handler = %id, %node, class, "subscribed");
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn wrap(
        &self,
        node: NodeId,
        class: &str,
        listener: &Listener,
        options: &SubscribeOptions,
        timers: &Rc<dyn TimerHost>,
    ) -> Listener {
        let base = match options.delegate.as_deref() {
            Some(selector) => delegate::delegate(&self.host, node, selector, Rc::clone(listener)),
            None => Rc::clone(listener),
        };
        debounce::wrap(base, class, options.debounce, &self.config, timers)
    }

    /// Remove bindings.
    ///
    /// With [`HandlerRef::Id`] exactly that subscription is removed. With
    /// [`HandlerRef::Listener`] every binding of that listener (or of a
    /// wrapper built for it) on the resolved nodes and classes is removed.
    pub fn unsubscribe(
        &self,
        target: impl Into<Target>,
        classes: &str,
        handle: impl Into<HandlerRef>,
    ) -> Result<(), RuntimeError> {
        let target = target.into();
        let classes_list = split_classes(classes);
        if classes_list.is_empty() {
            error!(classes, "unsubscribe called without an event class");
            return Err(RuntimeError::InvalidEventClass(classes.to_owned()));
        }
        let nodes = self.host.resolve(&target)?;
        if nodes.is_empty() {
            debug!(?target, classes, "unsubscribe target matched nothing");
            return Ok(());
        }

        match handle.into() {
            HandlerRef::Id(id) => {
                self.remove(&id);
            }
            HandlerRef::Listener(listener) => {
                for class in &classes_list {
                    for &node in &nodes {
                        self.detach_listener(node, class, &listener);
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove one subscription by identifier. Returns whether it existed.
    pub fn remove(&self, id: &HandlerId) -> bool {
        let Some(record) = self.store.borrow_mut().remove(id) else {
            trace!(handler = %id, "unknown handler id");
            return false;
        };
        // A second record may share the same bound listener when the same
        // unwrapped listener was subscribed twice; the host holds it once.
        let shared = {
            let store = self.store.borrow();
            store
                .ids_for(record.node, &record.class)
                .iter()
                .filter_map(|other| store.get(other))
                .any(|other| same_listener(&other.bound, &record.bound))
        };
        if !shared {
            self.host
                .remove_listener(record.node, &record.class, &record.bound);
        }
        debug!(handler = %id, node = %record.node, class = %record.class, "unsubscribed");
        drop(record);
        true
    }

    fn detach_listener(&self, node: NodeId, class: &str, listener: &Listener) {
        let taken = self.store.borrow_mut().take_matching(node, class, listener);
        // Unrecorded listeners may have been added to the host directly.
        self.host.remove_listener(node, class, listener);
        for record in &taken {
            if !same_listener(&record.bound, listener) {
                self.host.remove_listener(node, class, &record.bound);
            }
        }
        if !taken.is_empty() {
            debug!(%node, class, removed = taken.len(), "unsubscribed listener");
        }
        drop(taken);
    }

    /// Synthesize `class` on every node `target` resolves to. Returns the
    /// host's "not canceled" flag per node.
    pub fn dispatch(
        &self,
        target: impl Into<Target>,
        class: &str,
        detail: Option<Value>,
        options: DispatchOptions,
    ) -> Result<Vec<bool>, RuntimeError> {
        let class = class.trim();
        if class.is_empty() {
            error!("dispatch called without an event class");
            return Err(RuntimeError::InvalidEventClass(class.to_owned()));
        }
        let nodes = self.host.resolve(&target.into())?;
        let mut init = EventInit::new(class)
            .with_bubbles(options.bubbles)
            .with_cancelable(options.cancelable);
        init.detail = detail;
        trace!(class, nodes = nodes.len(), "dispatching");
        Ok(nodes
            .into_iter()
            .map(|node| self.host.dispatch_event(node, &init))
            .collect())
    }

    /// Number of live subscription records.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.store.borrow().len()
    }

    /// A copy of the record stored under `id`.
    #[must_use]
    pub fn record(&self, id: &HandlerId) -> Option<HandlerRecord> {
        self.store.borrow().get(id).cloned()
    }

    /// Identifiers bound on `node` for `class`, in binding order.
    #[must_use]
    pub fn handlers_on(&self, node: NodeId, class: &str) -> Vec<HandlerId> {
        self.store.borrow().ids_for(node, class)
    }
}

/// Wrap a `once` binding so its first call drops its record. The host
/// removes the listener itself.
fn retire_on_first_call(
    inner: Listener,
    store: Weak<RefCell<HandlerStore>>,
    own_id: &Rc<OnceCell<HandlerId>>,
) -> Listener {
    let own_id = Rc::clone(own_id);
    Rc::new(move |ev: &Event| {
        let retired = match (store.upgrade(), own_id.get()) {
            (Some(store), Some(id)) => {
                let mut store = store.borrow_mut();
                store.remove(id)
            }
            _ => None,
        };
        if let (Some(record), Some(id)) = (&retired, own_id.get()) {
            debug!(handler = %id, node = %record.node, class = %record.class, "once handler retired");
        }
        inner(ev);
        drop(retired);
    })
}
