#![forbid(unsafe_code)]

//! Observer Pool: capacity-bounded sharing of host mutation observers.
//!
//! Each entry owns one host observer and serves up to `capacity` nodes, each
//! with its own callback. A batch delivered to an entry is split by record
//! target and routed to the callback registered for exactly that node.
//!
//! # Invariants
//!
//! 1. Every observed node appears in exactly one entry.
//! 2. A new entry is created only when every existing entry is full.
//! 3. `disconnect` never removes entries; [`ObserverPool::compact`] does.
//! 4. Lookups happen at delivery time, so a node disconnected while a batch
//!    is in flight receives nothing for the rest of that batch.
//! 5. No pool borrow is held while calling into the host, so a host may
//!    deliver records synchronously from `observe` or `disconnect`.
//!
//! # Failure Modes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | `observe` target resolves to nothing | `Err(NoTarget)` |
//! | `disconnect` target resolves to nothing | `Ok`, no-op |
//! | record target is a descendant, not an observed node | not delivered |
//!
//! Disconnecting one node stops the entry's host observer and re-arms the
//! survivors. Under [`RearmPolicy::Defaults`] survivors lose any custom
//! options they were observed with.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};
use weft_core::{
    ElementResolver, MutationCallback, MutationHost, MutationRecord, NodeId, ObserveOptions,
    ObserverId, Target,
};

use crate::config::{PoolConfig, RearmPolicy};
use crate::error::RuntimeError;

/// Per-node observation callback.
pub type RecordCallback = Rc<dyn Fn(&MutationRecord, ObserverId)>;

struct PoolSlot {
    node: NodeId,
    callback: RecordCallback,
    options: ObserveOptions,
}

type Slots = Rc<RefCell<Vec<PoolSlot>>>;

struct PoolEntry {
    observer: ObserverId,
    slots: Slots,
}

impl PoolEntry {
    fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    fn holds(&self, node: NodeId) -> bool {
        self.slots.borrow().iter().any(|s| s.node == node)
    }
}

/// Host callback for one entry: route each record to its node's callback.
fn route(slots: Weak<RefCell<Vec<PoolSlot>>>) -> MutationCallback {
    Rc::new(move |records: &[MutationRecord], observer: ObserverId| {
        let Some(slots) = slots.upgrade() else {
            return;
        };
        for record in records {
            let callback = slots
                .borrow()
                .iter()
                .find(|s| s.node == record.target)
                .map(|s| Rc::clone(&s.callback));
            match callback {
                Some(callback) => callback(record, observer),
                None => trace!(node = %record.target, "record for unobserved node dropped"),
            }
        }
    })
}

/// Capacity-pooled mutation observation over a shared host.
pub struct ObserverPool<H: ElementResolver + MutationHost + 'static> {
    host: Rc<H>,
    config: PoolConfig,
    entries: RefCell<Vec<PoolEntry>>,
}

impl<H: ElementResolver + MutationHost + 'static> std::fmt::Debug for ObserverPool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverPool")
            .field("config", &self.config)
            .field("entry_sizes", &self.entry_sizes())
            .finish_non_exhaustive()
    }
}

impl<H: ElementResolver + MutationHost + 'static> ObserverPool<H> {
    #[must_use]
    pub fn new(host: Rc<H>, config: PoolConfig) -> Self {
        Self {
            host,
            config: config.with_capacity(config.capacity),
            entries: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Observe every node `target` resolves to, routing its records to
    /// `callback`. `options` defaults to attributes, child list, and subtree.
    ///
    /// Observing a node that is already observed replaces its callback and
    /// options in place.
    pub fn observe(
        &self,
        target: impl Into<Target>,
        callback: impl Fn(&MutationRecord, ObserverId) + 'static,
        options: Option<ObserveOptions>,
    ) -> Result<(), RuntimeError> {
        let target = target.into();
        let nodes = self.host.resolve(&target)?;
        if nodes.is_empty() {
            error!(?target, "no target provided for mutation observer");
            return Err(RuntimeError::NoTarget);
        }
        let callback: RecordCallback = Rc::new(callback);
        let options = options.unwrap_or_default();

        for node in nodes {
            let observer = self.place(PoolSlot {
                node,
                callback: Rc::clone(&callback),
                options: options.clone(),
            });
            self.host.observe(observer, node, &options);
            trace!(%node, observer = observer.as_raw(), "observing");
        }
        Ok(())
    }

    /// Put `slot` in the entry already holding its node, else in the first
    /// entry below capacity, else in a new entry. Returns that entry's
    /// observer.
    fn place(&self, slot: PoolSlot) -> ObserverId {
        let mut replaced = None;
        let placed = {
            let entries = self.entries.borrow();
            let holder = entries
                .iter()
                .find(|e| e.holds(slot.node))
                .or_else(|| entries.iter().find(|e| e.len() < self.config.capacity));
            match holder {
                Some(entry) => {
                    let mut slots = entry.slots.borrow_mut();
                    match slots.iter_mut().find(|s| s.node == slot.node) {
                        Some(existing) => replaced = Some(std::mem::replace(existing, slot)),
                        None => slots.push(slot),
                    }
                    Ok(entry.observer)
                }
                None => Err(slot),
            }
        };
        drop(replaced);
        let slot = match placed {
            Ok(observer) => return observer,
            Err(slot) => slot,
        };

        let slots: Slots = Rc::new(RefCell::new(Vec::with_capacity(self.config.capacity)));
        slots.borrow_mut().push(slot);
        let observer = self.host.create_observer(route(Rc::downgrade(&slots)));
        let mut entries = self.entries.borrow_mut();
        entries.push(PoolEntry { observer, slots });
        debug!(
            entries = entries.len(),
            capacity = self.config.capacity,
            "observer pool grew"
        );
        observer
    }

    /// Stop observing every node `target` resolves to.
    ///
    /// For each node the first entry holding it drops it, disconnects its
    /// host observer, and re-arms the remaining nodes per the rearm policy.
    pub fn disconnect(&self, target: impl Into<Target>) -> Result<(), RuntimeError> {
        let nodes = self.host.resolve(&target.into())?;
        for node in nodes {
            let detached = {
                let entries = self.entries.borrow();
                entries.iter().find(|e| e.holds(node)).map(|entry| {
                    let mut slots = entry.slots.borrow_mut();
                    let removed = slots
                        .iter()
                        .position(|s| s.node == node)
                        .map(|pos| slots.remove(pos));
                    let rearm: Vec<(NodeId, ObserveOptions)> = slots
                        .iter()
                        .map(|s| (s.node, self.rearm_options(s)))
                        .collect();
                    (entry.observer, rearm, removed)
                })
            };
            let Some((observer, rearm, removed)) = detached else {
                trace!(%node, "disconnect for unobserved node");
                continue;
            };
            self.host.disconnect(observer);
            for (survivor, options) in &rearm {
                self.host.observe(observer, *survivor, options);
            }
            debug!(%node, rearmed = rearm.len(), "disconnected");
            drop(removed);
        }
        Ok(())
    }

    fn rearm_options(&self, slot: &PoolSlot) -> ObserveOptions {
        match self.config.rearm {
            RearmPolicy::Defaults => ObserveOptions::default(),
            RearmPolicy::Retained => slot.options.clone(),
        }
    }

    /// Retire entries that no longer serve any node. Returns how many were
    /// removed.
    pub fn compact(&self) -> usize {
        let retired: Vec<PoolEntry> = {
            let mut entries = self.entries.borrow_mut();
            let (empty, live): (Vec<_>, Vec<_>) =
                entries.drain(..).partition(|e| e.len() == 0);
            *entries = live;
            empty
        };
        for entry in &retired {
            self.host.disconnect(entry.observer);
        }
        if !retired.is_empty() {
            debug!(retired = retired.len(), "observer pool compacted");
        }
        retired.len()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Number of nodes served by each entry, in creation order.
    #[must_use]
    pub fn entry_sizes(&self) -> Vec<usize> {
        self.entries.borrow().iter().map(PoolEntry::len).collect()
    }

    /// Total number of observed nodes.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.entry_sizes().iter().sum()
    }

    #[must_use]
    pub fn is_observed(&self, node: NodeId) -> bool {
        self.entries.borrow().iter().any(|e| e.holds(node))
    }

    /// Host observer serving `node`, if any.
    #[must_use]
    pub fn observer_for(&self, node: NodeId) -> Option<ObserverId> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.holds(node))
            .map(|e| e.observer)
    }
}
