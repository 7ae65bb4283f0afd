#![forbid(unsafe_code)]

//! Handler Store: the identifier → registration table.
//!
//! The store is the single source of truth for what the registry has bound.
//! It never talks to the host; the registry detaches listeners after taking
//! records out.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use weft_core::{Listener, NodeId, same_listener};

use super::SubscribeOptions;

/// Process-wide counter so identifiers stay unique across runtimes.
static NEXT_HANDLER: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(String);

impl HandlerId {
    fn next() -> (Self, u64) {
        let seq = NEXT_HANDLER.fetch_add(1, Ordering::Relaxed);
        (Self(format!("h{seq:08x}")), seq)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One subscription as the registry bound it.
#[derive(Clone)]
pub struct HandlerRecord {
    pub node: NodeId,
    pub class: String,
    /// What was registered with the host (possibly delegating/debounced).
    pub bound: Listener,
    /// What the caller passed.
    pub raw: Listener,
    pub options: SubscribeOptions,
    seq: u64,
}

impl HandlerRecord {
    #[must_use]
    pub fn new(
        node: NodeId,
        class: impl Into<String>,
        bound: Listener,
        raw: Listener,
        options: SubscribeOptions,
    ) -> Self {
        Self {
            node,
            class: class.into(),
            bound,
            raw,
            options,
            seq: 0,
        }
    }

    fn uses(&self, listener: &Listener) -> bool {
        same_listener(&self.raw, listener) || same_listener(&self.bound, listener)
    }
}

impl fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("node", &self.node)
            .field("class", &self.class)
            .field("wrapped", &!same_listener(&self.raw, &self.bound))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Identifier-keyed table of subscription records.
#[derive(Default)]
pub struct HandlerStore {
    records: FxHashMap<HandlerId, HandlerRecord>,
}

impl fmt::Debug for HandlerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerStore")
            .field("len", &self.records.len())
            .finish()
    }
}

impl HandlerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under a freshly generated identifier.
    pub fn insert(&mut self, mut record: HandlerRecord) -> HandlerId {
        let (id, seq) = HandlerId::next();
        record.seq = seq;
        self.records.insert(id.clone(), record);
        id
    }

    pub fn remove(&mut self, id: &HandlerId) -> Option<HandlerRecord> {
        self.records.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &HandlerId) -> Option<&HandlerRecord> {
        self.records.get(id)
    }

    /// Remove every record on `(node, class)` that was bound for `listener`,
    /// either as the caller's listener or as the wrapper handed to the host.
    /// Returned in binding order.
    pub fn take_matching(
        &mut self,
        node: NodeId,
        class: &str,
        listener: &Listener,
    ) -> Vec<HandlerRecord> {
        let ids: Vec<HandlerId> = self
            .records
            .iter()
            .filter(|(_, r)| r.node == node && r.class == class && r.uses(listener))
            .map(|(id, _)| id.clone())
            .collect();
        let mut taken: Vec<HandlerRecord> =
            ids.iter().filter_map(|id| self.records.remove(id)).collect();
        taken.sort_by_key(|r| r.seq);
        taken
    }

    /// Identifiers bound on `node` for `class`, in binding order.
    #[must_use]
    pub fn ids_for(&self, node: NodeId, class: &str) -> Vec<HandlerId> {
        let mut matching: Vec<(&HandlerId, u64)> = self
            .records
            .iter()
            .filter(|(_, r)| r.node == node && r.class == class)
            .map(|(id, r)| (id, r.seq))
            .collect();
        matching.sort_by_key(|(_, seq)| *seq);
        matching.into_iter().map(|(id, _)| id.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use weft_core::listener;

    fn record(node: u64, class: &str, l: &Listener) -> HandlerRecord {
        HandlerRecord::new(
            NodeId::from_raw(node),
            class,
            Rc::clone(l),
            Rc::clone(l),
            SubscribeOptions::default(),
        )
    }

    #[test]
    fn identifiers_are_unique() {
        let mut store = HandlerStore::new();
        let l = listener(|_| {});
        let a = store.insert(record(1, "click", &l));
        let b = store.insert(record(1, "click", &l));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.ids_for(NodeId::from_raw(1), "click"), vec![a, b]);
    }

    #[test]
    fn remove_by_id_is_exact() {
        let mut store = HandlerStore::new();
        let l = listener(|_| {});
        let a = store.insert(record(1, "click", &l));
        let b = store.insert(record(1, "click", &l));
        assert!(store.remove(&a).is_some());
        assert!(store.remove(&a).is_none());
        assert!(store.get(&b).is_some());
    }

    #[test]
    fn take_matching_matches_raw_or_bound() {
        let mut store = HandlerStore::new();
        let raw = listener(|_| {});
        let wrapper = listener(|_| {});
        let other = listener(|_| {});
        store.insert(HandlerRecord::new(
            NodeId::from_raw(1),
            "scroll",
            Rc::clone(&wrapper),
            Rc::clone(&raw),
            SubscribeOptions::default(),
        ));
        store.insert(record(1, "scroll", &other));
        store.insert(record(2, "scroll", &raw));

        let taken = store.take_matching(NodeId::from_raw(1), "scroll", &raw);
        assert_eq!(taken.len(), 1);
        assert!(same_listener(&taken[0].bound, &wrapper));
        assert_eq!(store.len(), 2);
        assert!(store.take_matching(NodeId::from_raw(1), "scroll", &wrapper).is_empty());
    }
}
