//! Property-based invariant tests for the store, the pool, and debouncing.
//!
//! **Store:**
//! 1. Watchers see exactly the sequence of distinct consecutive writes.
//! 2. Version equals the number of value-changing writes.
//! 3. Snapshot equals the last write per key.
//!
//! **Observer pool:**
//! 4. Every entry holds at most `capacity` nodes.
//! 5. Every observed node lives in exactly one entry.
//! 6. Entries only grow when every existing entry is full.
//!
//! **Debounce:**
//! 7. A burst with gaps shorter than the window yields one call carrying the
//!    last event.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;
use weft_core::{ElementResolver, NodeId};
use weft_harness::{CallLog, FakeDocument};
use weft_runtime::{
    DebounceConfig, DispatchOptions, HandlerRegistry, ObserverPool, PoolConfig, Store,
    SubscribeOptions,
};

// ── Strategies ────────────────────────────────────────────────────────────

fn writes_strategy() -> impl Strategy<Value = Vec<(u8, i8)>> {
    proptest::collection::vec((0u8..4, -3i8..=3), 0..64)
}

#[derive(Debug, Clone)]
enum PoolOp {
    Observe(usize),
    Disconnect(usize),
}

fn pool_ops_strategy(nodes: usize) -> impl Strategy<Value = Vec<PoolOp>> {
    proptest::collection::vec(
        prop_oneof![
            3 => (0..nodes).prop_map(PoolOp::Observe),
            1 => (0..nodes).prop_map(PoolOp::Disconnect),
        ],
        0..80,
    )
}

// ── Store ─────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn store_notifies_exactly_on_change(writes in writes_strategy()) {
        let store: Store<i8> = Store::new();
        let seen: Rc<RefCell<BTreeMap<String, Vec<i8>>>> = Rc::default();
        let keys: Vec<String> = (0..4).map(|k| format!("k{k}")).collect();
        let _disposers: Vec<_> = keys
            .iter()
            .map(|key| {
                let seen = Rc::clone(&seen);
                let key_owned = key.clone();
                store.watch(key, move |v| {
                    seen.borrow_mut().entry(key_owned.clone()).or_default().push(*v);
                })
            })
            .collect();

        let mut expected: BTreeMap<String, Vec<i8>> = BTreeMap::new();
        let mut last: BTreeMap<String, i8> = BTreeMap::new();
        for (k, v) in &writes {
            let key = &keys[usize::from(*k)];
            if last.get(key) != Some(v) {
                expected.entry(key.clone()).or_default().push(*v);
                last.insert(key.clone(), *v);
            }
            prop_assert_eq!(store.set(key, *v), *v);
        }

        prop_assert_eq!(&*seen.borrow(), &expected);
        for key in &keys {
            let changes = expected.get(key).map_or(0, Vec::len) as u64;
            prop_assert_eq!(store.version(key), changes);
        }
        prop_assert_eq!(store.snapshot(), last);
    }
}

// ── Observer pool ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn pool_entries_respect_capacity(
        capacity in 1usize..6,
        ops in pool_ops_strategy(12),
    ) {
        let doc = FakeDocument::new();
        let root = doc.document();
        let nodes: Vec<NodeId> = (0..12).map(|_| doc.element(root, "div")).collect();
        let pool = ObserverPool::new(
            Rc::clone(&doc),
            PoolConfig::default().with_capacity(capacity),
        );
        let mut observed = std::collections::BTreeSet::new();

        for op in ops {
            match op {
                PoolOp::Observe(i) => {
                    let before = pool.entry_sizes();
                    pool.observe(nodes[i], |_, _| {}, None).unwrap();
                    let grew = pool.entry_count() > before.len();
                    if grew {
                        prop_assert!(before.iter().all(|&n| n == capacity));
                    }
                    observed.insert(i);
                }
                PoolOp::Disconnect(i) => {
                    let entries = pool.entry_count();
                    pool.disconnect(nodes[i]).unwrap();
                    prop_assert_eq!(pool.entry_count(), entries);
                    observed.remove(&i);
                }
            }
            prop_assert!(pool.entry_sizes().iter().all(|&n| n <= capacity));
            prop_assert_eq!(pool.observed_count(), observed.len());
            for (i, node) in nodes.iter().enumerate() {
                prop_assert_eq!(pool.is_observed(*node), observed.contains(&i));
            }
        }
    }
}

// ── Debounce ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn burst_yields_one_call_with_the_last_event(
        gaps in proptest::collection::vec(0u64..5, 1..30),
    ) {
        let doc = FakeDocument::new();
        let root = doc.document();
        let node = doc.element(root, "div");
        let events = HandlerRegistry::new(Rc::clone(&doc), DebounceConfig::default());
        let log = CallLog::new();
        events
            .subscribe(node, "input", log.listener(), SubscribeOptions::new())
            .unwrap();

        for (i, gap) in gaps.iter().enumerate() {
            events
                .dispatch(node, "input", Some(json!(i)), DispatchOptions::default())
                .unwrap();
            doc.advance(Duration::from_millis(*gap));
        }
        doc.advance(Duration::from_millis(5));

        prop_assert_eq!(log.len(), 1);
        prop_assert_eq!(log.last().unwrap().detail, Some(json!(gaps.len() - 1)));
    }
}
