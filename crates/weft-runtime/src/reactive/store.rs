#![forbid(unsafe_code)]

//! Keyed value store with change notification and version tracking.
//!
//! # Design
//!
//! [`Store<V>`] keeps one slot per key in shared storage
//! (`Rc<RefCell<..>>`). A slot holds the current value (absent until the
//! first `set`), a change counter, and the ordered watcher list. Slots are
//! created on first `set` or `watch` and never removed.
//!
//! # Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `get()` | O(1) + clone |
//! | `set()` | O(W) where W = watchers of the key |
//! | `watch()` | O(1) amortized |
//! | `Disposer::dispose()` | O(W) |
//!
//! # Failure Modes
//!
//! - **Re-entrant writes**: watchers run with no borrow held, so calling
//!   `set`, `watch` or `dispose` from a watcher is allowed. A nested `set`
//!   notifies its own watcher snapshot before the outer loop resumes.
//! - **Watcher leak**: watchers live until their [`Disposer`] is used.
//!   Dropping the disposer without calling it keeps the watcher registered.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::trace;

type Watcher<V> = Rc<dyn Fn(&V)>;

struct Slot<V> {
    value: Option<V>,
    version: u64,
    watchers: Vec<(u64, Watcher<V>)>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            version: 0,
            watchers: Vec::new(),
        }
    }
}

struct StoreInner<V> {
    slots: FxHashMap<String, Slot<V>>,
    next_watcher: u64,
}

/// A shared keyed store.
///
/// Cloning a `Store` creates a new handle to the **same** state.
pub struct Store<V> {
    inner: Rc<RefCell<StoreInner<V>>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                slots: FxHashMap::default(),
                next_watcher: 0,
            })),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let values: BTreeMap<&str, &V> = inner
            .slots
            .iter()
            .filter_map(|(k, s)| s.value.as_ref().map(|v| (k.as_str(), v)))
            .collect();
        f.debug_struct("Store").field("values", &values).finish()
    }
}

impl<V: Clone + PartialEq + 'static> Store<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if it was ever set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner
            .borrow()
            .slots
            .get(key)
            .and_then(|s| s.value.clone())
    }

    /// Store `value` under `key` and return it.
    ///
    /// If `value` equals the current value nothing happens. Equality is
    /// `PartialEq`, so an equal but freshly built value (a new
    /// `json!({..})` with the same fields, say) is also a no-op. Otherwise the
    /// key's version is bumped and every watcher registered at this moment is
    /// called with the new value, in registration order.
    pub fn set(&self, key: &str, value: V) -> V {
        let watchers: Vec<Watcher<V>> = {
            let mut inner = self.inner.borrow_mut();
            let slot = inner.slots.entry(key.to_owned()).or_default();
            if slot.value.as_ref() == Some(&value) {
                return value;
            }
            slot.value = Some(value.clone());
            slot.version += 1;
            slot.watchers.iter().map(|(_, w)| Rc::clone(w)).collect()
        };
        trace!(key, watchers = watchers.len(), "state changed");
        for watcher in &watchers {
            watcher(&value);
        }
        value
    }

    /// Compute a new value from the current one and [`set`](Self::set) it.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&V>) -> V) -> V {
        let current = self.get(key);
        let next = f(current.as_ref());
        self.set(key, next)
    }

    /// Call `callback` with the new value every time `key` changes.
    pub fn watch(&self, key: &str, callback: impl Fn(&V) + 'static) -> Disposer<V> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_watcher;
        inner.next_watcher += 1;
        inner
            .slots
            .entry(key.to_owned())
            .or_default()
            .watchers
            .push((id, Rc::new(callback)));
        Disposer {
            store: Rc::downgrade(&self.inner),
            key: key.to_owned(),
            id,
        }
    }

    /// Number of value-changing writes to `key`.
    #[must_use]
    pub fn version(&self, key: &str) -> u64 {
        self.inner.borrow().slots.get(key).map_or(0, |s| s.version)
    }

    /// Number of watchers registered on `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner
            .borrow()
            .slots
            .get(key)
            .map_or(0, |s| s.watchers.len())
    }

    /// Keys holding a value, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .borrow()
            .slots
            .iter()
            .filter(|(_, s)| s.value.is_some())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Copy of every stored value, keyed and sorted.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter_map(|(k, s)| s.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    /// Dump every stored value as a JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>
    where
        V: Serialize,
    {
        serde_json::to_value(self.snapshot())
    }
}

/// Removes one watcher registered through [`Store::watch`].
///
/// Disposing twice, or after the store is gone, does nothing.
pub struct Disposer<V> {
    store: Weak<RefCell<StoreInner<V>>>,
    key: String,
    id: u64,
}

impl<V> Disposer<V> {
    /// Remove the watcher. Returns whether it was still registered.
    pub fn dispose(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        let removed = {
            let mut inner = store.borrow_mut();
            let Some(slot) = inner.slots.get_mut(&self.key) else {
                return false;
            };
            let pos = slot.watchers.iter().position(|(id, _)| *id == self.id);
            pos.map(|i| slot.watchers.remove(i))
        };
        removed.is_some()
    }
}

impl<V> std::fmt::Debug for Disposer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
