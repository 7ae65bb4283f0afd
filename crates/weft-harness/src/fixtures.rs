#![forbid(unsafe_code)]

//! Shared fixtures.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use weft_core::{Event, Listener, NodeId, listener};

use crate::document::FakeDocument;

/// `<ul id="list">` with `n` `<li class="item">` children, a nested
/// `<span class="label">` inside the first item, and a sibling
/// `<div id="outside" class="item">` that is not under the list.
#[derive(Debug, Clone)]
pub struct ListFixture {
    pub list: NodeId,
    pub items: Vec<NodeId>,
    pub label: NodeId,
    pub outside: NodeId,
}

impl ListFixture {
    pub fn build(doc: &FakeDocument, n: usize) -> Self {
        let root = weft_core::ElementResolver::document(doc);
        let list = doc.element(root, "ul#list");
        let items: Vec<NodeId> = (0..n.max(1)).map(|_| doc.element(list, "li.item")).collect();
        let label = doc.element(items[0], "span.label");
        let outside = doc.element(root, "div#outside.item");
        Self {
            list,
            items,
            label,
            outside,
        }
    }
}

/// One recorded listener invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub class: String,
    pub origin: NodeId,
    pub current: NodeId,
    pub subject: NodeId,
    pub detail: Option<Value>,
}

impl From<&Event> for Call {
    fn from(ev: &Event) -> Self {
        Self {
            class: ev.class().to_owned(),
            origin: ev.origin(),
            current: ev.current_target(),
            subject: ev.subject(),
            detail: ev.detail().cloned(),
        }
    }
}

/// Records every event a listener receives.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh listener instance appending to this log.
    #[must_use]
    pub fn listener(&self) -> Listener {
        let calls = Rc::clone(&self.calls);
        listener(move |ev| calls.borrow_mut().push(Call::from(ev)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Call> {
        self.calls.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}
