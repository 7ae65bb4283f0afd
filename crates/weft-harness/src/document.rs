#![forbid(unsafe_code)]

//! Deterministic in-memory document host.
//!
//! [`FakeDocument`] implements every `weft_core` host trait over a small
//! node tree so runtime behavior can be driven step by step:
//!
//! ```text
//! build tree ──► runtime.subscribe/observe ──► fire / mutate
//!                                                 │
//!            advance(dt) ◄── timers queued ◄──────┤
//!       flush_mutations() ◄── records queued ◄────┘
//! ```
//!
//! # Determinism
//!
//! - Time only moves through [`FakeDocument::advance`]. Timers due at the
//!   same instant fire in scheduling order.
//! - Mutation records queue until [`FakeDocument::flush_mutations`], which
//!   delivers one batch per observer in observer creation order.
//! - Event delivery is synchronous and follows parent links up to the
//!   window node.
//!
//! # Re-entrancy
//!
//! No internal borrow is held while a listener, timer, or observer callback
//! runs; callbacks may freely mutate the document or call back into the host.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use weft_core::{
    CoreError, DeliveryOptions, ElementResolver, Event, EventHost, EventInit, Listener,
    MutationCallback, MutationHost, MutationKind, MutationRecord, NodeId, ObserveFlags,
    ObserveOptions, ObserverId, TimerHost, TimerId, same_listener,
};

use crate::selector::{Selector, SelectorTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Window,
    Document,
    Element,
}

struct Registered {
    class: String,
    listener: Listener,
    options: DeliveryOptions,
}

struct NodeData {
    kind: NodeKind,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Registered>,
}

impl NodeData {
    fn new(kind: NodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

struct ObserverData {
    callback: MutationCallback,
    registrations: Vec<(NodeId, ObserveOptions)>,
    queue: Vec<MutationRecord>,
}

#[derive(Default)]
struct Timers {
    now: Duration,
    next_id: u64,
    /// Keyed by (due, id) so equal deadlines fire in scheduling order.
    queue: BTreeMap<(Duration, u64), Box<dyn FnOnce()>>,
    due: HashMap<u64, Duration>,
}

struct DocState {
    nodes: Vec<NodeData>,
    observers: Vec<ObserverData>,
    timers: Timers,
}

impl DocState {
    fn node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.as_raw() as usize)
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.as_raw() as usize)
    }

    fn observer_mut(&mut self, observer: ObserverId) -> Option<&mut ObserverData> {
        self.observers.get_mut(observer.as_raw() as usize)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }

    fn elements_in_order(&self, root: NodeId, out: &mut Vec<NodeId>) {
        let Some(data) = self.node(root) else {
            return;
        };
        for &child in &data.children {
            if self.node(child).is_some_and(|n| n.kind == NodeKind::Element) {
                out.push(child);
            }
            self.elements_in_order(child, out);
        }
    }

    /// Queue `record` on every observer with a registration covering it.
    fn record(&mut self, record: MutationRecord) {
        let attribute = record.attribute_name.clone();
        let wants_old = |opts: &ObserveOptions| match record.kind {
            MutationKind::Attributes => opts.flags.contains(ObserveFlags::ATTRIBUTE_OLD_VALUE),
            MutationKind::CharacterData => {
                opts.flags.contains(ObserveFlags::CHARACTER_DATA_OLD_VALUE)
            }
            MutationKind::ChildList => false,
        };
        let mut deliveries = Vec::new();
        for (index, observer) in self.observers.iter().enumerate() {
            let accepting: Vec<&ObserveOptions> = observer
                .registrations
                .iter()
                .filter(|(node, opts)| {
                    let direct = *node == record.target;
                    (direct || self.is_inclusive_ancestor(*node, record.target))
                        && opts.accepts(record.kind, attribute.as_deref(), direct)
                })
                .map(|(_, opts)| opts)
                .collect();
            if !accepting.is_empty() {
                deliveries.push((index, accepting.into_iter().any(wants_old)));
            }
        }
        for (index, keep_old) in deliveries {
            let mut queued = record.clone();
            if !keep_old {
                queued.old_value = None;
            }
            self.observers[index].queue.push(queued);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        self.record(MutationRecord::child_list(parent, Vec::new(), vec![child]));
    }
}

impl SelectorTree for DocState {
    fn is_element(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.kind == NodeKind::Element)
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.tag.as_str())
    }

    fn id(&self, node: NodeId) -> Option<&str> {
        self.node(node).and_then(|n| n.id.as_deref())
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.node(node)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }
}

/// In-memory document implementing the full host surface.
pub struct FakeDocument {
    state: RefCell<DocState>,
    window: NodeId,
    document: NodeId,
}

impl std::fmt::Debug for FakeDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FakeDocument")
            .field("nodes", &state.nodes.len())
            .field("observers", &state.observers.len())
            .field("pending_timers", &state.timers.queue.len())
            .field("now", &state.timers.now)
            .finish()
    }
}

impl FakeDocument {
    /// An empty document: a window node with a document node beneath it.
    #[must_use]
    pub fn new() -> Rc<Self> {
        let window = NodeId::from_raw(0);
        let document = NodeId::from_raw(1);
        let mut doc_node = NodeData::new(NodeKind::Document, "#document");
        doc_node.parent = Some(window);
        let mut win_node = NodeData::new(NodeKind::Window, "#window");
        win_node.children.push(document);
        Rc::new(Self {
            state: RefCell::new(DocState {
                nodes: vec![win_node, doc_node],
                observers: Vec::new(),
                timers: Timers::default(),
            }),
            window,
            document,
        })
    }

    // -----------------------------------------------------------------------
    // Tree construction
    // -----------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId::from_raw(state.nodes.len() as u64);
        state.nodes.push(NodeData::new(NodeKind::Element, tag));
        id
    }

    /// Create an element from a compound such as `"li#first.item.active"`
    /// and append it to `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `spec` is not a single compound selector; this is fixture
    /// construction, so a typo should fail the test loudly.
    pub fn element(&self, parent: NodeId, spec: &str) -> NodeId {
        let tag_len = spec
            .find(|c| c == '#' || c == '.')
            .unwrap_or(spec.len());
        let tag = if tag_len == 0 { "div" } else { &spec[..tag_len] };
        let node = self.create_element(tag);
        let mut rest = &spec[tag_len..];
        while !rest.is_empty() {
            let sigil = &rest[..1];
            let body = &rest[1..];
            let end = body.find(|c| c == '#' || c == '.').unwrap_or(body.len());
            assert!(end > 0, "bad element spec {spec:?}");
            let name = &body[..end];
            match sigil {
                "#" => self.set_attribute(node, "id", name),
                _ => self.add_class(node, name),
            }
            rest = &body[end..];
        }
        self.append_child(parent, node);
        node
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.borrow_mut();
        state.detach(child);
        if let Some(p) = state.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = state.node_mut(child) {
            c.parent = Some(parent);
        }
        state.record(MutationRecord::child_list(parent, vec![child], Vec::new()));
    }

    /// Detach `node` from its parent.
    pub fn remove(&self, node: NodeId) {
        self.state.borrow_mut().detach(node);
    }

    /// Write an attribute. `id` and `class` also update the node's identity
    /// used by selectors.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.node_mut(node) else {
            return;
        };
        let old = data.attributes.insert(name.to_owned(), value.to_owned());
        match name {
            "id" => data.id = Some(value.to_owned()),
            "class" => data.classes = value.split_whitespace().map(str::to_owned).collect(),
            _ => {}
        }
        state.record(MutationRecord::attribute(node, name, old));
    }

    /// Add a class (no record if already present).
    pub fn add_class(&self, node: NodeId, class: &str) {
        let current = self.attribute(node, "class").unwrap_or_default();
        if current.split_whitespace().any(|c| c == class) {
            return;
        }
        let next = if current.is_empty() {
            class.to_owned()
        } else {
            format!("{current} {class}")
        };
        self.set_attribute(node, "class", &next);
    }

    /// Replace the node's text.
    pub fn set_text(&self, node: NodeId, text: &str) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.node_mut(node) else {
            return;
        };
        let old = std::mem::replace(&mut data.text, text.to_owned());
        state.record(MutationRecord::character_data(node, Some(old)));
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.state
            .borrow()
            .node(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> String {
        self.state
            .borrow()
            .node(node)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.state.borrow().node(node).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Dispatch a plain bubbling, cancelable event of `class` on `node`.
    pub fn fire(&self, node: NodeId, class: &str) -> bool {
        self.dispatch_event(node, &EventInit::new(class))
    }

    /// Number of listeners registered for `class` on `node`.
    #[must_use]
    pub fn listener_count(&self, node: NodeId, class: &str) -> usize {
        self.state
            .borrow()
            .node(node)
            .map_or(0, |n| n.listeners.iter().filter(|r| r.class == class).count())
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().timers.now
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.queue.len()
    }

    /// Move virtual time forward by `dt`, firing every timer that comes due
    /// (including timers scheduled by callbacks during the advance).
    /// Returns the number of timers fired.
    pub fn advance(&self, dt: Duration) -> usize {
        let deadline = self.now() + dt;
        let mut fired = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let timers = &mut state.timers;
                match timers.queue.keys().next().copied() {
                    Some(key) if key.0 <= deadline => {
                        timers.due.remove(&key.1);
                        timers.now = key.0;
                        timers.queue.remove(&key)
                    }
                    _ => None,
                }
            };
            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => break,
            }
        }
        self.state.borrow_mut().timers.now = deadline;
        fired
    }

    // -----------------------------------------------------------------------
    // Mutation observation
    // -----------------------------------------------------------------------

    /// Deliver queued records, one batch per observer. Returns the number of
    /// batches delivered.
    pub fn flush_mutations(&self) -> usize {
        let batches: Vec<(ObserverId, MutationCallback, Vec<MutationRecord>)> = {
            let mut state = self.state.borrow_mut();
            state
                .observers
                .iter_mut()
                .enumerate()
                .filter(|(_, o)| !o.queue.is_empty())
                .map(|(i, o)| {
                    (
                        ObserverId::from_raw(i as u64),
                        Rc::clone(&o.callback),
                        std::mem::take(&mut o.queue),
                    )
                })
                .collect()
        };
        let delivered = batches.len();
        for (id, callback, records) in batches {
            callback(&records, id);
        }
        delivered
    }

    /// Total observer handles ever created.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Nodes currently registered with `observer`, in registration order.
    #[must_use]
    pub fn observed_nodes(&self, observer: ObserverId) -> Vec<NodeId> {
        self.observer_registrations(observer)
            .into_iter()
            .map(|(node, _)| node)
            .collect()
    }

    /// Registrations of `observer` with their options.
    #[must_use]
    pub fn observer_registrations(&self, observer: ObserverId) -> Vec<(NodeId, ObserveOptions)> {
        self.state
            .borrow()
            .observers
            .get(observer.as_raw() as usize)
            .map(|o| o.registrations.clone())
            .unwrap_or_default()
    }
}

impl ElementResolver for FakeDocument {
    fn window(&self) -> NodeId {
        self.window
    }

    fn document(&self) -> NodeId {
        self.document
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, CoreError> {
        let parsed = Selector::parse(selector)?;
        let state = self.state.borrow();
        let mut candidates = Vec::new();
        state.elements_in_order(self.document, &mut candidates);
        Ok(candidates
            .into_iter()
            .filter(|n| parsed.matches(&*state, *n))
            .collect())
    }

    fn validate_selector(&self, selector: &str) -> Result<(), CoreError> {
        Selector::parse(selector).map(|_| ())
    }

    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, CoreError> {
        let parsed = Selector::parse(selector)?;
        let state = self.state.borrow();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if parsed.matches(&*state, current) {
                return Ok(Some(current));
            }
            cursor = state.parent(current);
        }
        Ok(None)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.state.borrow().is_inclusive_ancestor(ancestor, node)
    }
}

impl EventHost for FakeDocument {
    fn add_listener(&self, node: NodeId, class: &str, listener: Listener, options: DeliveryOptions) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.node_mut(node) else {
            return;
        };
        // Registering the same listener twice for a class is a no-op.
        if data
            .listeners
            .iter()
            .any(|r| r.class == class && same_listener(&r.listener, &listener))
        {
            return;
        }
        data.listeners.push(Registered {
            class: class.to_owned(),
            listener,
            options,
        });
    }

    fn remove_listener(&self, node: NodeId, class: &str, listener: &Listener) {
        let mut state = self.state.borrow_mut();
        if let Some(data) = state.node_mut(node) {
            data.listeners
                .retain(|r| !(r.class == class && same_listener(&r.listener, listener)));
        }
    }

    fn dispatch_event(&self, node: NodeId, init: &EventInit) -> bool {
        let path: Vec<NodeId> = {
            let state = self.state.borrow();
            let mut path = vec![node];
            if init.bubbles {
                let mut cursor = state.parent(node);
                while let Some(p) = cursor {
                    path.push(p);
                    cursor = state.parent(p);
                }
            }
            path
        };
        let event = Event::new(init, node);
        for current in path {
            let snapshot: Vec<(Listener, DeliveryOptions)> = {
                let mut state = self.state.borrow_mut();
                let Some(data) = state.node_mut(current) else {
                    continue;
                };
                let snapshot = data
                    .listeners
                    .iter()
                    .filter(|r| r.class == init.class)
                    .map(|r| (Rc::clone(&r.listener), r.options))
                    .collect();
                data.listeners
                    .retain(|r| !(r.class == init.class && r.options.once));
                snapshot
            };
            for (listener, options) in snapshot {
                listener(&event.at(current, options.passive));
            }
            if event.propagation_stopped() {
                break;
            }
        }
        !event.default_prevented()
    }
}

impl TimerHost for FakeDocument {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut state = self.state.borrow_mut();
        let timers = &mut state.timers;
        let id = timers.next_id;
        timers.next_id += 1;
        let due = timers.now + delay;
        timers.queue.insert((due, id), callback);
        timers.due.insert(id, due);
        TimerId::from_raw(id)
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        let timers = &mut state.timers;
        if let Some(due) = timers.due.remove(&id.as_raw()) {
            timers.queue.remove(&(due, id.as_raw()));
        }
    }
}

impl MutationHost for FakeDocument {
    fn create_observer(&self, callback: MutationCallback) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let id = ObserverId::from_raw(state.observers.len() as u64);
        state.observers.push(ObserverData {
            callback,
            registrations: Vec::new(),
            queue: Vec::new(),
        });
        id
    }

    fn observe(&self, observer: ObserverId, node: NodeId, options: &ObserveOptions) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.observer_mut(observer) else {
            return;
        };
        match data.registrations.iter_mut().find(|(n, _)| *n == node) {
            Some((_, existing)) => *existing = options.clone(),
            None => data.registrations.push((node, options.clone())),
        }
    }

    fn disconnect(&self, observer: ObserverId) {
        let mut state = self.state.borrow_mut();
        if let Some(data) = state.observer_mut(observer) {
            data.registrations.clear();
            data.queue.clear();
        }
    }
}
