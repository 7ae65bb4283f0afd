//! Handler registry behavior against the in-memory document.
//!
//! Covers fan-out, delegation, debouncing, identifier and listener removal,
//! delivery options, and synthesized dispatch.

use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use weft_core::{ElementResolver, NodeId, listener};
use weft_harness::{CallLog, FakeDocument, ListFixture};
use weft_runtime::{
    DebounceConfig, DispatchOptions, HandlerRegistry, RuntimeError, SubscribeOptions,
};

fn setup(items: usize) -> (Rc<FakeDocument>, ListFixture, HandlerRegistry<FakeDocument>) {
    let doc = FakeDocument::new();
    let fx = ListFixture::build(&doc, items);
    let events = HandlerRegistry::new(Rc::clone(&doc), DebounceConfig::default());
    (doc, fx, events)
}

// ── Fan-out ───────────────────────────────────────────────────────────────

#[test]
fn fans_out_class_major_over_nodes() {
    let (doc, fx, events) = setup(3);
    let log = CallLog::new();
    let ids = events
        .subscribe(".item", "click keydown", log.listener(), SubscribeOptions::new())
        .unwrap();

    // 4 `.item` nodes (3 list items + #outside) × 2 classes.
    assert_eq!(ids.len(), 8);
    assert_eq!(events.bound_count(), 8);
    let first = events.record(&ids[0]).unwrap();
    let fifth = events.record(&ids[4]).unwrap();
    assert_eq!((first.class.as_str(), fifth.class.as_str()), ("click", "keydown"));
    assert_eq!(first.node, fifth.node);

    doc.fire(fx.items[1], "keydown");
    assert_eq!(log.len(), 1);
    assert_eq!(doc.listener_count(fx.outside, "click"), 1);
}

#[test]
fn empty_resolution_binds_nothing() {
    let (_doc, _fx, events) = setup(1);
    let ids = events
        .subscribe(".nope", "click", CallLog::new().listener(), SubscribeOptions::new())
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(events.bound_count(), 0);
}

#[test]
fn invalid_target_selector_is_reported() {
    let (_doc, _fx, events) = setup(1);
    let err = events
        .subscribe("ul > li", "click", CallLog::new().listener(), SubscribeOptions::new())
        .unwrap_err();
    assert_eq!(err.as_label(), "invalid_selector");
    assert!(matches!(err, RuntimeError::Core(_)));
}

#[test]
fn window_and_document_keywords_bind_to_special_nodes() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe("window", "click", log.listener(), SubscribeOptions::new())
        .unwrap();
    doc.fire(fx.label, "click");
    let call = log.last().unwrap();
    assert_eq!(call.current, doc.window());
    assert_eq!(call.origin, fx.label);
}

// ── Delegation ────────────────────────────────────────────────────────────

#[test]
fn delegated_click_on_list_items() {
    let (doc, fx, events) = setup(3);
    let log = CallLog::new();
    let ids = events
        .subscribe(
            "#list",
            "click",
            log.listener(),
            SubscribeOptions::new().delegate(".item"),
        )
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(doc.listener_count(fx.list, "click"), 1);

    doc.fire(fx.items[2], "click");
    doc.fire(fx.label, "click");
    doc.fire(fx.list, "click");
    doc.fire(fx.outside, "click");

    let subjects: Vec<NodeId> = log.calls().iter().map(|c| c.subject).collect();
    assert_eq!(subjects, vec![fx.items[2], fx.items[0]]);
    assert!(log.calls().iter().all(|c| c.current == fx.list));
}

#[test]
fn delegated_items_added_later_are_served() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe(
            fx.list,
            "click",
            log.listener(),
            SubscribeOptions::new().delegate("li.item"),
        )
        .unwrap();
    let late = doc.element(fx.list, "li.item");
    doc.fire(late, "click");
    assert_eq!(log.last().unwrap().subject, late);
}

// ── Debounce ──────────────────────────────────────────────────────────────

#[test]
fn ten_scrolls_inside_the_window_deliver_the_tenth() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe(fx.list, "scroll", log.listener(), SubscribeOptions::new())
        .unwrap();

    for i in 0..10 {
        let detail = json!({ "n": i + 1 });
        events
            .dispatch(fx.list, "scroll", Some(detail), DispatchOptions::default())
            .unwrap();
        doc.advance(Duration::from_millis(1));
    }
    assert!(log.is_empty());

    doc.advance(Duration::from_millis(5));
    assert_eq!(log.len(), 1);
    assert_eq!(log.last().unwrap().detail, Some(json!({ "n": 10 })));
}

#[test]
fn disabled_debounce_delivers_every_firing() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe(fx.list, "scroll", log.listener(), SubscribeOptions::new().no_debounce())
        .unwrap();
    for _ in 0..10 {
        doc.fire(fx.list, "scroll");
    }
    assert_eq!(log.len(), 10);
    assert_eq!(doc.pending_timers(), 0);
}

#[test]
fn custom_delay_applies_to_high_frequency_classes_only() {
    let (doc, fx, events) = setup(1);
    let scrolls = CallLog::new();
    let clicks = CallLog::new();
    let opts = SubscribeOptions::new().debounce_for(Duration::from_millis(50));
    events
        .subscribe(fx.list, "scroll", scrolls.listener(), opts.clone())
        .unwrap();
    events.subscribe(fx.list, "click", clicks.listener(), opts).unwrap();

    doc.fire(fx.list, "scroll");
    doc.fire(fx.list, "click");
    assert_eq!(clicks.len(), 1);

    doc.advance(Duration::from_millis(49));
    assert!(scrolls.is_empty());
    doc.advance(Duration::from_millis(1));
    assert_eq!(scrolls.len(), 1);
}

#[test]
fn delegated_high_frequency_events_are_debounced() {
    let (doc, fx, events) = setup(2);
    let log = CallLog::new();
    events
        .subscribe(
            fx.list,
            "mouseover",
            log.listener(),
            SubscribeOptions::new().delegate(".item"),
        )
        .unwrap();
    doc.fire(fx.items[0], "mouseover");
    doc.fire(fx.items[1], "mouseover");
    doc.advance(Duration::from_millis(5));
    assert_eq!(log.len(), 1);
    assert_eq!(log.last().unwrap().subject, fx.items[1]);
}

// ── Unsubscribe ───────────────────────────────────────────────────────────

#[test]
fn unsubscribe_by_id_removes_only_that_binding() {
    let (doc, fx, events) = setup(1);
    let a = CallLog::new();
    let b = CallLog::new();
    let ids_a = events
        .subscribe(fx.list, "click", a.listener(), SubscribeOptions::new())
        .unwrap();
    events
        .subscribe(fx.list, "click", b.listener(), SubscribeOptions::new())
        .unwrap();

    events.unsubscribe(fx.list, "click", &ids_a[0]).unwrap();
    doc.fire(fx.list, "click");

    assert!(a.is_empty());
    assert_eq!(b.len(), 1);
    assert_eq!(events.bound_count(), 1);
    assert!(events.record(&ids_a[0]).is_none());
}

#[test]
fn unsubscribe_by_listener_detaches_wrappers_too() {
    let (doc, fx, events) = setup(2);
    let log = CallLog::new();
    let l = log.listener();
    events
        .subscribe(".item", "scroll click", Rc::clone(&l), SubscribeOptions::new())
        .unwrap();
    assert_eq!(events.bound_count(), 6);

    events.unsubscribe(".item", "scroll click", &l).unwrap();
    assert_eq!(events.bound_count(), 0);
    for item in &fx.items {
        assert_eq!(doc.listener_count(*item, "scroll"), 0);
        assert_eq!(doc.listener_count(*item, "click"), 0);
    }
}

#[test]
fn trailing_call_still_lands_after_unsubscribe() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    let ids = events
        .subscribe(fx.list, "resize", log.listener(), SubscribeOptions::new())
        .unwrap();
    doc.fire(fx.list, "resize");
    events.unsubscribe(fx.list, "resize", &ids[0]).unwrap();
    assert_eq!(doc.listener_count(fx.list, "resize"), 0);

    doc.advance(Duration::from_millis(10));
    assert_eq!(log.len(), 1);
}

#[test]
fn unsubscribe_with_blank_classes_detaches_nothing() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    let l = log.listener();
    events
        .subscribe(fx.list, "click", Rc::clone(&l), SubscribeOptions::new())
        .unwrap();
    let err = events.unsubscribe(fx.list, " ", &l).unwrap_err();
    assert_eq!(err, RuntimeError::InvalidEventClass(" ".to_owned()));
    doc.fire(fx.list, "click");
    assert_eq!(log.len(), 1);
}

#[test]
fn unsubscribe_with_empty_target_is_a_no_op() {
    let (_doc, fx, events) = setup(1);
    let ids = events
        .subscribe(fx.list, "click", CallLog::new().listener(), SubscribeOptions::new())
        .unwrap();
    events.unsubscribe(".missing", "click", &ids[0]).unwrap();
    assert_eq!(events.bound_count(), 1);
}

#[test]
fn listener_may_unsubscribe_itself_while_running() {
    let doc = FakeDocument::new();
    let fx = ListFixture::build(&doc, 1);
    let events = Rc::new(HandlerRegistry::new(Rc::clone(&doc), DebounceConfig::default()));
    let hits = Rc::new(std::cell::Cell::new(0u32));

    let slot: Rc<std::cell::RefCell<Option<weft_runtime::HandlerId>>> = Rc::default();
    let registry = Rc::downgrade(&events);
    let own_id = Rc::clone(&slot);
    let counter = Rc::clone(&hits);
    let list = fx.list;
    let ids = events
        .subscribe(
            list,
            "click",
            listener(move |_| {
                counter.set(counter.get() + 1);
                let id = own_id.borrow_mut().take();
                if let (Some(registry), Some(id)) = (registry.upgrade(), id) {
                    registry.unsubscribe(list, "click", id).unwrap();
                }
            }),
            SubscribeOptions::new(),
        )
        .unwrap();
    *slot.borrow_mut() = Some(ids[0].clone());

    doc.fire(list, "click");
    doc.fire(list, "click");
    assert_eq!(hits.get(), 1);
    assert_eq!(events.bound_count(), 0);
}

// ── Delivery options and dispatch ─────────────────────────────────────────

#[test]
fn once_delivery_fires_a_single_time() {
    let (doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe(fx.list, "click", log.listener(), SubscribeOptions::new().once())
        .unwrap();
    assert_eq!(events.handlers_on(fx.list, "click").len(), 1);
    doc.fire(fx.list, "click");
    doc.fire(fx.list, "click");
    assert_eq!(log.len(), 1);
    assert_eq!(events.bound_count(), 0);
    assert!(events.handlers_on(fx.list, "click").is_empty());
}

#[test]
fn passive_listener_cannot_cancel() {
    let (_doc, fx, events) = setup(1);
    events
        .subscribe(
            fx.list,
            "click",
            listener(|ev| ev.prevent_default()),
            SubscribeOptions::new().passive(),
        )
        .unwrap();
    let results = events
        .dispatch(fx.list, "click", None, DispatchOptions::default())
        .unwrap();
    assert_eq!(results, vec![true]);
}

#[test]
fn dispatch_reports_cancellation_per_node() {
    let (_doc, fx, events) = setup(2);
    events
        .subscribe(
            fx.items[1],
            "submit",
            listener(|ev| ev.prevent_default()),
            SubscribeOptions::new(),
        )
        .unwrap();
    let results = events
        .dispatch("li.item", "submit", None, DispatchOptions::default())
        .unwrap();
    assert_eq!(results, vec![true, false]);

    let results = events
        .dispatch(
            fx.items[1],
            "submit",
            None,
            DispatchOptions::default().with_cancelable(false),
        )
        .unwrap();
    assert_eq!(results, vec![true]);
}

#[test]
fn dispatch_without_bubbling_stays_on_target() {
    let (_doc, fx, events) = setup(1);
    let log = CallLog::new();
    events
        .subscribe(fx.list, "saved", log.listener(), SubscribeOptions::new())
        .unwrap();
    events
        .dispatch(
            fx.items[0],
            "saved",
            Some(json!({"ok": true})),
            DispatchOptions::default().with_bubbles(false),
        )
        .unwrap();
    assert!(log.is_empty());
    events
        .dispatch(fx.items[0], "saved", Some(json!({"ok": true})), DispatchOptions::default())
        .unwrap();
    assert_eq!(log.last().unwrap().detail, Some(json!({"ok": true})));
}
