#![forbid(unsafe_code)]

//! Delegated listeners.
//!
//! A delegating listener sits on a root node and forwards an event to the
//! caller only when the event's origin has an inclusive ancestor matching the
//! selector that is itself inside the root. The caller sees that ancestor as
//! [`Event::subject`]; the current target stays the root.

use std::rc::{Rc, Weak};

use tracing::trace;
use weft_core::{ElementResolver, Event, Listener, NodeId};

/// Wrap `listener` so it fires only for descendants of `root` matching
/// `selector`. The selector must already be validated.
pub fn delegate<R>(resolver: &Rc<R>, root: NodeId, selector: &str, listener: Listener) -> Listener
where
    R: ElementResolver + 'static,
{
    let resolver: Weak<R> = Rc::downgrade(resolver);
    let selector = selector.to_owned();

    Rc::new(move |ev: &Event| {
        let Some(resolver) = resolver.upgrade() else {
            return;
        };
        let matched = match resolver.closest(ev.origin(), &selector) {
            Ok(Some(node)) if resolver.contains(root, node) => node,
            Ok(_) => return,
            Err(err) => {
                trace!(%selector, error = %err, "delegate selector rejected at delivery");
                return;
            }
        };
        drop(resolver);
        listener(&ev.with_subject(matched));
    })
}
