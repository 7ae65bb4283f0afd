#![forbid(unsafe_code)]

//! Managed event binding.
//!
//! - [`HandlerRegistry`]: subscribe / unsubscribe / dispatch over a host.
//! - [`debounce`]: trailing-edge debounce for high-frequency classes.
//! - [`delegate`]: one listener on an ancestor serving matching descendants.
//! - [`HandlerStore`]: identifier → registration table.
//!
//! # Binding pipeline
//!
//! ```text
//! caller listener ──► delegate (if options.delegate) ──► debounce (if HF)
//!                                                          │
//!                     HandlerStore ◄── record ◄── host.add_listener
//! ```

pub mod debounce;
pub mod delegate;
pub mod registry;
pub mod store;

use std::time::Duration;

use weft_core::{DeliveryOptions, Listener};

pub use registry::{DispatchOptions, HandlerRegistry};
pub use store::{HandlerId, HandlerRecord, HandlerStore};

/// Per-subscription debounce choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceMode {
    /// Debounce high-frequency classes with the configured default window.
    #[default]
    Auto,
    /// Never debounce.
    Disabled,
    /// Debounce high-frequency classes with this window.
    Delay(Duration),
}

/// Options accepted by [`HandlerRegistry::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// Descendant selector for delegated binding.
    pub delegate: Option<String>,
    pub debounce: DebounceMode,
    pub delivery: DeliveryOptions,
}

impl SubscribeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind once on the target and fire for descendants matching `selector`.
    #[must_use]
    pub fn delegate(mut self, selector: impl Into<String>) -> Self {
        self.delegate = Some(selector.into());
        self
    }

    #[must_use]
    pub fn debounce(mut self, mode: DebounceMode) -> Self {
        self.debounce = mode;
        self
    }

    /// Shorthand for `debounce(DebounceMode::Disabled)`.
    #[must_use]
    pub fn no_debounce(self) -> Self {
        self.debounce(DebounceMode::Disabled)
    }

    /// Shorthand for `debounce(DebounceMode::Delay(delay))`.
    #[must_use]
    pub fn debounce_for(self, delay: Duration) -> Self {
        self.debounce(DebounceMode::Delay(delay))
    }

    #[must_use]
    pub fn once(mut self) -> Self {
        self.delivery.once = true;
        self
    }

    #[must_use]
    pub fn passive(mut self) -> Self {
        self.delivery.passive = true;
        self
    }
}

/// What to remove in [`HandlerRegistry::unsubscribe`].
#[derive(Clone)]
pub enum HandlerRef {
    /// Exactly one subscription.
    Id(HandlerId),
    /// Every binding of this listener on the resolved nodes and classes.
    Listener(Listener),
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Listener(_) => f.write_str("Listener(..)"),
        }
    }
}

impl From<HandlerId> for HandlerRef {
    fn from(id: HandlerId) -> Self {
        Self::Id(id)
    }
}

impl From<&HandlerId> for HandlerRef {
    fn from(id: &HandlerId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<Listener> for HandlerRef {
    fn from(listener: Listener) -> Self {
        Self::Listener(listener)
    }
}

impl From<&Listener> for HandlerRef {
    fn from(listener: &Listener) -> Self {
        Self::Listener(std::rc::Rc::clone(listener))
    }
}

/// Split a space-separated class list, dropping empty segments.
pub(crate) fn split_classes(classes: &str) -> smallvec::SmallVec<[&str; 4]> {
    classes.split_whitespace().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_runs_of_whitespace() {
        assert_eq!(split_classes(" click  keydown ").as_slice(), ["click", "keydown"]);
        assert!(split_classes("   ").is_empty());
    }

    #[test]
    fn builder_sets_fields() {
        let opts = SubscribeOptions::new().delegate(".item").no_debounce().once();
        assert_eq!(opts.delegate.as_deref(), Some(".item"));
        assert_eq!(opts.debounce, DebounceMode::Disabled);
        assert!(opts.delivery.once);
        assert!(!opts.delivery.passive);
    }
}
