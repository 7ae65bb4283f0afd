#![forbid(unsafe_code)]

//! The runtime context: one handler registry, one store, and one observer
//! pool sharing a host.
//!
//! Construct one per application instance. Several runtimes may share a
//! process, or even a host, without seeing each other's registrations.
//!
//! ```ignore
//! let runtime = Runtime::<_>::new(host);
//! runtime.events().subscribe("#list", "click", on_click, SubscribeOptions::new().delegate(".item"))?;
//! runtime.state().set("selected", json!(3));
//! runtime.mutations().observe("#list", on_change, None)?;
//! ```

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;
use weft_core::Host;

use crate::config::RuntimeConfig;
use crate::handlers::HandlerRegistry;
use crate::observer_pool::ObserverPool;
use crate::reactive::Store;

/// Weft runtime over host `H`, storing values of type `V`.
pub struct Runtime<H: Host + 'static, V = Value> {
    host: Rc<H>,
    config: RuntimeConfig,
    events: HandlerRegistry<H>,
    state: Store<V>,
    mutations: ObserverPool<H>,
}

impl<H: Host + 'static, V: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug
    for Runtime<H, V>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("events", &self.events)
            .field("state", &self.state)
            .field("mutations", &self.mutations)
            .finish_non_exhaustive()
    }
}

impl<H: Host + 'static, V: Clone + PartialEq + 'static> Runtime<H, V> {
    /// Runtime with default configuration.
    #[must_use]
    pub fn new(host: Rc<H>) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    /// Runtime configured from `WEFT_*` environment variables.
    #[must_use]
    pub fn from_env(host: Rc<H>) -> Self {
        Self::with_config(host, RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(host: Rc<H>, config: RuntimeConfig) -> Self {
        debug!(
            debounce_ms = config.debounce.default_delay.as_millis() as u64,
            pool_capacity = config.pool.capacity,
            rearm = ?config.pool.rearm,
            "runtime created"
        );
        Self {
            events: HandlerRegistry::new(Rc::clone(&host), config.debounce.clone()),
            state: Store::new(),
            mutations: ObserverPool::new(Rc::clone(&host), config.pool),
            host,
            config,
        }
    }

    /// Event subscription, unsubscription, and dispatch.
    #[must_use]
    pub fn events(&self) -> &HandlerRegistry<H> {
        &self.events
    }

    /// Keyed reactive state.
    #[must_use]
    pub fn state(&self) -> &Store<V> {
        &self.state
    }

    /// Pooled structural-change observation.
    #[must_use]
    pub fn mutations(&self) -> &ObserverPool<H> {
        &self.mutations
    }

    #[must_use]
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
