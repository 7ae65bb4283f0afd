#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Defaults reproduce the classic behavior: a 5 ms trailing debounce for
//! high-frequency event classes and observation pool entries holding 20
//! targets each, re-armed with default options after a disconnect.
//!
//! Every knob can also be set from the environment:
//!
//! | Variable | Meaning | Example |
//! |----------|---------|---------|
//! | `WEFT_DEBOUNCE_MS` | default debounce window | `16` |
//! | `WEFT_POOL_CAPACITY` | targets per pool entry (min 1) | `32` |
//! | `WEFT_POOL_REARM` | `defaults` or `retained` | `retained` |
//!
//! Unparseable values are ignored with a warning.

use std::time::Duration;

use tracing::warn;

/// Default trailing debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5);

/// Default number of targets served by one pool entry.
pub const DEFAULT_POOL_CAPACITY: usize = 20;

/// Event classes debounced unless the subscriber opts out.
pub const HIGH_FREQUENCY_CLASSES: &[&str] = &[
    "scroll",
    "resize",
    "mousemove",
    "touchmove",
    "pointermove",
    "mouseover",
    "mouseout",
    "touchstart",
    "touchend",
    "wheel",
    "input",
    "dragover",
    "animationframe",
];

/// Debounce policy for the handler registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Window used when a subscription does not pick its own delay.
    pub default_delay: Duration,
    /// Classes that get debounced by default.
    pub high_frequency: Vec<String>,
    /// Cancel an open window when its subscription is removed. Off by
    /// default: the trailing call still fires after unsubscribe.
    pub cancel_on_unsubscribe: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            default_delay: DEFAULT_DEBOUNCE,
            high_frequency: HIGH_FREQUENCY_CLASSES
                .iter()
                .map(|c| (*c).to_owned())
                .collect(),
            cancel_on_unsubscribe: false,
        }
    }
}

impl DebounceConfig {
    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Replace the high-frequency class set.
    #[must_use]
    pub fn with_high_frequency<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.high_frequency = classes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_cancel_on_unsubscribe(mut self, cancel: bool) -> Self {
        self.cancel_on_unsubscribe = cancel;
        self
    }

    #[must_use]
    pub fn is_high_frequency(&self, class: &str) -> bool {
        self.high_frequency.iter().any(|c| c == class)
    }
}

/// How an entry re-registers its surviving targets after a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RearmPolicy {
    /// Re-arm every survivor with the default observation options. Custom
    /// options passed to `observe` are lost for the survivors.
    #[default]
    Defaults,
    /// Re-arm every survivor with the options it was observed with.
    Retained,
}

impl RearmPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "defaults" | "default" | "compat" => Some(Self::Defaults),
            "retained" | "retain" => Some(Self::Retained),
            _ => None,
        }
    }
}

/// Observer pool sizing and rebalancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Targets per entry (at least 1).
    pub capacity: usize,
    pub rearm: RearmPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            rearm: RearmPolicy::Defaults,
        }
    }
}

impl PoolConfig {
    /// Set the per-entry capacity, clamped to at least 1.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_rearm(mut self, rearm: RearmPolicy) -> Self {
        self.rearm = rearm;
        self
    }
}

/// Configuration for a whole [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub debounce: DebounceConfig,
    pub pool: PoolConfig,
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_debounce(mut self, debounce: DebounceConfig) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = get_env("WEFT_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.debounce.default_delay = Duration::from_millis(ms),
                Err(_) => warn!(value = %raw, "ignoring unparseable WEFT_DEBOUNCE_MS"),
            }
        }
        if let Some(raw) = get_env("WEFT_POOL_CAPACITY") {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.pool = config.pool.with_capacity(capacity),
                Err(_) => warn!(value = %raw, "ignoring unparseable WEFT_POOL_CAPACITY"),
            }
        }
        if let Some(raw) = get_env("WEFT_POOL_REARM") {
            match RearmPolicy::parse(&raw) {
                Some(rearm) => config.pool.rearm = rearm,
                None => warn!(value = %raw, "ignoring unknown WEFT_POOL_REARM"),
            }
        }
        config
    }
}
