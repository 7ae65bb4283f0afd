#![forbid(unsafe_code)]

//! Errors surfaced by the runtime's public calls.
//!
//! Arguments are validated at the outermost public call; internal helpers
//! assume valid input. Nothing is retried and a fan-out that fails part way
//! keeps whatever it already bound.

use std::fmt;

use weft_core::CoreError;

/// Errors produced by the handler registry and observer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Target resolution or a tree query failed at the host boundary.
    Core(CoreError),
    /// The event class argument was empty or blank.
    InvalidEventClass(String),
    /// An observation was requested for a target that resolved to nothing.
    NoTarget,
}

impl RuntimeError {
    /// Short stable label for logs.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Core(CoreError::InvalidSelector(_)) => "invalid_selector",
            Self::Core(CoreError::UnknownNode(_)) => "unknown_node",
            Self::InvalidEventClass(_) => "invalid_event_class",
            Self::NoTarget => "no_target",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(err) => write!(f, "{err}"),
            Self::InvalidEventClass(class) => write!(f, "invalid event class: {class:?}"),
            Self::NoTarget => write!(f, "no target provided for mutation observer"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoreError> for RuntimeError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}
