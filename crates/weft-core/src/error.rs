#![forbid(unsafe_code)]

//! Errors raised at the host boundary.

use std::fmt;

use crate::node::NodeId;

/// Errors produced while resolving targets or querying the host tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The selector string is empty or uses syntax the host does not accept.
    InvalidSelector(String),
    /// The handle does not name a node known to the host.
    UnknownNode(NodeId),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSelector(sel) => write!(f, "invalid selector: {sel:?}"),
            Self::UnknownNode(node) => write!(f, "unknown node: {node}"),
        }
    }
}

impl std::error::Error for CoreError {}
