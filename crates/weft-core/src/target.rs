#![forbid(unsafe_code)]

//! Boundary normalization of "what to act on".
//!
//! Public runtime calls accept anything convertible into a [`Target`]. The
//! host resolves it once (see [`ElementResolver::resolve`]) and everything
//! past the boundary works on a plain `Vec<NodeId>`.
//!
//! [`ElementResolver::resolve`]: crate::host::ElementResolver::resolve

use crate::node::NodeId;

/// Selector keyword that resolves to the host's window node.
pub const WINDOW_SELECTOR: &str = "window";

/// Selector keyword that resolves to the host's document node.
pub const DOCUMENT_SELECTOR: &str = "document";

/// One node, an explicit sequence of nodes, or a selector to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Single(NodeId),
    Many(Vec<NodeId>),
    BySelector(String),
}

impl Target {
    /// Build a selector target.
    #[must_use]
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::BySelector(selector.into())
    }
}

impl From<NodeId> for Target {
    fn from(node: NodeId) -> Self {
        Self::Single(node)
    }
}

impl From<Vec<NodeId>> for Target {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self::Many(nodes)
    }
}

impl From<&[NodeId]> for Target {
    fn from(nodes: &[NodeId]) -> Self {
        Self::Many(nodes.to_vec())
    }
}

impl<const N: usize> From<[NodeId; N]> for Target {
    fn from(nodes: [NodeId; N]) -> Self {
        Self::Many(nodes.to_vec())
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Self::BySelector(selector.to_owned())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Self::BySelector(selector)
    }
}

impl From<&Target> for Target {
    fn from(target: &Target) -> Self {
        target.clone()
    }
}
