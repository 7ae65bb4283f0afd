#![forbid(unsafe_code)]

//! Structural-change observation types.
//!
//! A host observer delivers batches of [`MutationRecord`]s to a single
//! [`MutationCallback`]. Which changes are reported for a node is governed by
//! the [`ObserveOptions`] it was registered with.

use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

bitflags! {
    /// Change categories an observation registration covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveFlags: u8 {
        /// Attribute writes on the node.
        const ATTRIBUTES = 1 << 0;
        /// Children added to or removed from the node.
        const CHILD_LIST = 1 << 1;
        /// Extend the other categories to every descendant.
        const SUBTREE = 1 << 2;
        /// Text content changes.
        const CHARACTER_DATA = 1 << 3;
        /// Report the previous attribute value.
        const ATTRIBUTE_OLD_VALUE = 1 << 4;
        /// Report the previous text value.
        const CHARACTER_DATA_OLD_VALUE = 1 << 5;
    }
}

/// Options for one observation registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    pub flags: ObserveFlags,
    /// Restrict attribute records to these names.
    pub attribute_filter: Option<Vec<String>>,
}

impl Default for ObserveOptions {
    /// Attributes and child list, recursively.
    fn default() -> Self {
        Self::new(ObserveFlags::ATTRIBUTES | ObserveFlags::CHILD_LIST | ObserveFlags::SUBTREE)
    }
}

impl ObserveOptions {
    #[must_use]
    pub fn new(flags: ObserveFlags) -> Self {
        Self {
            flags,
            attribute_filter: None,
        }
    }

    #[must_use]
    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a change of `kind` on a node covered by this registration
    /// should be reported. `direct` is false when the changed node is a
    /// strict descendant of the registered node.
    #[must_use]
    pub fn accepts(&self, kind: MutationKind, attribute: Option<&str>, direct: bool) -> bool {
        if !direct && !self.flags.contains(ObserveFlags::SUBTREE) {
            return false;
        }
        match kind {
            MutationKind::Attributes => {
                self.flags.contains(ObserveFlags::ATTRIBUTES)
                    && match (&self.attribute_filter, attribute) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
            MutationKind::ChildList => self.flags.contains(ObserveFlags::CHILD_LIST),
            MutationKind::CharacterData => self.flags.contains(ObserveFlags::CHARACTER_DATA),
        }
    }
}

/// Category of a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Attributes,
    ChildList,
    CharacterData,
}

/// One structural change.
///
/// Serializes with camelCase keys so records can be logged or forwarded as
/// JSON in the shape document tooling expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// The node that changed.
    pub target: NodeId,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    #[must_use]
    pub fn attribute(target: NodeId, name: impl Into<String>, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            attribute_name: Some(name.into()),
            old_value,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    #[must_use]
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            attribute_name: None,
            old_value: None,
            added,
            removed,
        }
    }

    #[must_use]
    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            attribute_name: None,
            old_value,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Handle to one host observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Receives every batch an observer delivers.
pub type MutationCallback = Rc<dyn Fn(&[MutationRecord], ObserverId)>;
