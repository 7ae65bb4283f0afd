#![forbid(unsafe_code)]

//! Minimal selector engine for the fake document.
//!
//! Supported grammar:
//!
//! ```text
//! list      := complex ("," complex)*
//! complex   := compound (WS compound)*        // descendant combinator only
//! compound  := (tag | "*")? ("#" ident | "." ident)*
//! ident     := [A-Za-z0-9_-]+
//! ```
//!
//! Anything else (attribute selectors, pseudo-classes, child/sibling
//! combinators) is rejected as an invalid selector. Matching runs right to
//! left; with only descendant combinators a greedy ancestor walk is exact.

use weft_core::{CoreError, NodeId};

/// Read access to the tree a selector is matched against.
pub trait SelectorTree {
    fn is_element(&self, node: NodeId) -> bool;
    fn tag(&self, node: NodeId) -> Option<&str>;
    fn id(&self, node: NodeId) -> Option<&str>;
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Compound {
    fn parse(input: &str, whole: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidSelector(whole.to_owned());
        let mut out = Self::default();
        let mut rest = input;

        if let Some(stripped) = rest.strip_prefix('*') {
            rest = stripped;
        } else {
            let tag_len = ident_len(rest);
            if tag_len > 0 {
                out.tag = Some(rest[..tag_len].to_ascii_lowercase());
                rest = &rest[tag_len..];
            }
        }

        while let Some(sigil) = rest.chars().next() {
            let body = &rest[sigil.len_utf8()..];
            let len = ident_len(body);
            if len == 0 {
                return Err(invalid());
            }
            let name = body[..len].to_owned();
            match sigil {
                '#' if out.id.is_none() => out.id = Some(name),
                '.' => out.classes.push(name),
                _ => return Err(invalid()),
            }
            rest = &body[len..];
        }

        Ok(out)
    }

    fn matches<T: SelectorTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        if !tree.is_element(node) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if tree.tag(node) != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.id(node) != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| tree.has_class(node, c))
    }
}

fn ident_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        .count()
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidSelector(input.to_owned()));
        }
        let alternatives = trimmed
            .split(',')
            .map(|complex| {
                let parts: Vec<&str> = complex.split_whitespace().collect();
                if parts.is_empty() {
                    return Err(CoreError::InvalidSelector(input.to_owned()));
                }
                parts
                    .into_iter()
                    .map(|part| Compound::parse(part, input))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    /// Whether `node` matches any alternative.
    pub fn matches<T: SelectorTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|chain| Self::matches_chain(chain, tree, node))
    }

    fn matches_chain<T: SelectorTree + ?Sized>(chain: &[Compound], tree: &T, node: NodeId) -> bool {
        let Some((last, ancestors)) = chain.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }
        let mut cursor = tree.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    None => return false,
                    Some(candidate) => {
                        cursor = tree.parent(candidate);
                        if compound.matches(tree, candidate) {
                            break;
                        }
                    }
                }
            }
        }
        true
    }
}
