//! Positional index strings.
//!
//! A positional index is a dotted, 1-based path describing where a node
//! currently sits in its mind-map's child orderings: `"2.1"` is the first
//! child of the root's second child. The root is always `"0"`.
//!
//! Indices are a **view**, not an identity: they change whenever siblings
//! are added, removed, moved, or sorted. Durable references (storage rows,
//! operation records) use [`NodeId`](crate::types::NodeId) instead.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A node's positional index: the 1-based path from the root.
///
/// Internally the root is the empty path; it formats as `"0"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeIndex {
    segments: Vec<u32>,
}

impl NodeIndex {
    /// The root index, `"0"`.
    #[inline]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if this is the root index.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The 1-based path segments. Empty for the root.
    #[inline]
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Tree depth: 0 for the root, 1 for its children, and so on.
    #[inline]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The index of this node's child at 1-based position `pos`.
    pub fn child(&self, pos: u32) -> Self {
        debug_assert!(pos >= 1, "sibling positions are 1-based");
        let mut segments = self.segments.clone();
        segments.push(pos);
        Self { segments }
    }

    /// The parent's index, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Parses an index string.
    ///
    /// `"0"` is the root; otherwise every dot-separated segment must be a
    /// positive integer. Anything else fails with `InvalidArgument`.
    pub fn parse(s: &str) -> Result<Self> {
        if s == "0" {
            return Ok(Self::root());
        }
        if s.is_empty() {
            return Err(Error::invalid("empty index"));
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            let value: u32 = part
                .parse()
                .map_err(|_| Error::invalid(format!("bad index segment '{}' in '{}'", part, s)))?;
            if value == 0 {
                return Err(Error::invalid(format!(
                    "index segment must be >= 1 in '{}'",
                    s
                )));
            }
            segments.push(value);
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "0");
        }
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", seg)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for NodeIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_round_trip() {
        let root = NodeIndex::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "0");
        assert_eq!(NodeIndex::parse("0").unwrap(), root);
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn test_parse_deep_index() {
        let idx = NodeIndex::parse("2.1.3").unwrap();
        assert_eq!(idx.segments(), &[2, 1, 3]);
        assert_eq!(idx.to_string(), "2.1.3");
        assert_eq!(idx.depth(), 3);
    }

    #[test]
    fn test_child_of_root() {
        let idx = NodeIndex::root().child(4);
        assert_eq!(idx.to_string(), "4");
    }

    #[test]
    fn test_child_of_nested() {
        let idx = NodeIndex::parse("1.2").unwrap().child(1);
        assert_eq!(idx.to_string(), "1.2.1");
    }

    #[test]
    fn test_parent() {
        let idx = NodeIndex::parse("1.2.3").unwrap();
        assert_eq!(idx.parent().unwrap().to_string(), "1.2");
        assert_eq!(NodeIndex::parse("5").unwrap().parent().unwrap(), NodeIndex::root());
        assert!(NodeIndex::root().parent().is_none());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(NodeIndex::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_zero_segment() {
        assert!(NodeIndex::parse("1.0").is_err());
        assert!(NodeIndex::parse("0.1").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(NodeIndex::parse("a.b").is_err());
        assert!(NodeIndex::parse("1..2").is_err());
        assert!(NodeIndex::parse("1.-2").is_err());
        assert!(NodeIndex::parse("1.2.").is_err());
    }

    #[test]
    fn test_parse_error_kind() {
        let err = NodeIndex::parse("x").unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
