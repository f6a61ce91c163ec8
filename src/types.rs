//! Core type definitions: identifiers, timestamps, and deadlines.
//!
//! Row identities (users, mind-maps, nodes) are numeric ids assigned by the
//! store and stable for the lifetime of the row. Session ids are UUID v7 so
//! they sort by creation time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// User row identifier, assigned by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Returns the raw numeric id.
    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mind-map row identifier, assigned by the store.
///
/// Also names the per-mind-map node tables (`nodes_<id>`,
/// `node_content_<id>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MindmapId(pub i64);

impl MindmapId {
    /// Returns the raw numeric id.
    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MindmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node identifier, unique within its mind-map.
///
/// The root node is always id 0. Non-root ids are auto-assigned and stable
/// for the node's lifetime; positional indices are a display-level view and
/// change on mutation, so everything durable (storage rows, operation
/// records) references `NodeId`, never an index string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl NodeId {
    /// The root node id of every mind-map.
    pub const ROOT: NodeId = NodeId(0);

    /// Parent sentinel carried by the root node (stored as SQL NULL).
    pub const NONE: NodeId = NodeId(-1);

    /// Returns the raw numeric id.
    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Returns true if this is the root node id.
    #[inline]
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session identifier (UUID v7 for time-ordering).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new SessionId with a UUID v7 (time-ordered).
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a nil (all zeros) SessionId.
    /// Useful for testing or sentinel values.
    #[inline]
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for SessionId {
    /// Returns a nil (all zeros) SessionId.
    ///
    /// For a new unique ID, use [`SessionId::new()`].
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds.
///
/// Using i64 allows representing dates far into the future and past.
/// Millisecond precision is sufficient for editor operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch (should never happen
    /// in practice), returns a timestamp of 0 (epoch) rather than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the elapsed milliseconds from `earlier` to `self`,
    /// saturating at 0 if the clock went backwards.
    #[inline]
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0).max(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional command deadline.
///
/// Cancellation is honoured at suspension points only: dispatch checks the
/// deadline before starting an operation, and mutating operations check it
/// again before each store transaction. In-memory tree edits are never
/// interrupted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline(Option<Timestamp>);

impl Deadline {
    /// No deadline; operations run to completion.
    #[inline]
    pub const fn none() -> Self {
        Self(None)
    }

    /// A deadline at the given absolute timestamp.
    #[inline]
    pub const fn at(when: Timestamp) -> Self {
        Self(Some(when))
    }

    /// A deadline the given number of milliseconds from now.
    #[inline]
    pub fn in_millis(millis: i64) -> Self {
        Self(Some(Timestamp::from_millis(
            Timestamp::now().as_millis() + millis,
        )))
    }

    /// Returns true if the deadline has elapsed.
    #[inline]
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(when) => Timestamp::now() > when,
            None => false,
        }
    }

    /// Fails with `Cancelled` if the deadline has elapsed.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.expired() {
            Err(Error::cancelled("deadline elapsed"))
        } else {
            Ok(())
        }
    }
}
