//! Mind-map data types and the permission predicate.

use serde::{Deserialize, Serialize};

use crate::types::{MindmapId, Timestamp};

/// A mind-map row.
///
/// The node tree itself lives in the per-mind-map tables and, when loaded,
/// in a [`MindmapState`](crate::mindmap::MindmapState).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mindmap {
    /// Store-assigned id; also names the per-mind-map node tables.
    pub id: MindmapId,
    /// Name, unique per owner. Mirrored by the root node's name.
    pub name: String,
    /// Owner's username.
    pub owner: String,
    /// Whether non-owners may read this mind-map.
    pub is_public: bool,
    /// Creation time.
    pub created: Timestamp,
    /// Last modification time.
    pub updated: Timestamp,
}

/// Input for creating a mind-map.
#[derive(Clone, Debug, Default)]
pub struct NewMindmap {
    /// Name (unique per owner, non-empty).
    pub name: String,
    /// Whether non-owners may read the new mind-map.
    pub is_public: bool,
}

/// Store-level patch to a mind-map row. `None` fields are left unchanged.
///
/// Only renaming and toggling visibility are supported; ownership never
/// changes after creation.
#[derive(Clone, Debug, Default)]
pub struct MindmapPatch {
    /// New name.
    pub name: Option<String>,
    /// New visibility.
    pub is_public: Option<bool>,
}

impl MindmapPatch {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_public.is_none()
    }
}

/// Attribute filter for mind-map queries. Set fields must all match.
///
/// The store returns whatever matches; visibility is the caller's concern.
#[derive(Clone, Debug, Default)]
pub struct MindmapFilter {
    /// Match by id.
    pub id: Option<MindmapId>,
    /// Match by exact name.
    pub name: Option<String>,
    /// Match by owner username.
    pub owner: Option<String>,
    /// Match by visibility flag.
    pub is_public: Option<bool>,
}

impl MindmapFilter {
    /// Filter matching a single id.
    pub fn by_id(id: MindmapId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Filter matching one owner's mind-map by name.
    pub fn by_name_owner(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner: Some(owner.into()),
            ..Default::default()
        }
    }
}

/// Access level a user holds on a mind-map.
///
/// Derived from ownership and the public flag, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    /// No access: not the owner and not public.
    None = 0,
    /// Read-only: public and not the owner.
    Read = 1,
    /// Full access: the owner.
    Full = 2,
}

impl PermissionLevel {
    /// Computes the level `username` holds on `mindmap`.
    pub fn of(mindmap: &Mindmap, username: &str) -> Self {
        if mindmap.owner == username {
            Self::Full
        } else if mindmap.is_public {
            Self::Read
        } else {
            Self::None
        }
    }

    /// Returns true if reading is allowed.
    #[inline]
    pub fn allows_read(&self) -> bool {
        *self >= Self::Read
    }

    /// Returns true if mutation is allowed.
    #[inline]
    pub fn allows_write(&self) -> bool {
        *self == Self::Full
    }
}
