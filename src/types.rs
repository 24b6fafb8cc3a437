//! Core types shared across the part mirror.

use serde::{Deserialize, Serialize};

/// Digest: blake3 hash of a container's bytes
pub type Digest = [u8; 32];

/// Which cached generation of a part a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The file the user edits
    Current,
    /// Last content known to match the container
    Previous,
    /// "Before" side of a diff after an external change
    Compare,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Current, Role::Previous, Role::Compare];

    /// File name prefix for this role within the cache layout.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Current => "",
            Role::Previous => "prev.",
            Role::Compare => "compare.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Current => "current",
            Role::Previous => "previous",
            Role::Compare => "compare",
        }
    }
}

/// Classification of a part relative to its cached generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    ChangedFromOutside,
    ChangedByUser,
    Added,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::ChangedFromOutside => "changed_from_outside",
            ChangeKind::ChangedByUser => "changed_by_user",
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
        }
    }
}
