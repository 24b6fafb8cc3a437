//! Part node types

use serde::{Deserialize, Serialize};

/// Index of a node inside the `PartTree` arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Marker shown next to a node in the tree view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    #[default]
    None,
    Folder,
    File,
    ChangedFromOutside,
    NewlyAdded,
    DeletedPendingAck,
}

impl StatusIcon {
    /// Whether the icon flags something the user should look at.
    pub fn is_marker(self) -> bool {
        matches!(
            self,
            StatusIcon::ChangedFromOutside | StatusIcon::NewlyAdded | StatusIcon::DeletedPendingAck
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusIcon::None => "none",
            StatusIcon::Folder => "folder",
            StatusIcon::File => "file",
            StatusIcon::ChangedFromOutside => "changed",
            StatusIcon::NewlyAdded => "added",
            StatusIcon::DeletedPendingAck => "deleted",
        }
    }
}

/// One folder or leaf part of a container
#[derive(Debug, Clone)]
pub struct PartNode {
    pub name: String,
    pub full_path: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>, // insertion order
    pub status: StatusIcon,
    /// Set when some entry path ends at this node
    pub(crate) is_part: bool,
}

impl PartNode {
    pub(crate) fn new(name: String, full_path: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            full_path,
            parent,
            children: Vec::new(),
            status: StatusIcon::None,
            is_part: false,
        }
    }

    /// Leaves are parts with no children; a part that also has children is shown as a folder.
    pub fn is_leaf(&self) -> bool {
        self.is_part && self.children.is_empty()
    }
}
