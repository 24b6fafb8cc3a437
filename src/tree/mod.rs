//! Part Tree
//!
//! Hierarchical model of a container's entries. Nodes live in an arena and
//! refer to their parent by `NodeId`, so there are no ownership cycles. Removed
//! nodes leave a vacant slot behind; ids are never reused within one tree.

pub mod builder;
pub mod node;

pub use builder::TreeBuilder;
pub use node::{NodeId, PartNode, StatusIcon};

use std::collections::HashSet;

/// Arena-backed tree of container parts
#[derive(Debug, Clone)]
pub struct PartTree {
    nodes: Vec<Option<PartNode>>,
    root: NodeId,
}

impl Default for PartTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PartTree {
    /// Empty tree holding only the root folder.
    pub fn new() -> Self {
        let mut root = PartNode::new(String::new(), String::new(), None);
        root.status = StatusIcon::Folder;
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
        }
    }

    /// Build a fresh tree from container entry paths.
    pub fn build<I, S>(entry_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        tree.extend(entry_paths);
        tree
    }

    /// Add entry paths to an existing tree, reusing nodes by name.
    pub fn extend<I, S>(&mut self, entry_paths: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TreeBuilder::new(self).insert_all(entry_paths)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&PartNode> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Panics on a removed id; ids handed out by this tree stay valid until `remove`.
    pub fn node(&self, id: NodeId) -> &PartNode {
        self.get(id).expect("node id refers to a removed node")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PartNode {
        self.nodes[id.0]
            .as_mut()
            .expect("node id refers to a removed node")
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.node(self.root).children.is_empty()
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).name == name)
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, node: PartNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        self.node_mut(parent).children.push(id);
        id
    }

    /// Look a node up by its container path.
    pub fn find(&self, full_path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for segment in builder::split_segments(full_path) {
            current = self.child_named(current, segment)?;
        }
        (current != self.root).then_some(current)
    }

    /// Leaf parts in depth-first order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| self.node(*id).is_leaf())
            .collect()
    }

    /// All live nodes except the root, depth-first pre-order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(self.root).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Leaves whose path is not in `present`.
    pub fn leaves_absent_from(&self, present: &HashSet<&str>) -> Vec<NodeId> {
        self.leaves()
            .into_iter()
            .filter(|id| !present.contains(self.node(*id).full_path.as_str()))
            .collect()
    }

    /// Detach a node from its parent and free it along with its subtree.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent) {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
    }

    /// Remove folders left without children. Returns how many were removed.
    pub fn prune_empty_folders(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let empty: Vec<NodeId> = self
                .walk()
                .into_iter()
                .filter(|id| {
                    let node = self.node(*id);
                    !node.is_part && node.children.is_empty()
                })
                .collect();
            if empty.is_empty() {
                return removed;
            }
            removed += empty.len();
            for id in empty {
                self.remove(id);
            }
        }
    }

    pub fn set_status(&mut self, id: NodeId, status: StatusIcon) {
        self.node_mut(id).status = status;
    }

    /// Reset folder icons, then flag every folder above a marked leaf as changed.
    pub fn propagate_status(&mut self) {
        let ids = self.walk();
        for id in &ids {
            if !self.node(*id).is_leaf() {
                self.node_mut(*id).status = StatusIcon::Folder;
            }
        }
        for id in ids {
            if !(self.node(id).is_leaf() && self.node(id).status.is_marker()) {
                continue;
            }
            let mut parent = self.node(id).parent;
            while let Some(p) = parent {
                if p == self.root {
                    break;
                }
                self.node_mut(p).status = StatusIcon::ChangedFromOutside;
                parent = self.node(p).parent;
            }
        }
    }

    /// Ancestor chain from the node up to (not including) the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut parent = self.get(id).and_then(|n| n.parent);
        while let Some(p) = parent {
            if p == self.root {
                break;
            }
            out.push(p);
            parent = self.node(p).parent;
        }
        out
    }

    /// Depth below the root (top-level nodes are depth 1).
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len() + 1
    }
}
