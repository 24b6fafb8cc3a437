//! Builds and extends a `PartTree` from flat container entry paths.

use super::node::{NodeId, PartNode};
use super::PartTree;
use tracing::debug;

/// Tree builder over container entry paths
pub struct TreeBuilder<'a> {
    tree: &'a mut PartTree,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(tree: &'a mut PartTree) -> Self {
        Self { tree }
    }

    /// Insert every non-directory entry path, reusing existing nodes by name.
    ///
    /// Returns the leaf node ids in input order.
    pub fn insert_all<I, S>(&mut self, entry_paths: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entry_paths
            .into_iter()
            .filter_map(|p| self.insert(p.as_ref()))
            .collect()
    }

    /// Insert one entry path. Directory entries (trailing `/`) and empty paths yield `None`.
    pub fn insert(&mut self, entry_path: &str) -> Option<NodeId> {
        if is_directory_entry(entry_path) {
            return None;
        }
        let segments = split_segments(entry_path);
        if segments.is_empty() {
            return None;
        }

        let mut current = self.tree.root();
        let mut prefix = String::new();
        for (depth, segment) in segments.iter().enumerate() {
            if depth > 0 {
                prefix.push('/');
            }
            prefix.push_str(segment);
            let is_last = depth + 1 == segments.len();
            // The leaf keeps the entry's own spelling; folders get the joined prefix.
            let full_path = if is_last { entry_path } else { prefix.as_str() };

            current = match self.tree.child_named(current, segment) {
                Some(existing) => {
                    let node = self.tree.node_mut(existing);
                    if node.full_path != full_path {
                        debug!(from = %node.full_path, to = %full_path, "Updating reused node path");
                        node.full_path = full_path.to_string();
                    }
                    existing
                }
                None => self.tree.push_child(
                    current,
                    PartNode::new(segment.to_string(), full_path.to_string(), Some(current)),
                ),
            };
        }
        self.tree.node_mut(current).is_part = true;
        Some(current)
    }
}

/// Entry names that only establish folders.
pub fn is_directory_entry(entry_path: &str) -> bool {
    entry_path.ends_with('/') || entry_path.ends_with('\\')
}

/// Split an entry path on its separators, dropping empty segments.
pub fn split_segments(entry_path: &str) -> Vec<&str> {
    entry_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect()
}
