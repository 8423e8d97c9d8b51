//! Shared prefix index backing the PIT, FIB and CS lookups.
//!
//! The tree is an arena of nodes indexed by [`NodeId`]; each table keeps its
//! own storage keyed by node id and never holds references into the arena.
//! Nodes are not pruned: a node id stays valid for the lifetime of the tree,
//! which is what lets the Dead Nonce List and the timers refer to names by
//! index after the owning table entry is gone.

use rust_fvdn_common::ndn::{Name, NameComponent};
use std::collections::HashMap;

/// Index of a node in the name tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

struct TreeNode {
    parent: Option<NodeId>,
    component: Option<NameComponent>,
    children: HashMap<NameComponent, NodeId>,
}

pub struct NameTree {
    nodes: Vec<TreeNode>,
}

impl NameTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                parent: None,
                component: None,
                children: HashMap::new(),
            }],
        }
    }

    /// The node of the empty name.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Finds the node for `name`, creating the path as needed.
    pub fn lookup_or_insert(&mut self, name: &Name) -> NodeId {
        let mut current = self.root();
        for component in name.components() {
            current = match self.nodes[current.0].children.get(component) {
                Some(&child) => child,
                None => {
                    let child = NodeId(self.nodes.len());
                    self.nodes.push(TreeNode {
                        parent: Some(current),
                        component: Some(component.clone()),
                        children: HashMap::new(),
                    });
                    self.nodes[current.0]
                        .children
                        .insert(component.clone(), child);
                    child
                }
            };
        }
        current
    }

    /// Finds the node for `name` without modifying the tree.
    pub fn lookup(&self, name: &Name) -> Option<NodeId> {
        let mut current = self.root();
        for component in name.components() {
            current = *self.nodes[current.0].children.get(component)?;
        }
        Some(current)
    }

    /// Nodes along the existing path from the root towards `name`, in
    /// shortest-prefix-first order. Stops at the deepest existing node.
    pub fn prefixes(&self, name: &Name) -> Vec<NodeId> {
        let mut result = vec![self.root()];
        let mut current = self.root();
        for component in name.components() {
            match self.nodes[current.0].children.get(component) {
                Some(&child) => {
                    result.push(child);
                    current = child;
                }
                None => break,
            }
        }
        result
    }

    /// Reconstructs the full name of a node by walking parent links.
    pub fn name_of(&self, node: NodeId) -> Name {
        let mut components = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = &self.nodes[id.0];
            if let Some(component) = &n.component {
                components.push(component.clone());
            }
            current = n.parent;
        }
        let mut name = Name::new();
        for component in components.into_iter().rev() {
            name.push(component);
        }
        name
    }
}

impl Default for NameTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut tree = NameTree::new();
        let a = tree.lookup_or_insert(&Name::from_string("/a"));
        let ab = tree.lookup_or_insert(&Name::from_string("/a/b"));
        assert_ne!(a, ab);

        // idempotent
        assert_eq!(tree.lookup_or_insert(&Name::from_string("/a/b")), ab);
        assert_eq!(tree.lookup(&Name::from_string("/a")), Some(a));
        assert_eq!(tree.lookup(&Name::from_string("/a/c")), None);
    }

    #[test]
    fn prefixes_walk_existing_path() {
        let mut tree = NameTree::new();
        let a = tree.lookup_or_insert(&Name::from_string("/a"));
        let ab = tree.lookup_or_insert(&Name::from_string("/a/b"));

        let path = tree.prefixes(&Name::from_string("/a/b/c/d"));
        assert_eq!(path, vec![tree.root(), a, ab]);

        let path = tree.prefixes(&Name::from_string("/z"));
        assert_eq!(path, vec![tree.root()]);
    }

    #[test]
    fn name_reconstruction() {
        let mut tree = NameTree::new();
        let node = tree.lookup_or_insert(&Name::from_string("/video/hd/seg1"));
        assert_eq!(tree.name_of(node), Name::from_string("/video/hd/seg1"));
        assert_eq!(tree.name_of(tree.root()), Name::new());
    }
}
