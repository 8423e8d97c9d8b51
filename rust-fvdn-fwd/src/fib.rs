//! Forwarding Information Base: longest-prefix-match table of next-hop
//! face sets, consumed by the forwarding strategy.

use crate::name_tree::{NameTree, NodeId};
use log::info;
use rust_fvdn_common::ndn::Name;
use rust_fvdn_common::types::FaceId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub struct FibEntry {
    pub prefix: Name,
    /// Next hops ordered by ascending cost.
    pub next_hops: Vec<NextHop>,
}

pub struct Fib {
    entries: HashMap<NodeId, FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds a next hop under `prefix`, replacing the cost of an existing
    /// hop through the same face.
    pub fn add_next_hop(&mut self, tree: &mut NameTree, prefix: &Name, face: FaceId, cost: u32) {
        let node = tree.lookup_or_insert(prefix);
        let entry = self.entries.entry(node).or_insert_with(|| FibEntry {
            prefix: prefix.clone(),
            next_hops: Vec::new(),
        });
        match entry.next_hops.iter_mut().find(|h| h.face == face) {
            Some(hop) => hop.cost = cost,
            None => entry.next_hops.push(NextHop { face, cost }),
        }
        entry.next_hops.sort_by_key(|h| h.cost);
        info!("fib add prefix={} nexthop={} cost={}", prefix, face, cost);
    }

    /// Removes the next hop through `face`; drops the entry when no hop
    /// remains.
    pub fn remove_next_hop(&mut self, tree: &NameTree, prefix: &Name, face: FaceId) {
        let Some(node) = tree.lookup(prefix) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(&node) {
            entry.next_hops.retain(|h| h.face != face);
            if entry.next_hops.is_empty() {
                self.entries.remove(&node);
            }
            info!("fib remove prefix={} nexthop={}", prefix, face);
        }
    }

    /// Deepest entry whose prefix matches `name`.
    pub fn find_longest_prefix_match(&self, tree: &NameTree, name: &Name) -> Option<&FibEntry> {
        tree.prefixes(name)
            .into_iter()
            .rev()
            .find_map(|node| self.entries.get(&node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Fib {
    fn default() -> Self {
        Self::new()
    }
}
