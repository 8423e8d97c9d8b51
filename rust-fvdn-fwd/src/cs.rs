//! Content Store: name-indexed cache of Data with freshness metadata and
//! the per-entry origin timestamp consumed by the validation probe.
//!
//! Insertion replaces any entry of the same exact name. Lookup is by exact
//! name and does not filter on freshness: under the probe protocol the
//! origin decides whether a copy is stale, not the cache. The legacy
//! direct-hit path checks [`CsEntry::is_fresh`] itself.

use crate::name_tree::{NameTree, NodeId};
use rust_fvdn_common::ndn::{Data, Name};
use rust_fvdn_common::types::DEFAULT_CS_CAPACITY;
use std::collections::{HashMap, VecDeque};

pub struct CsEntry {
    pub data: Data,
    pub freshness_deadline_ms: u64,
    /// Origin content timestamp in seconds, copied into probe Interests.
    pub origin_timestamp: u64,
}

impl CsEntry {
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.freshness_deadline_ms > now_ms
    }
}

pub struct Cs {
    entries: HashMap<NodeId, CsEntry>,
    insertion_order: VecDeque<NodeId>,
    capacity: usize,
}

impl Cs {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Inserts or replaces the entry for the Data's exact name.
    pub fn insert(&mut self, tree: &mut NameTree, data: Data, now_ms: u64) {
        let node = tree.lookup_or_insert(&data.name);
        let entry = CsEntry {
            freshness_deadline_ms: now_ms + data.freshness_period_ms.unwrap_or(0),
            origin_timestamp: data.timestamp,
            data,
        };
        if self.entries.insert(node, entry).is_none() {
            self.insertion_order.push_back(node);
            if self.insertion_order.len() > self.capacity {
                if let Some(evicted) = self.insertion_order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
    }

    /// Exact-name lookup.
    pub fn find(&self, tree: &NameTree, name: &Name) -> Option<&CsEntry> {
        tree.lookup(name).and_then(|node| self.entries.get(&node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Cs {
    fn default() -> Self {
        Self::new()
    }
}
