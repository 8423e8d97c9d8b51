//! Dead Nonce List: bounded set of recently seen (name, nonce) pairs used
//! for loop suppression after the PIT entry is gone.
//!
//! Entries live for a sliding-window lifetime; the expiry queue is drained
//! opportunistically on insert. Names are held as name-tree node indices,
//! which stay valid after the PIT entry's deletion.

use crate::name_tree::{NameTree, NodeId};
use rust_fvdn_common::ndn::Name;
use std::collections::{HashMap, VecDeque};

/// Default entry lifetime.
pub const DEFAULT_DNL_LIFETIME_MS: u64 = 6_000;

pub struct DeadNonceList {
    lifetime_ms: u64,
    entries: HashMap<(NodeId, u32), u64>,
    expiry_order: VecDeque<((NodeId, u32), u64)>,
}

impl DeadNonceList {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_DNL_LIFETIME_MS)
    }

    pub fn with_lifetime(lifetime_ms: u64) -> Self {
        Self {
            lifetime_ms,
            entries: HashMap::new(),
            expiry_order: VecDeque::new(),
        }
    }

    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }

    /// Records (name, nonce) until `now + lifetime`.
    pub fn add(&mut self, tree: &mut NameTree, name: &Name, nonce: u32, now_ms: u64) {
        self.evict_expired(now_ms);
        let key = (tree.lookup_or_insert(name), nonce);
        let expires_ms = now_ms + self.lifetime_ms;
        self.entries.insert(key, expires_ms);
        self.expiry_order.push_back((key, expires_ms));
    }

    /// Whether (name, nonce) is currently recorded.
    pub fn has(&self, tree: &NameTree, name: &Name, nonce: u32, now_ms: u64) -> bool {
        let Some(node) = tree.lookup(name) else {
            return false;
        };
        self.entries
            .get(&(node, nonce))
            .map(|&expires_ms| expires_ms > now_ms)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self, now_ms: u64) {
        while let Some(&(key, queued_expiry)) = self.expiry_order.front() {
            if queued_expiry > now_ms {
                break;
            }
            self.expiry_order.pop_front();
            // Only drop the map entry when it was not re-added later.
            if self.entries.get(&key) == Some(&queued_expiry) {
                self.entries.remove(&key);
            }
        }
    }
}

impl Default for DeadNonceList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_has() {
        let mut tree = NameTree::new();
        let mut dnl = DeadNonceList::new();
        let name = Name::from_string("/x");

        dnl.add(&mut tree, &name, 7, 0);
        assert!(dnl.has(&tree, &name, 7, 100));
        assert!(!dnl.has(&tree, &name, 8, 100));
        assert!(!dnl.has(&tree, &Name::from_string("/y"), 7, 100));
    }

    #[test]
    fn entries_expire_after_lifetime() {
        let mut tree = NameTree::new();
        let mut dnl = DeadNonceList::with_lifetime(1000);
        let name = Name::from_string("/x");

        dnl.add(&mut tree, &name, 7, 0);
        assert!(dnl.has(&tree, &name, 7, 999));
        assert!(!dnl.has(&tree, &name, 7, 1000));

        // a later insert triggers eviction of the stale record
        dnl.add(&mut tree, &Name::from_string("/y"), 1, 2000);
        assert_eq!(dnl.len(), 1);
    }

    #[test]
    fn readding_refreshes_lifetime() {
        let mut tree = NameTree::new();
        let mut dnl = DeadNonceList::with_lifetime(1000);
        let name = Name::from_string("/x");

        dnl.add(&mut tree, &name, 7, 0);
        dnl.add(&mut tree, &name, 7, 500);
        assert!(dnl.has(&tree, &name, 7, 1400));

        // the stale queue record must not evict the refreshed entry
        dnl.add(&mut tree, &Name::from_string("/z"), 2, 1100);
        assert!(dnl.has(&tree, &name, 7, 1400));
    }
}
