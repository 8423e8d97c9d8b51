//! Pending Interest Table.
//!
//! Entries are keyed by name plus the freshness selector and owned by the
//! table; the name tree node only carries entry ids. Each entry holds at
//! most one InRecord and one OutRecord per face, and up to two timer
//! handles whose events carry the stable [`PitEntryId`] rather than any
//! reference into the table.

use crate::name_tree::{NameTree, NodeId};
use crate::scheduler::TimerHandle;
use rust_fvdn_common::ndn::{Interest, Name};
use rust_fvdn_common::types::FaceId;
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of a PIT entry, safe to hold across entry deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitEntryId(u64);

impl fmt::Display for PitEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pit:{}", self.0)
    }
}

/// Downstream face awaiting Data.
#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    pub interest: Interest,
    pub last_renewed_ms: u64,
    pub expiry_ms: u64,
}

/// Upstream face this Interest was forwarded to.
#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub last_nonce: u32,
    pub expiry_ms: u64,
}

pub struct PitEntry {
    pub id: PitEntryId,
    pub name: Name,
    pub must_be_fresh: bool,
    /// Representative Interest, kept for DNL decisions after records clear.
    pub interest: Interest,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    pub unsatisfy_timer: Option<TimerHandle>,
    pub straggler_timer: Option<TimerHandle>,
    node: NodeId,
}

impl PitEntry {
    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn is_pending(&self) -> bool {
        !self.in_records.is_empty()
    }

    /// Returns the face of a different InRecord carrying the same nonce,
    /// which indicates a looped or duplicated Interest.
    pub fn find_nonce(&self, nonce: u32, excluding_face: FaceId) -> Option<FaceId> {
        self.in_records
            .iter()
            .find(|r| r.face != excluding_face && r.interest.nonce == nonce)
            .map(|r| r.face)
    }

    /// Inserts or renews the InRecord for `face`.
    pub fn insert_or_update_in_record(&mut self, face: FaceId, interest: &Interest, now_ms: u64) {
        let expiry_ms = now_ms + interest.lifetime_ms as u64;
        match self.in_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.interest = interest.clone();
                record.last_renewed_ms = now_ms;
                record.expiry_ms = expiry_ms;
            }
            None => self.in_records.push(InRecord {
                face,
                interest: interest.clone(),
                last_renewed_ms: now_ms,
                expiry_ms,
            }),
        }
    }

    /// Inserts or renews the OutRecord for `face`.
    pub fn insert_or_update_out_record(&mut self, face: FaceId, nonce: u32, expiry_ms: u64) {
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.last_nonce = nonce;
                record.expiry_ms = expiry_ms;
            }
            None => self.out_records.push(OutRecord {
                face,
                last_nonce: nonce,
                expiry_ms,
            }),
        }
    }

    pub fn out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    pub fn delete_in_records(&mut self) {
        self.in_records.clear();
    }

    pub fn delete_out_record(&mut self, face: FaceId) {
        self.out_records.retain(|r| r.face != face);
    }

    pub fn has_unexpired_out_records(&self, now_ms: u64) -> bool {
        self.out_records.iter().any(|r| r.expiry_ms > now_ms)
    }

    /// An Interest pending under `/localhost` must not leave the node.
    pub fn violates_scope(&self, out_face_local: bool) -> bool {
        !out_face_local && self.name.is_under_localhost()
    }
}

pub struct Pit {
    entries: HashMap<PitEntryId, PitEntry>,
    by_node: HashMap<NodeId, Vec<PitEntryId>>,
    next_id: u64,
}

impl Pit {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_node: HashMap::new(),
            next_id: 0,
        }
    }

    /// Finds the entry for the Interest's name and selector, creating one
    /// if absent. Returns the entry id and whether it was newly created.
    pub fn insert(&mut self, tree: &mut NameTree, interest: &Interest) -> (PitEntryId, bool) {
        let node = tree.lookup_or_insert(&interest.name);
        let ids = self.by_node.entry(node).or_default();
        for &id in ids.iter() {
            if self.entries[&id].must_be_fresh == interest.must_be_fresh {
                return (id, false);
            }
        }

        let id = PitEntryId(self.next_id);
        self.next_id += 1;
        ids.push(id);
        self.entries.insert(
            id,
            PitEntry {
                id,
                name: interest.name.clone(),
                must_be_fresh: interest.must_be_fresh,
                interest: interest.clone(),
                in_records: Vec::new(),
                out_records: Vec::new(),
                unsatisfy_timer: None,
                straggler_timer: None,
                node,
            },
        );
        (id, true)
    }

    pub fn get(&self, id: PitEntryId) -> Option<&PitEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PitEntryId) -> Option<&mut PitEntry> {
        self.entries.get_mut(&id)
    }

    /// Removes an entry. Timer handles must be cancelled by the caller
    /// before erasing.
    pub fn erase(&mut self, id: PitEntryId) -> Option<PitEntry> {
        let entry = self.entries.remove(&id)?;
        if let Some(ids) = self.by_node.get_mut(&entry.node) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_node.remove(&entry.node);
            }
        }
        Some(entry)
    }

    /// All entries whose name is a prefix of (or equal to) the Data name.
    pub fn find_all_data_matches(&self, tree: &NameTree, name: &Name) -> Vec<PitEntryId> {
        tree.prefixes(name)
            .into_iter()
            .flat_map(|node| {
                self.by_node
                    .get(&node)
                    .into_iter()
                    .flatten()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new()
    }
}
