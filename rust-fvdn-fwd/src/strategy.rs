//! Forwarding strategies.
//!
//! A strategy decides which upstream faces a pending Interest goes to and
//! is notified when the entry is satisfied or expires. The decision comes
//! back as a value the forwarder executes, so strategies never reach back
//! into the forwarder's tables.

use crate::fib::FibEntry;
use crate::pit::PitEntry;
use rust_fvdn_common::ndn::{Data, Interest, Name};
use rust_fvdn_common::types::FaceId;

/// One upstream the strategy wants the Interest sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamChoice {
    pub face: FaceId,
    /// Draw a fresh nonce instead of reusing the picked Interest's nonce.
    pub fresh_nonce: bool,
}

/// Outcome of `after_receive_interest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingDecision {
    Forward(Vec<UpstreamChoice>),
    Reject,
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Called for every Interest that reached the forwarding stage.
    fn after_receive_interest(
        &mut self,
        in_face: FaceId,
        interest: &Interest,
        fib_entry: Option<&FibEntry>,
        pit_entry: &PitEntry,
    ) -> ForwardingDecision;

    /// Called before a pending Interest is satisfied by Data.
    fn before_satisfy_interest(&mut self, _pit_entry: &PitEntry, _in_face: FaceId, _data: &Data) {}

    /// Called when the unsatisfy timer expires a pending Interest.
    fn before_expire_pending_interest(&mut self, _pit_entry: &PitEntry) {}
}

/// Forwards to every FIB next hop except the incoming face.
#[derive(Debug, Default)]
pub struct MulticastStrategy;

impl Strategy for MulticastStrategy {
    fn name(&self) -> &'static str {
        "multicast"
    }

    fn after_receive_interest(
        &mut self,
        in_face: FaceId,
        _interest: &Interest,
        fib_entry: Option<&FibEntry>,
        _pit_entry: &PitEntry,
    ) -> ForwardingDecision {
        let Some(fib_entry) = fib_entry else {
            return ForwardingDecision::Reject;
        };
        let choices: Vec<_> = fib_entry
            .next_hops
            .iter()
            .filter(|hop| hop.face != in_face)
            .map(|hop| UpstreamChoice {
                face: hop.face,
                fresh_nonce: false,
            })
            .collect();
        if choices.is_empty() {
            ForwardingDecision::Reject
        } else {
            ForwardingDecision::Forward(choices)
        }
    }
}

/// Forwards to the lowest-cost FIB next hop that is not the incoming face.
#[derive(Debug, Default)]
pub struct BestRouteStrategy;

impl Strategy for BestRouteStrategy {
    fn name(&self) -> &'static str {
        "best-route"
    }

    fn after_receive_interest(
        &mut self,
        in_face: FaceId,
        _interest: &Interest,
        fib_entry: Option<&FibEntry>,
        _pit_entry: &PitEntry,
    ) -> ForwardingDecision {
        fib_entry
            .and_then(|entry| entry.next_hops.iter().find(|hop| hop.face != in_face))
            .map(|hop| {
                ForwardingDecision::Forward(vec![UpstreamChoice {
                    face: hop.face,
                    fresh_nonce: false,
                }])
            })
            .unwrap_or(ForwardingDecision::Reject)
    }
}

/// Selects the strategy responsible for a name, by longest prefix.
pub struct StrategyChoice {
    // longest-prefix scan over a small table; the default sits at "/"
    table: Vec<(Name, Box<dyn Strategy>)>,
}

impl StrategyChoice {
    pub fn new(default: Box<dyn Strategy>) -> Self {
        Self {
            table: vec![(Name::new(), default)],
        }
    }

    /// Installs `strategy` for every name under `prefix`.
    pub fn set(&mut self, prefix: Name, strategy: Box<dyn Strategy>) {
        match self.table.iter_mut().find(|(p, _)| *p == prefix) {
            Some(slot) => slot.1 = strategy,
            None => self.table.push((prefix, strategy)),
        }
    }

    /// The strategy with the longest prefix matching `name`.
    pub fn find_mut(&mut self, name: &Name) -> &mut dyn Strategy {
        let mut best: usize = 0;
        let mut best_len: usize = 0;
        for (idx, (prefix, _)) in self.table.iter().enumerate() {
            if prefix.is_prefix_of(name) && (prefix.len() >= best_len) {
                best = idx;
                best_len = prefix.len();
            }
        }
        self.table[best].1.as_mut()
    }
}

impl Default for StrategyChoice {
    fn default() -> Self {
        Self::new(Box::new(MulticastStrategy))
    }
}
