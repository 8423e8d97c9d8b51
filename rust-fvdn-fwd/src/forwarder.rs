//! The forwarding pipelines.
//!
//! Each stage runs to completion on the single-threaded core. Interests
//! enter through [`Forwarder::on_incoming_interest`], Data through
//! [`Forwarder::on_incoming_data`], and the host advances the virtual clock
//! with [`Forwarder::advance_clock`] to drive the PIT timers.
//!
//! A content-store hit does not answer from cache. Instead the Interest is
//! turned into a validation probe (`signal_flag` set, cached origin
//! timestamp and local node id stamped on) and forwarded towards the
//! producer, which either returns fresh content (`expiration_flag = 1`) or
//! a lightweight not-expired acknowledgement (`expiration_flag = 0`) that
//! releases the cached copies downstream. Probe replies are source-routed
//! back over the face ids collected in `pit_list` on the forward path.

use crate::cs::{Cs, CsEntry};
use crate::dead_nonce_list::DeadNonceList;
use crate::face::{FaceTable, NullTransport, Transport};
use crate::fib::Fib;
use crate::name_tree::NameTree;
use crate::pit::{Pit, PitEntry, PitEntryId};
use crate::scheduler::EventScheduler;
use crate::strategy::{ForwardingDecision, Strategy, StrategyChoice};
use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_fvdn_common::metrics::ForwarderMetrics;
use rust_fvdn_common::ndn::{Data, Interest, Name};
use rust_fvdn_common::types::{FaceId, NodeIndex, FACEID_CONTENT_STORE, INVALID_FACEID};
use std::collections::BTreeSet;

/// Straggler timer delay after satisfy/reject.
const STRAGGLER_DELAY_MS: u64 = 100;

/// Timer callbacks carry the entry id, never a reference.
#[derive(Debug, Clone, Copy)]
enum TimerEvent {
    Unsatisfy(PitEntryId),
    Straggler {
        entry: PitEntryId,
        is_satisfied: bool,
        freshness_ms: Option<u64>,
    },
}

pub struct Forwarder {
    node_index: NodeIndex,
    validation_enabled: bool,
    name_tree: NameTree,
    face_table: FaceTable,
    pit: Pit,
    fib: Fib,
    cs: Cs,
    dnl: DeadNonceList,
    strategy_choice: StrategyChoice,
    scheduler: EventScheduler<TimerEvent>,
    metrics: ForwarderMetrics,
    rng: StdRng,
}

impl Forwarder {
    pub fn new(node_index: NodeIndex) -> Self {
        let mut face_table = FaceTable::new();
        face_table.add_reserved(FACEID_CONTENT_STORE, true, Box::new(NullTransport));
        Self {
            node_index,
            validation_enabled: true,
            name_tree: NameTree::new(),
            face_table,
            pit: Pit::new(),
            fib: Fib::new(),
            cs: Cs::new(),
            dnl: DeadNonceList::new(),
            strategy_choice: StrategyChoice::default(),
            scheduler: EventScheduler::new(),
            metrics: ForwarderMetrics::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic nonce draws, for reproducible hosts and tests.
    pub fn with_rng_seed(node_index: NodeIndex, seed: u64) -> Self {
        let mut forwarder = Self::new(node_index);
        forwarder.rng = StdRng::seed_from_u64(seed);
        forwarder
    }

    pub fn node_index(&self) -> NodeIndex {
        self.node_index
    }

    /// Turns the probe protocol off; cache hits then answer directly.
    pub fn set_validation_enabled(&mut self, enabled: bool) {
        self.validation_enabled = enabled;
    }

    pub fn add_face(&mut self, local: bool, transport: Box<dyn Transport>) -> FaceId {
        self.face_table.add(local, transport)
    }

    pub fn add_route(&mut self, prefix: &Name, face: FaceId, cost: u32) {
        self.fib.add_next_hop(&mut self.name_tree, prefix, face, cost);
    }

    pub fn set_strategy(&mut self, prefix: Name, strategy: Box<dyn Strategy>) {
        self.strategy_choice.set(prefix, strategy);
    }

    pub fn metrics(&self) -> &ForwarderMetrics {
        &self.metrics
    }

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn pit_len(&self) -> usize {
        self.pit.len()
    }

    pub fn cs_lookup(&self, name: &Name) -> Option<&CsEntry> {
        self.cs.find(&self.name_tree, name)
    }

    pub fn dnl_has(&self, name: &Name, nonce: u32) -> bool {
        self.dnl
            .has(&self.name_tree, name, nonce, self.scheduler.now())
    }

    /// Runs every timer due at or before `now_ms`, then advances the clock.
    pub fn advance_clock(&mut self, now_ms: u64) {
        while let Some(event) = self.scheduler.pop_due(now_ms) {
            match event {
                TimerEvent::Unsatisfy(entry) => self.on_interest_unsatisfied(entry),
                TimerEvent::Straggler {
                    entry,
                    is_satisfied,
                    freshness_ms,
                } => self.on_interest_finalize(entry, is_satisfied, freshness_ms),
            }
        }
        self.scheduler.set_now(now_ms);
    }

    /* ------------------------------------------------------------ *
     * Interest pipelines
     * ------------------------------------------------------------ */

    pub fn on_incoming_interest(&mut self, in_face: FaceId, mut interest: Interest) {
        let Some(face_local) = self.face_table.get(in_face).map(|f| f.is_local()) else {
            warn!("onIncomingInterest face=unknown interest={}", interest.name);
            return;
        };
        debug!(
            "onIncomingInterest face={} interest={}",
            in_face, interest.name
        );
        interest.incoming_face_id = in_face;
        self.metrics.n_in_interests.increment();

        // /localhost scope control
        if violates_localhost(face_local, &interest.name) {
            debug!(
                "onIncomingInterest face={} interest={} violates /localhost",
                in_face, interest.name
            );
            return;
        }

        // PIT insert
        let (entry_id, created) = self.pit.insert(&mut self.name_tree, &interest);
        if created {
            self.metrics.pit_inserts.increment();
        }
        self.metrics.pit_size.set(self.pit.len() as u64);

        // detect duplicate Nonce
        let has_duplicate_nonce = self
            .pit
            .get(entry_id)
            .map(|entry| entry.find_nonce(interest.nonce, in_face).is_some())
            .unwrap_or(false)
            || self
                .dnl
                .has(&self.name_tree, &interest.name, interest.nonce, self.now());
        if has_duplicate_nonce {
            self.on_interest_loop(in_face, &interest);
            return;
        }

        // cancel unsatisfy & straggler timer
        self.cancel_timers(entry_id);

        if interest.signal_flag {
            // probe in transit: extend the source-route trace
            interest.pit_list.push(in_face);
            self.on_interest_signal_forward(in_face, entry_id, interest);
            return;
        }

        enum Hit {
            Probe(u64),
            Direct(Data),
        }

        let is_pending = self
            .pit
            .get(entry_id)
            .map(|entry| entry.is_pending())
            .unwrap_or(false);
        let hit = if is_pending {
            None
        } else {
            let now = self.scheduler.now();
            match self.cs.find(&self.name_tree, &interest.name) {
                Some(entry) if self.validation_enabled => Some(Hit::Probe(entry.origin_timestamp)),
                Some(entry) if !interest.must_be_fresh || entry.is_fresh(now) => {
                    Some(Hit::Direct(entry.data.clone()))
                }
                _ => None,
            }
        };

        match hit {
            Some(Hit::Probe(origin_timestamp)) => {
                self.metrics.cs_hits.increment();
                interest.signal_flag = true;
                interest.timestamp = origin_timestamp;
                interest.node_index = self.node_index;
                self.on_content_store_hit_check(in_face, entry_id, interest);
            }
            Some(Hit::Direct(data)) => {
                self.metrics.cs_hits.increment();
                self.on_content_store_hit(in_face, entry_id, &interest, data);
            }
            None => {
                if !is_pending {
                    self.metrics.cs_misses.increment();
                }
                self.on_content_store_miss(in_face, entry_id, interest);
            }
        }
    }

    /// The local node converted a cache hit into a validation probe; the
    /// entry is kept so downstream waiters aggregate on the probe.
    fn on_content_store_hit_check(
        &mut self,
        in_face: FaceId,
        entry_id: PitEntryId,
        interest: Interest,
    ) {
        debug!("onContentStoreHitCheck interest={}", interest.name);
        self.forward_interest(in_face, entry_id, interest, true, false);
    }

    /// Intermediate hop of a probe: no unsatisfy timer, and the entry is
    /// erased right after forwarding. Replies come back over `pit_list`.
    fn on_interest_signal_forward(
        &mut self,
        in_face: FaceId,
        entry_id: PitEntryId,
        interest: Interest,
    ) {
        debug!("onInterestSignalForward interest={}", interest.name);
        self.forward_interest(in_face, entry_id, interest, false, true);
    }

    fn on_content_store_miss(&mut self, in_face: FaceId, entry_id: PitEntryId, interest: Interest) {
        debug!("onContentStoreMiss interest={}", interest.name);
        self.forward_interest(in_face, entry_id, interest, true, false);
    }

    /// Shared tail of the three forwarding stages: InRecord upkeep, timer,
    /// FIB lookup and strategy dispatch.
    fn forward_interest(
        &mut self,
        in_face: FaceId,
        entry_id: PitEntryId,
        interest: Interest,
        arm_unsatisfy: bool,
        erase_after: bool,
    ) {
        let now = self.scheduler.now();
        {
            let Some(entry) = self.pit.get_mut(entry_id) else {
                return;
            };
            entry.insert_or_update_in_record(in_face, &interest, now);
        }
        if arm_unsatisfy {
            self.set_unsatisfy_timer(entry_id);
        }

        let decision = {
            let Some(entry) = self.pit.get(entry_id) else {
                return;
            };
            let fib_entry = self
                .fib
                .find_longest_prefix_match(&self.name_tree, &entry.name);
            let strategy = self.strategy_choice.find_mut(&entry.name);
            strategy.after_receive_interest(in_face, &interest, fib_entry, entry)
        };

        match decision {
            ForwardingDecision::Forward(choices) => {
                for choice in choices {
                    self.on_outgoing_interest(entry_id, choice.face, choice.fresh_nonce);
                }
            }
            ForwardingDecision::Reject => self.on_interest_reject(entry_id),
        }

        if erase_after {
            self.erase_pit_entry(entry_id);
        }
    }

    /// Legacy direct cache hit, used when validation is disabled.
    fn on_content_store_hit(
        &mut self,
        in_face: FaceId,
        entry_id: PitEntryId,
        interest: &Interest,
        mut data: Data,
    ) {
        debug!("onContentStoreHit interest={}", interest.name);
        {
            let Some(entry) = self.pit.get(entry_id) else {
                return;
            };
            let strategy = self.strategy_choice.find_mut(&entry.name);
            strategy.before_satisfy_interest(entry, FACEID_CONTENT_STORE, &data);
        }
        data.incoming_face_id = FACEID_CONTENT_STORE;
        self.set_straggler_timer(entry_id, true, data.freshness_period_ms);
        self.on_outgoing_data(&data, in_face);
    }

    fn on_interest_loop(&mut self, in_face: FaceId, interest: &Interest) {
        debug!(
            "onInterestLoop face={} interest={}",
            in_face, interest.name
        );
        self.metrics.interest_loops.increment();
        // (drop)
    }

    fn on_outgoing_interest(
        &mut self,
        entry_id: PitEntryId,
        out_face: FaceId,
        want_new_nonce: bool,
    ) {
        let now = self.scheduler.now();
        let out_face_local = match self.face_table.get(out_face) {
            Some(face) if face.id() != INVALID_FACEID => face.is_local(),
            _ => {
                warn!("onOutgoingInterest face=invalid");
                return;
            }
        };

        let interest = {
            let Some(entry) = self.pit.get_mut(entry_id) else {
                return;
            };
            debug!("onOutgoingInterest face={} interest={}", out_face, entry.name);

            // scope control
            if entry.violates_scope(out_face_local) {
                debug!(
                    "onOutgoingInterest face={} interest={} violates scope",
                    out_face, entry.name
                );
                return;
            }

            // pick Interest: the latest-renewed InRecord whose face differs
            // from outFace; an outFace-only record is acceptable as the
            // last resort.
            let Some(picked) = entry
                .in_records()
                .iter()
                .max_by_key(|r| (r.face != out_face, r.last_renewed_ms))
                .cloned()
            else {
                return;
            };

            let mut interest = picked.interest;
            if want_new_nonce {
                interest.nonce = self.rng.gen();
            }

            entry.insert_or_update_out_record(
                out_face,
                interest.nonce,
                now + interest.lifetime_ms as u64,
            );
            interest
        };

        if let Some(face) = self.face_table.get_mut(out_face) {
            face.send_interest(&interest);
        }
        self.metrics.n_out_interests.increment();
    }

    /// Only valid while no unexpired OutRecords exist; arms the straggler
    /// timer in unsatisfied mode.
    fn on_interest_reject(&mut self, entry_id: PitEntryId) {
        let now = self.scheduler.now();
        {
            let Some(entry) = self.pit.get(entry_id) else {
                return;
            };
            if entry.has_unexpired_out_records(now) {
                error!(
                    "onInterestReject interest={} cannot reject forwarded Interest",
                    entry.name
                );
                return;
            }
            debug!("onInterestReject interest={}", entry.name);
        }
        self.cancel_timers(entry_id);
        self.set_straggler_timer(entry_id, false, None);
    }

    fn on_interest_unsatisfied(&mut self, entry_id: PitEntryId) {
        {
            let Some(entry) = self.pit.get(entry_id) else {
                return;
            };
            debug!("onInterestUnsatisfied interest={}", entry.name);
            let strategy = self.strategy_choice.find_mut(&entry.name);
            strategy.before_expire_pending_interest(entry);
        }
        self.metrics.pit_expirations.increment();
        self.on_interest_finalize(entry_id, false, None);
    }

    fn on_interest_finalize(
        &mut self,
        entry_id: PitEntryId,
        is_satisfied: bool,
        freshness_ms: Option<u64>,
    ) {
        {
            let Some(entry) = self.pit.get(entry_id) else {
                return;
            };
            debug!(
                "onInterestFinalize interest={}{}",
                entry.name,
                if is_satisfied { " satisfied" } else { " unsatisfied" }
            );
            Self::insert_dead_nonce_list(
                &mut self.dnl,
                &mut self.name_tree,
                &self.metrics,
                entry,
                is_satisfied,
                freshness_ms,
                None,
                self.scheduler.now(),
            );
        }
        self.erase_pit_entry(entry_id);
    }

    /* ------------------------------------------------------------ *
     * Data pipelines
     * ------------------------------------------------------------ */

    pub fn on_incoming_data(&mut self, in_face: FaceId, mut data: Data) {
        let Some(face_local) = self.face_table.get(in_face).map(|f| f.is_local()) else {
            warn!("onIncomingData face=unknown data={}", data.name);
            return;
        };
        debug!("onIncomingData face={} data={}", in_face, data.name);
        data.incoming_face_id = in_face;
        self.metrics.n_in_datas.increment();

        // /localhost scope control
        if violates_localhost(face_local, &data.name) {
            debug!(
                "onIncomingData face={} data={} violates /localhost",
                in_face, data.name
            );
            return;
        }

        if data.signal_flag {
            if data.node_index == self.node_index {
                // probe reply arrived back at the originating node
                debug!("onIncomingData probe reply at originator data={}", data.name);
                data.signal_flag = false;
                let update_cs = data.expiration_flag;
                self.satisfy_matches(in_face, data, update_cs, face_local);
            } else {
                self.on_probe_transit(in_face, data);
            }
        } else {
            self.satisfy_matches(in_face, data, true, face_local);
        }
    }

    /// Satisfies every matching PIT entry and fans the Data out to the
    /// pending downstreams. `update_cs` is false only for a not-expired
    /// probe acknowledgement, which must leave the cache untouched.
    fn satisfy_matches(&mut self, in_face: FaceId, data: Data, update_cs: bool, in_face_local: bool) {
        let now = self.scheduler.now();
        let matches = self.pit.find_all_data_matches(&self.name_tree, &data.name);
        if matches.is_empty() {
            self.on_data_unsolicited(in_face, data, in_face_local);
            return;
        }

        if update_cs {
            let mut cached = data.clone();
            cached.incoming_face_id = INVALID_FACEID;
            self.cs.insert(&mut self.name_tree, cached, now);
            self.metrics.cs_inserts.increment();
        }

        let mut pending_downstreams: BTreeSet<FaceId> = BTreeSet::new();
        for entry_id in matches {
            self.cancel_timers(entry_id);
            {
                let Some(entry) = self.pit.get_mut(entry_id) else {
                    continue;
                };
                debug!("onIncomingData matching={}", entry.name);

                // remember pending downstreams
                for record in entry.in_records() {
                    if record.expiry_ms > now {
                        pending_downstreams.insert(record.face);
                    }
                }

                // invoke PIT satisfy callback
                let strategy = self.strategy_choice.find_mut(&entry.name);
                strategy.before_satisfy_interest(entry, in_face, &data);

                // Dead Nonce List insert for the OutRecord of inFace
                Self::insert_dead_nonce_list(
                    &mut self.dnl,
                    &mut self.name_tree,
                    &self.metrics,
                    entry,
                    true,
                    data.freshness_period_ms,
                    Some(in_face),
                    now,
                );

                // mark PIT satisfied
                entry.delete_in_records();
                entry.delete_out_record(in_face);
            }
            self.set_straggler_timer(entry_id, true, data.freshness_period_ms);
        }
        self.metrics.pit_size.set(self.pit.len() as u64);

        for downstream in pending_downstreams {
            if downstream == in_face {
                continue;
            }
            self.on_outgoing_data(&data, downstream);
        }
    }

    /// Probe reply at a node that is not the originator: source-routed over
    /// `pit_list`, the PIT is not consulted.
    fn on_probe_transit(&mut self, in_face: FaceId, mut data: Data) {
        let now = self.scheduler.now();
        let Some(next_hop) = data.pit_list.pop() else {
            warn!(
                "onIncomingData face={} data={} probe reply carries no return route",
                in_face, data.name
            );
            return;
        };
        debug!(
            "onIncomingData probe transit data={} next={}",
            data.name, next_hop
        );

        if data.expiration_flag {
            // fresh content rides the reply: take it into the local cache
            data.signal_flag = false;
            let mut cached = data.clone();
            cached.incoming_face_id = INVALID_FACEID;
            self.cs.insert(&mut self.name_tree, cached, now);
            self.metrics.cs_inserts.increment();
        }

        self.on_outgoing_data(&data, next_hop);
    }

    fn on_data_unsolicited(&mut self, in_face: FaceId, data: Data, in_face_local: bool) {
        // accept to cache?
        if in_face_local {
            let now = self.scheduler.now();
            let mut cached = data.clone();
            cached.incoming_face_id = INVALID_FACEID;
            self.cs.insert(&mut self.name_tree, cached, now);
            self.metrics.cs_inserts.increment();
        }
        debug!(
            "onDataUnsolicited face={} data={} {}",
            in_face,
            data.name,
            if in_face_local { "cached" } else { "not cached" }
        );
    }

    fn on_outgoing_data(&mut self, data: &Data, out_face: FaceId) {
        let Some(face) = self.face_table.get_mut(out_face) else {
            warn!("onOutgoingData face=invalid data={}", data.name);
            return;
        };
        debug!("onOutgoingData face={} data={}", out_face, data.name);

        // /localhost scope control
        if violates_localhost(face.is_local(), &data.name) {
            debug!(
                "onOutgoingData face={} data={} violates /localhost",
                out_face, data.name
            );
            return;
        }

        face.send_data(data);
        self.metrics.n_out_datas.increment();
    }

    /* ------------------------------------------------------------ *
     * Timers and the Dead Nonce List
     * ------------------------------------------------------------ */

    /// Arms the unsatisfy timer at the latest InRecord expiry.
    fn set_unsatisfy_timer(&mut self, entry_id: PitEntryId) {
        let now = self.scheduler.now();
        let Some(entry) = self.pit.get_mut(entry_id) else {
            return;
        };
        let Some(last_expiry) = entry.in_records().iter().map(|r| r.expiry_ms).max() else {
            return;
        };
        if let Some(handle) = entry.unsatisfy_timer.take() {
            self.scheduler.cancel(handle);
        }
        entry.unsatisfy_timer = Some(self.scheduler.schedule(
            last_expiry.saturating_sub(now),
            TimerEvent::Unsatisfy(entry_id),
        ));
    }

    /// Arms the straggler timer, which finalizes the entry 100 ms later.
    fn set_straggler_timer(
        &mut self,
        entry_id: PitEntryId,
        is_satisfied: bool,
        freshness_ms: Option<u64>,
    ) {
        let Some(entry) = self.pit.get_mut(entry_id) else {
            return;
        };
        if let Some(handle) = entry.straggler_timer.take() {
            self.scheduler.cancel(handle);
        }
        entry.straggler_timer = Some(self.scheduler.schedule(
            STRAGGLER_DELAY_MS,
            TimerEvent::Straggler {
                entry: entry_id,
                is_satisfied,
                freshness_ms,
            },
        ));
    }

    fn cancel_timers(&mut self, entry_id: PitEntryId) {
        let Some(entry) = self.pit.get_mut(entry_id) else {
            return;
        };
        if let Some(handle) = entry.unsatisfy_timer.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(handle) = entry.straggler_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn erase_pit_entry(&mut self, entry_id: PitEntryId) {
        self.cancel_timers(entry_id);
        self.pit.erase(entry_id);
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    /// Inserts nonces into the DNL per the finalize rules: always when
    /// unsatisfied; when satisfied only if the Interest required freshness
    /// and the Data's freshness period is below the DNL lifetime. With an
    /// upstream given, only that face's OutRecord nonce is recorded.
    #[allow(clippy::too_many_arguments)]
    fn insert_dead_nonce_list(
        dnl: &mut DeadNonceList,
        tree: &mut NameTree,
        metrics: &ForwarderMetrics,
        entry: &PitEntry,
        is_satisfied: bool,
        freshness_ms: Option<u64>,
        upstream: Option<FaceId>,
        now_ms: u64,
    ) {
        let need_dnl = if is_satisfied {
            entry.interest.must_be_fresh
                && freshness_ms
                    .map(|period| period < dnl.lifetime_ms())
                    .unwrap_or(false)
        } else {
            true
        };
        if !need_dnl {
            return;
        }

        match upstream {
            Some(face) => {
                if let Some(record) = entry.out_record(face) {
                    dnl.add(tree, &entry.name, record.last_nonce, now_ms);
                    metrics.dnl_inserts.increment();
                }
            }
            None => {
                for record in entry.out_records() {
                    dnl.add(tree, &entry.name, record.last_nonce, now_ms);
                    metrics.dnl_inserts.increment();
                }
            }
        }
    }
}

/// Non-local faces must not carry names under `/localhost`.
fn violates_localhost(face_local: bool, name: &Name) -> bool {
    !face_local && name.is_under_localhost()
}

#[cfg(test)]
mod tests;
