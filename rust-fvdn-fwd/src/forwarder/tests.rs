//! End-to-end tests of the forwarding pipelines.
//!
//! Single-node scenarios drive one forwarder through queue faces; the
//! probe scenarios hand-pump packets between two forwarders standing in
//! for the cache-hit node and the producer's node.

use super::*;
use crate::face::{Packet, QueueTransport};
use rust_fvdn_common::ndn::{Data, Interest, Name};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Outbox = Rc<RefCell<VecDeque<Packet>>>;

fn add_face(forwarder: &mut Forwarder, local: bool) -> (FaceId, Outbox) {
    let (transport, outbox) = QueueTransport::new();
    (forwarder.add_face(local, Box::new(transport)), outbox)
}

fn pop_interest(outbox: &Outbox) -> Interest {
    match outbox.borrow_mut().pop_front() {
        Some(Packet::Interest(interest)) => interest,
        other => panic!("expected Interest, got {:?}", other),
    }
}

fn pop_data(outbox: &Outbox) -> Data {
    match outbox.borrow_mut().pop_front() {
        Some(Packet::Data(data)) => data,
        other => panic!("expected Data, got {:?}", other),
    }
}

fn interest(name: &str, nonce: u32) -> Interest {
    Interest::new(Name::from_string(name))
        .with_nonce(nonce)
        .with_must_be_fresh(true)
}

fn data(name: &str, size: usize) -> Data {
    Data::new(Name::from_string(name), vec![0u8; size]).with_freshness_period_ms(0)
}

/// S1: miss, forward upstream, satisfy, cache, fan out downstream.
#[test]
fn miss_then_satisfy() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, f0_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    fw.on_incoming_interest(f0, interest("/x", 7));

    let forwarded = pop_interest(&f1_out);
    assert_eq!(forwarded.name, Name::from_string("/x"));
    assert_eq!(forwarded.nonce, 7);
    assert!(!forwarded.signal_flag);

    fw.on_incoming_data(f1, data("/x", 1024));

    assert!(fw.cs_lookup(&Name::from_string("/x")).is_some());
    let delivered = pop_data(&f0_out);
    assert_eq!(delivered.name, Name::from_string("/x"));
    assert!(f1_out.borrow().is_empty());

    let m = fw.metrics().snapshot();
    assert_eq!(m.n_in_interests, 1);
    assert_eq!(m.n_out_interests, 1);
    assert_eq!(m.n_in_datas, 1);
    assert_eq!(m.n_out_datas, 1);
}

/// S2: the same nonce arriving on another face before satisfy is looped.
#[test]
fn duplicate_nonce_is_looped() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f2, f2_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    fw.on_incoming_interest(f0, interest("/x", 7));
    assert_eq!(f1_out.borrow().len(), 1);

    fw.on_incoming_interest(f2, interest("/x", 7));

    // no second forward, and the looped copy got no state
    assert_eq!(f1_out.borrow().len(), 1);
    assert!(f2_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().interest_loops, 1);

    // f2 was never recorded as a downstream
    fw.on_incoming_data(f1, data("/x", 10));
    assert!(f2_out.borrow().is_empty());
}

/// Aggregated downstreams all receive the Data, but never the upstream.
#[test]
fn aggregation_fans_out_to_all_downstreams() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, f0_out) = add_face(&mut fw, true);
    let (f2, f2_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    fw.on_incoming_interest(f0, interest("/x", 1));
    fw.on_incoming_interest(f2, interest("/x", 2));

    f1_out.borrow_mut().clear();
    fw.on_incoming_data(f1, data("/x", 10));

    assert_eq!(f0_out.borrow().len(), 1);
    assert_eq!(f2_out.borrow().len(), 1);
    assert!(f1_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().n_out_datas, 2);
}

/// S3: cache hit becomes a probe; an expired reply refreshes every cache
/// on the way back and satisfies the waiter with the fresh content.
#[test]
fn probe_expired_refreshes_caches() {
    let name = Name::from_string("/x");

    // node A holds the cached copy
    let mut a = Forwarder::with_rng_seed(1, 1);
    let (f0, f0_out) = add_face(&mut a, true);
    let (fab, fab_out) = add_face(&mut a, false);
    a.add_route(&name, fab, 10);

    // node B hosts the producer app
    let mut b = Forwarder::with_rng_seed(2, 2);
    let (fba, fba_out) = add_face(&mut b, false);
    let (fapp, fapp_out) = add_face(&mut b, true);
    b.add_route(&name, fapp, 0);

    // seed A's cache through a local unsolicited Data with timestamp 10
    a.on_incoming_data(f0, data("/x", 1024).with_timestamp(10));
    assert_eq!(a.cs_lookup(&name).unwrap().origin_timestamp, 10);

    // the hit turns into a probe
    a.advance_clock(100);
    a.on_incoming_interest(f0, interest("/x", 7));
    let probe = pop_interest(&fab_out);
    assert!(probe.signal_flag);
    assert_eq!(probe.timestamp, 10);
    assert_eq!(probe.node_index, 1);
    assert_eq!(probe.nonce, 7);
    assert!(probe.pit_list.is_empty());

    // the probe's forward path left A's cache unchanged
    assert_eq!(a.cs_lookup(&name).unwrap().origin_timestamp, 10);

    // B forwards the probe to the producer app, tracing the in-face
    b.on_incoming_interest(fba, probe);
    let at_app = pop_interest(&fapp_out);
    assert!(at_app.signal_flag);
    assert_eq!(at_app.pit_list, vec![fba]);
    assert_eq!(b.pit_len(), 0); // probe entries are erased immediately

    // producer found the copy stale: reply carries fresh content
    let mut reply = data("/x", 1024).with_timestamp(25);
    reply.signal_flag = true;
    reply.expiration_flag = true;
    reply.node_index = at_app.node_index;
    reply.pit_list = at_app.pit_list.clone();
    b.on_incoming_data(fapp, reply);

    // the transit hop re-cached the fresh copy and popped its hop
    assert_eq!(b.cs_lookup(&name).unwrap().origin_timestamp, 25);
    let in_transit = pop_data(&fba_out);
    assert!(!in_transit.signal_flag);
    assert!(in_transit.pit_list.is_empty());

    // back at A: cache replaced, waiter satisfied
    a.on_incoming_data(fab, in_transit);
    assert_eq!(a.cs_lookup(&name).unwrap().origin_timestamp, 25);
    let delivered = pop_data(&f0_out);
    assert_eq!(delivered.timestamp, 25);
}

/// S4: a not-expired acknowledgement satisfies the waiters but leaves
/// every cache untouched.
#[test]
fn probe_not_expired_leaves_caches() {
    let name = Name::from_string("/x");

    let mut a = Forwarder::with_rng_seed(1, 1);
    let (f0, f0_out) = add_face(&mut a, true);
    let (fab, fab_out) = add_face(&mut a, false);
    a.add_route(&name, fab, 10);

    let mut b = Forwarder::with_rng_seed(2, 2);
    let (fba, fba_out) = add_face(&mut b, false);
    let (fapp, fapp_out) = add_face(&mut b, true);
    b.add_route(&name, fapp, 0);

    a.on_incoming_data(f0, data("/x", 1024).with_timestamp(10));
    a.advance_clock(100);
    a.on_incoming_interest(f0, interest("/x", 7));
    let probe = pop_interest(&fab_out);

    b.on_incoming_interest(fba, probe);
    let at_app = pop_interest(&fapp_out);

    // still current: lightweight acknowledgement
    let mut reply = data("/x", 1024).with_timestamp(10);
    reply.signal_flag = true;
    reply.expiration_flag = false;
    reply.node_index = at_app.node_index;
    reply.pit_list = at_app.pit_list.clone();
    b.on_incoming_data(fapp, reply);

    // transit leaves B's cache alone and keeps the signal flag up
    assert!(b.cs_lookup(&name).is_none());
    let in_transit = pop_data(&fba_out);
    assert!(in_transit.signal_flag);

    // at the originator: waiters satisfied, cache still the old copy
    a.on_incoming_data(fab, in_transit);
    assert_eq!(a.cs_lookup(&name).unwrap().origin_timestamp, 10);
    let delivered = pop_data(&f0_out);
    assert!(!delivered.signal_flag);
    assert!(!delivered.expiration_flag);
}

/// S5: the unsatisfy timer expires the entry and records its nonces.
#[test]
fn unsatisfy_timer_finalizes_and_records_nonce() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/y"), f1, 10);

    fw.on_incoming_interest(f0, interest("/y", 7));
    assert_eq!(fw.pit_len(), 1);
    assert_eq!(f1_out.borrow().len(), 1);

    fw.advance_clock(4000);

    assert_eq!(fw.pit_len(), 0);
    assert!(fw.dnl_has(&Name::from_string("/y"), 7));
    assert_eq!(fw.metrics().snapshot().pit_expirations, 1);

    // the dead nonce keeps looping copies out
    f1_out.borrow_mut().clear();
    fw.on_incoming_interest(f0, interest("/y", 7));
    assert!(f1_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().interest_loops, 1);
}

/// S6: a late duplicate during the straggler window is looped, and the
/// entry disappears when the straggler fires.
#[test]
fn late_duplicate_after_satisfy_is_looped() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f3, f3_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    fw.on_incoming_interest(f0, interest("/x", 7));
    f1_out.borrow_mut().clear();
    fw.on_incoming_data(f1, data("/x", 1024));
    assert_eq!(fw.pit_len(), 1); // held through the straggler window

    fw.advance_clock(50);
    fw.on_incoming_interest(f3, interest("/x", 7));
    assert!(f1_out.borrow().is_empty());
    assert!(f3_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().interest_loops, 1);

    fw.advance_clock(200);
    assert_eq!(fw.pit_len(), 0);
}

/// A rejected Interest (no route) is finalized by the straggler timer.
#[test]
fn reject_without_route_finalizes() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);

    fw.on_incoming_interest(f0, interest("/nowhere", 3));
    assert_eq!(fw.pit_len(), 1);
    assert_eq!(fw.metrics().snapshot().n_out_interests, 0);

    fw.advance_clock(100);
    assert_eq!(fw.pit_len(), 0);
}

/// Scope control: `/localhost` names never cross non-local faces.
#[test]
fn localhost_scope_is_enforced() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f1, _f1_out) = add_face(&mut fw, false);

    // a non-local face may not ask for /localhost names
    fw.on_incoming_interest(f1, interest("/localhost/ctl", 1));
    assert_eq!(fw.pit_len(), 0);
    assert_eq!(fw.metrics().snapshot().n_in_interests, 1);

    // and /localhost Data never leaves through a non-local face: a probe
    // reply entering on the local face and routed towards f2 stops there
    let (f2, f2_out) = add_face(&mut fw, false);
    let mut reply = data("/localhost/ctl", 4);
    reply.signal_flag = true;
    reply.node_index = 99;
    reply.pit_list = vec![f2];
    fw.on_incoming_data(f0, reply);
    assert!(f2_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().n_out_datas, 0);
}

/// A probe reply in transit with an exhausted route is dropped.
#[test]
fn probe_reply_with_empty_route_is_dropped() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f1, f1_out) = add_face(&mut fw, false);

    let mut reply = data("/x", 4);
    reply.signal_flag = true;
    reply.expiration_flag = true;
    reply.node_index = 99; // not this node
    reply.pit_list = Vec::new();
    fw.on_incoming_data(f1, reply);

    assert!(f1_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().n_out_datas, 0);
    // nothing was cached either: the transit path never ran
    assert!(fw.cs_lookup(&Name::from_string("/x")).is_none());
}

/// Unsolicited Data is cached only when it arrived on a local face.
#[test]
fn unsolicited_data_cached_only_from_local_faces() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f1, _f1_out) = add_face(&mut fw, false);

    fw.on_incoming_data(f1, data("/remote", 4));
    assert!(fw.cs_lookup(&Name::from_string("/remote")).is_none());

    fw.on_incoming_data(f0, data("/local", 4));
    assert!(fw.cs_lookup(&Name::from_string("/local")).is_some());
}

/// With validation disabled a cache hit answers directly from the CS.
#[test]
fn direct_hit_when_validation_disabled() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    fw.set_validation_enabled(false);
    let (f0, f0_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    fw.on_incoming_data(
        f0,
        Data::new(Name::from_string("/x"), vec![0u8; 16]).with_freshness_period_ms(5000),
    );

    fw.on_incoming_interest(f0, interest("/x", 7));

    let delivered = pop_data(&f0_out);
    assert_eq!(delivered.incoming_face_id, FACEID_CONTENT_STORE);
    assert!(f1_out.borrow().is_empty());
    assert_eq!(fw.metrics().snapshot().cs_hits, 1);

    // the straggler clears the entry
    fw.advance_clock(100);
    assert_eq!(fw.pit_len(), 0);
}

/// With validation disabled a stale copy cannot answer a fresh-only
/// Interest; the miss path forwards instead.
#[test]
fn stale_copy_misses_fresh_only_interest_when_validation_disabled() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    fw.set_validation_enabled(false);
    let (f0, f0_out) = add_face(&mut fw, true);
    let (f1, f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    // freshness 0: immediately stale
    fw.on_incoming_data(f0, data("/x", 16));
    fw.advance_clock(10);
    fw.on_incoming_interest(f0, interest("/x", 7));

    assert!(f0_out.borrow().is_empty());
    assert_eq!(f1_out.borrow().len(), 1);
    assert_eq!(fw.metrics().snapshot().cs_misses, 1);
}

/// Counters only ever grow.
#[test]
fn counters_are_monotonic() {
    let mut fw = Forwarder::with_rng_seed(1, 1);
    let (f0, _f0_out) = add_face(&mut fw, true);
    let (f1, _f1_out) = add_face(&mut fw, false);
    fw.add_route(&Name::from_string("/x"), f1, 10);

    let mut previous = 0u64;
    for i in 0..5 {
        fw.on_incoming_interest(f0, interest(&format!("/x/{}", i), i));
        let snapshot = fw.metrics().snapshot();
        let total = snapshot.n_in_interests
            + snapshot.n_out_interests
            + snapshot.n_in_datas
            + snapshot.n_out_datas;
        assert!(total >= previous);
        previous = total;
    }
}
