//! Line-topology simulation host.
//!
//! Builds a chain of forwarders with a consumer app on the first node and
//! the producer app on the last, wires the links with queue faces, and
//! runs a millisecond-stepped virtual clock. The host serializes every
//! call into each forwarder, drains the face outboxes, and delivers
//! packets across links after the configured delay.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_fvdn_common::metrics::{Histogram, MetricsSnapshot};
use rust_fvdn_common::ndn::{Interest, Name, NameComponent};
use rust_fvdn_common::types::FaceId;
use rust_fvdn_fwd::{Forwarder, Packet, Producer, ProducerConfig, QueueTransport};
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;

type Outbox = Rc<RefCell<VecDeque<Packet>>>;

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Number of forwarders in the chain, consumer edge first.
    pub nodes: usize,
    pub experiment_time_s: u64,
    pub interest_interval_ms: u64,
    pub link_delay_ms: u64,
    /// Number of distinct content names requested under the prefix.
    pub distinct_contents: u32,
    /// Probe protocol on cache hits; off means classic direct hits.
    pub validation: bool,
    pub seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            nodes: 3,
            experiment_time_s: 20,
            interest_interval_ms: 500,
            link_delay_ms: 10,
            distinct_contents: 8,
            validation: true,
            seed: 1,
        }
    }
}

#[derive(Debug)]
pub struct SimReport {
    pub node_metrics: Vec<MetricsSnapshot>,
    pub interests_sent: u64,
    pub datas_received: u64,
    pub mean_rtt_ms: f64,
    pub producer_store_len: usize,
}

struct Link {
    outbox: Outbox,
    peer_node: usize,
    peer_face: FaceId,
}

/// Runs the simulation to completion and reports the counters.
pub fn run(options: &SimOptions, producer_config: ProducerConfig) -> SimReport {
    assert!(options.nodes >= 2, "a chain needs at least two nodes");

    let prefix = Name::from_string(&producer_config.prefix);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut producer = Producer::with_seed(producer_config, options.seed.wrapping_add(1));

    // forwarders; node indices start at 1 so no probe originator is 0
    let mut nodes: Vec<Forwarder> = (0..options.nodes)
        .map(|i| {
            let mut forwarder =
                Forwarder::with_rng_seed(i as u32 + 1, options.seed.wrapping_add(i as u64));
            forwarder.set_validation_enabled(options.validation);
            forwarder
        })
        .collect();

    // consumer and producer app faces
    let (consumer_transport, consumer_outbox) = QueueTransport::new();
    let consumer_face = nodes[0].add_face(true, Box::new(consumer_transport));
    let last = options.nodes - 1;
    let (producer_transport, producer_outbox) = QueueTransport::new();
    let producer_face = nodes[last].add_face(true, Box::new(producer_transport));

    // links of the chain, one face pair per hop
    let mut links: Vec<Link> = Vec::new();
    for i in 0..last {
        let (right_transport, right_outbox) = QueueTransport::new();
        let right_face = nodes[i].add_face(false, Box::new(right_transport));
        let (left_transport, left_outbox) = QueueTransport::new();
        let left_face = nodes[i + 1].add_face(false, Box::new(left_transport));

        links.push(Link {
            outbox: right_outbox,
            peer_node: i + 1,
            peer_face: left_face,
        });
        links.push(Link {
            outbox: left_outbox,
            peer_node: i,
            peer_face: right_face,
        });

        nodes[i].add_route(&prefix, right_face, 10);
    }
    nodes[last].add_route(&prefix, producer_face, 0);

    // in-flight packets keyed by delivery time
    let mut flight_heap: BinaryHeap<Reverse<(u64, u64)>> = BinaryHeap::new();
    let mut in_flight: HashMap<u64, (usize, FaceId, Packet)> = HashMap::new();
    let mut flight_seq: u64 = 0;

    let rtt = Histogram::exponential(1, 60_000, 16);
    let mut outstanding: HashMap<Name, u64> = HashMap::new();
    let mut interests_sent: u64 = 0;
    let mut datas_received: u64 = 0;

    let end_ms = options.experiment_time_s * 1000;
    for now_ms in 0..=end_ms {
        for node in nodes.iter_mut() {
            node.advance_clock(now_ms);
        }

        // coarse once-per-second producer update tick
        if now_ms % 1000 == 0 {
            producer.tick(now_ms / 1000);
        }

        // consumer request generation
        if now_ms % options.interest_interval_ms == 0 && now_ms < end_ms {
            let mut name = prefix.clone();
            name.push(NameComponent::from_number(
                rng.gen_range(0..options.distinct_contents) as u64,
            ));
            let interest = Interest::new(name.clone())
                .with_nonce(rng.gen())
                .with_must_be_fresh(true);
            debug!("consumer requests {}", name);
            outstanding.insert(name, now_ms);
            interests_sent += 1;
            nodes[0].on_incoming_interest(consumer_face, interest);
        }

        // deliver, drain, repeat until this instant settles
        loop {
            let mut progressed = false;

            while let Some(&Reverse((due_ms, seq))) = flight_heap.peek() {
                if due_ms > now_ms {
                    break;
                }
                flight_heap.pop();
                let Some((node, face, packet)) = in_flight.remove(&seq) else {
                    continue;
                };
                progressed = true;
                match packet {
                    Packet::Interest(interest) => nodes[node].on_incoming_interest(face, interest),
                    Packet::Data(data) => nodes[node].on_incoming_data(face, data),
                }
            }

            for link in &links {
                loop {
                    let Some(packet) = link.outbox.borrow_mut().pop_front() else {
                        break;
                    };
                    progressed = true;
                    flight_heap.push(Reverse((now_ms + options.link_delay_ms, flight_seq)));
                    in_flight.insert(flight_seq, (link.peer_node, link.peer_face, packet));
                    flight_seq += 1;
                }
            }

            // the producer app answers immediately on its local face
            loop {
                let Some(packet) = producer_outbox.borrow_mut().pop_front() else {
                    break;
                };
                progressed = true;
                if let Packet::Interest(interest) = packet {
                    let reply = producer.on_interest(&interest, now_ms / 1000);
                    nodes[last].on_incoming_data(producer_face, reply);
                }
            }

            // the consumer app records satisfaction round trips
            loop {
                let Some(packet) = consumer_outbox.borrow_mut().pop_front() else {
                    break;
                };
                progressed = true;
                if let Packet::Data(data) = packet {
                    datas_received += 1;
                    if let Some(sent_ms) = outstanding.remove(&data.name) {
                        rtt.observe((now_ms - sent_ms).max(1));
                    }
                }
            }

            if !progressed {
                break;
            }
        }
    }

    info!(
        "simulation finished: {} interests, {} datas, mean rtt {:.1} ms",
        interests_sent,
        datas_received,
        rtt.average()
    );

    SimReport {
        node_metrics: nodes.iter().map(|n| n.metrics().snapshot()).collect(),
        interests_sent,
        datas_received,
        mean_rtt_ms: rtt.average(),
        producer_store_len: producer.store_len(),
    }
}
