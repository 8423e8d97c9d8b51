//! Forwarding core for the freshness-validated Data-Centric Networking
//! (fvDN) node.
//!
//! This crate implements the Interest/Data forwarding pipelines, the
//! Pending Interest Table, Content Store, FIB and Dead Nonce List, the
//! per-entry timers, and the validation-probe protocol that turns a cache
//! hit into a freshness query against the origin producer. The core is
//! single-threaded and event-driven: the host delivers packets and advances
//! the virtual clock, and the forwarder runs each pipeline stage to
//! completion.

pub mod cs;
pub mod dead_nonce_list;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod name_tree;
pub mod pit;
pub mod producer;
pub mod scheduler;
pub mod strategy;

pub use cs::{Cs, CsEntry};
pub use dead_nonce_list::DeadNonceList;
pub use face::{Face, FaceTable, NullTransport, Packet, QueueTransport, Transport};
pub use fib::{Fib, FibEntry, NextHop};
pub use forwarder::Forwarder;
pub use name_tree::{NameTree, NodeId};
pub use pit::{InRecord, OutRecord, Pit, PitEntry, PitEntryId};
pub use producer::{ContentTimestampEntry, Producer, ProducerConfig};
pub use scheduler::{EventScheduler, TimerHandle};
pub use strategy::{
    BestRouteStrategy, ForwardingDecision, MulticastStrategy, Strategy, StrategyChoice,
    UpstreamChoice,
};
