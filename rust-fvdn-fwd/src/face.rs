//! Faces and the face table.
//!
//! A face is the forwarder's seam to one neighbor: an application on the
//! local node or a link towards another node. The byte transport behind a
//! face is out of scope here; the [`Transport`] trait is the boundary, and
//! the queue transport lets a single-threaded host drain what the forwarder
//! sent and deliver it wherever the topology says.

use log::trace;
use rust_fvdn_common::ndn::{Data, Interest};
use rust_fvdn_common::types::{FaceId, FACEID_RESERVED_MAX};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::rc::Rc;

/// A packet handed to a transport.
#[derive(Debug, Clone)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

/// Outbound half of a face.
pub trait Transport {
    fn send_interest(&mut self, interest: &Interest);
    fn send_data(&mut self, data: &Data);
}

/// Transport that appends every packet to a queue shared with the host.
pub struct QueueTransport {
    outbox: Rc<RefCell<VecDeque<Packet>>>,
}

impl QueueTransport {
    /// Returns the transport and the host's handle on its outbox.
    pub fn new() -> (Self, Rc<RefCell<VecDeque<Packet>>>) {
        let outbox = Rc::new(RefCell::new(VecDeque::new()));
        (
            Self {
                outbox: Rc::clone(&outbox),
            },
            outbox,
        )
    }
}

impl Transport for QueueTransport {
    fn send_interest(&mut self, interest: &Interest) {
        self.outbox
            .borrow_mut()
            .push_back(Packet::Interest(interest.clone()));
    }

    fn send_data(&mut self, data: &Data) {
        self.outbox.borrow_mut().push_back(Packet::Data(data.clone()));
    }
}

/// Transport that drops everything, used behind reserved pseudo-faces.
pub struct NullTransport;

impl Transport for NullTransport {
    fn send_interest(&mut self, _interest: &Interest) {}
    fn send_data(&mut self, _data: &Data) {}
}

/// A registered face.
pub struct Face {
    id: FaceId,
    local: bool,
    transport: Box<dyn Transport>,
}

impl Face {
    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn send_interest(&mut self, interest: &Interest) {
        trace!("face {} tx Interest {}", self.id, interest.name);
        self.transport.send_interest(interest);
    }

    pub fn send_data(&mut self, data: &Data) {
        trace!("face {} tx Data {}", self.id, data.name);
        self.transport.send_data(data);
    }
}

/// Registry of faces by id; the sole allocator of face ids.
pub struct FaceTable {
    faces: BTreeMap<FaceId, Face>,
    next_id: u32,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: BTreeMap::new(),
            next_id: FACEID_RESERVED_MAX.0 + 1,
        }
    }

    /// Registers a face and allocates its id above the reserved range.
    pub fn add(&mut self, local: bool, transport: Box<dyn Transport>) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        self.faces.insert(
            id,
            Face {
                id,
                local,
                transport,
            },
        );
        id
    }

    /// Registers a face under a reserved id, e.g. the content-store
    /// pseudo-face. Replaces any previous face at that id.
    pub fn add_reserved(&mut self, id: FaceId, local: bool, transport: Box<dyn Transport>) {
        debug_assert!(id.is_reserved());
        self.faces.insert(
            id,
            Face {
                id,
                local,
                transport,
            },
        );
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(&id)
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}
