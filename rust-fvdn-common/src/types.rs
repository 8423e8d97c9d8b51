//! Identifiers and constants shared across the forwarder tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u32);

/// Sentinel id of a face that does not exist.
pub const INVALID_FACEID: FaceId = FaceId(0);

/// Pseudo-face stamped on Data served out of the local content store.
pub const FACEID_CONTENT_STORE: FaceId = FaceId(254);

/// Highest reserved face id; regular face allocation starts above this.
pub const FACEID_RESERVED_MAX: FaceId = FaceId(255);

impl FaceId {
    /// Whether this id lies in the reserved range (including the invalid id).
    pub fn is_reserved(self) -> bool {
        self.0 <= FACEID_RESERVED_MAX.0
    }
}

impl fmt::Display for FaceId {
    // Bare decimal: this is also the representation used inside the
    // space-separated pitList wire field.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node identifier stamped into probe packets by the originating forwarder.
pub type NodeIndex = u32;

/// Maximum number of components in an NDN name.
pub const MAX_NAME_COMPONENTS: usize = 32;

/// Maximum size of an NDN packet.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Default number of entries the content store retains before evicting.
pub const DEFAULT_CS_CAPACITY: usize = 4096;
