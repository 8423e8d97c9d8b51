//! NDN packet types and structures.
//!
//! This module provides the core data structures that represent fvDN
//! packets: hierarchical names, Interests and Data. Both packet types carry
//! the freshness-validation annotation fields (`signal_flag`, `timestamp`,
//! `node_index`, `pit_list` and, on Data, `expiration_flag`) in addition to
//! the base NDN fields.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use crate::types::{FaceId, NodeIndex, INVALID_FACEID};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Interest lifetime in milliseconds.
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

/* ---------------------------------------------------------------- *\
 * Name and NameComponent
\* ---------------------------------------------------------------- */

/// One label of a hierarchical name.
///
/// Components are opaque byte strings. The URI rendering percent-encodes
/// every byte outside printable ASCII (plus the `%` and `/` delimiters),
/// so numeric labels and binary labels print unambiguously in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Label holding a decimal number, e.g. a content or segment index.
    pub fn from_number(value: u64) -> Self {
        Self(value.to_string().into_bytes().into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        match element.tlv_type {
            tlv::TLV_COMPONENT => Ok(Self(element.value.clone())),
            other => Err(Error::NdnPacket(format!(
                "Expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                other
            ))),
        }
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_graphic() && b != b'%' && b != b'/' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// Hierarchical content name: an ordered sequence of components, with the
/// prefix queries the PIT, FIB and CS indexes are built on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

/// Leading label of the node-local scope.
const LOCALHOST_LABEL: &[u8] = b"localhost";

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a URI-style name. A leading `ndn:` scheme and empty labels
    /// are ignored, so `ndn:/a//b/` and `/a/b` read the same name.
    pub fn from_string(uri: &str) -> Self {
        let path = uri.strip_prefix("ndn:").unwrap_or(uri);
        Self {
            components: path
                .split('/')
                .filter(|label| !label.is_empty())
                .map(|label| NameComponent::new(label.as_bytes().to_vec()))
                .collect(),
        }
    }

    pub fn push(&mut self, component: NameComponent) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// True for names under the node-local `/localhost` scope, which must
    /// never cross a non-local face.
    pub fn is_under_localhost(&self) -> bool {
        self.components
            .first()
            .map(|c| c.as_bytes() == LOCALHOST_LABEL)
            .unwrap_or(false)
    }

    /// The first `len` components as a new name.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    /// True when every component of `self` matches the corresponding
    /// component of `other`; an empty name is a prefix of every name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut value = element.value.clone();
        let mut components = Vec::new();
        while value.has_remaining() {
            let inner = TlvElement::decode(&mut value)?;
            components.push(NameComponent::from_tlv(&inner)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

/* ---------------------------------------------------------------- *\
 * pitList wire helpers
\* ---------------------------------------------------------------- */

/// Renders a pit list as the space-separated decimal string carried on the
/// wire. Order is preserved: the last element is the next return hop.
fn encode_pit_list(pit_list: &[FaceId]) -> String {
    pit_list
        .iter()
        .map(|f| f.0.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_pit_list(value: &[u8]) -> Result<Vec<FaceId>, Error> {
    let text = std::str::from_utf8(value)
        .map_err(|_| Error::NdnPacket("pitList is not valid UTF-8".into()))?;
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<u32>()
                .map(FaceId)
                .map_err(|_| Error::NdnPacket(format!("Invalid face id '{}' in pitList", tok)))
        })
        .collect()
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime_ms: u32,
    pub must_be_fresh: bool,

    /// Stamped by the forwarder at entry; not part of the wire format.
    pub incoming_face_id: FaceId,

    /// 1 on the wire when this Interest is a validation probe.
    pub signal_flag: bool,
    /// Cached-copy origin timestamp carried by a probe, in seconds.
    pub timestamp: u64,
    /// Node id of the probe originator.
    pub node_index: NodeIndex,
    /// Source-route trace accumulated on the probe's forward path.
    pub pit_list: Vec<FaceId>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: 0,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            must_be_fresh: false,
            incoming_face_id: INVALID_FACEID,
            signal_flag: false,
            timestamp: 0,
            node_index: 0,
            pit_list: Vec::new(),
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
    pub fn with_lifetime_ms(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Encodes this Interest into its wire format.
    pub fn to_wire(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);

        let mut nonce = BytesMut::with_capacity(4);
        nonce.put_u32(self.nonce);
        TlvElement::new(tlv::TLV_NONCE, nonce.freeze()).encode(&mut inner);

        TlvElement::nonneg_integer(tlv::TLV_INTEREST_LIFETIME, self.lifetime_ms as u64)
            .encode(&mut inner);
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut inner);
        }
        if self.signal_flag {
            TlvElement::nonneg_integer(tlv::TLV_SIGNAL_FLAG, 1).encode(&mut inner);
        }
        if self.timestamp != 0 {
            TlvElement::nonneg_integer(tlv::TLV_TIMESTAMP, self.timestamp).encode(&mut inner);
        }
        if self.node_index != 0 {
            TlvElement::nonneg_integer(tlv::TLV_NODE_INDEX, self.node_index as u64)
                .encode(&mut inner);
        }
        if !self.pit_list.is_empty() {
            TlvElement::new(tlv::TLV_PIT_LIST, encode_pit_list(&self.pit_list).into_bytes())
                .encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes an Interest from its wire format.
    pub fn from_wire(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::NdnPacket(format!(
                "Expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut interest = Interest::new(Name::new());
        let mut inner = outer.value.clone();
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_NONCE => {
                    if element.value.len() != 4 {
                        return Err(Error::NdnPacket("Nonce must be 4 bytes".into()));
                    }
                    interest.nonce = u32::from_be_bytes([
                        element.value[0],
                        element.value[1],
                        element.value[2],
                        element.value[3],
                    ]);
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime_ms = element.as_nonneg_integer()? as u32;
                }
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_SIGNAL_FLAG => interest.signal_flag = element.as_nonneg_integer()? == 1,
                tlv::TLV_TIMESTAMP => interest.timestamp = element.as_nonneg_integer()?,
                tlv::TLV_NODE_INDEX => {
                    interest.node_index = element.as_nonneg_integer()? as NodeIndex;
                }
                tlv::TLV_PIT_LIST => interest.pit_list = decode_pit_list(&element.value)?,
                // Unrecognized non-critical TLVs are skipped
                _ => {}
            }
        }

        interest.name =
            name.ok_or_else(|| Error::NdnPacket("Interest is missing a Name".into()))?;
        Ok(interest)
    }
}

/* ---------------------------------------------------------------- *\
 * Data
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub content: Bytes,
    /// Producer-declared freshness period in milliseconds; `None` when the
    /// producer declared no freshness at all.
    pub freshness_period_ms: Option<u64>,
    /// Fake signature value; 0 is "valid", other values application-defined.
    pub signature_value: u32,
    pub key_locator: Option<Name>,

    /// Stamped by the forwarder at entry; not part of the wire format.
    pub incoming_face_id: FaceId,

    /// 1 on the wire when this Data is a validation-probe reply.
    pub signal_flag: bool,
    /// Reply-only: 1 = cached copy stale, body is fresh; 0 = copy valid.
    pub expiration_flag: bool,
    /// Origin's current content timestamp, in seconds.
    pub timestamp: u64,
    /// Node id of the probe originator, mirrored from the probe Interest.
    pub node_index: NodeIndex,
    /// Source-route trace mirrored from the probe, consumed on the return
    /// path: the last element is the next hop.
    pub pit_list: Vec<FaceId>,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_period_ms: None,
            signature_value: 0,
            key_locator: None,
            incoming_face_id: INVALID_FACEID,
            signal_flag: false,
            expiration_flag: false,
            timestamp: 0,
            node_index: 0,
            pit_list: Vec::new(),
        }
    }

    pub fn with_freshness_period_ms(mut self, freshness_period_ms: u64) -> Self {
        self.freshness_period_ms = Some(freshness_period_ms);
        self
    }
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Encodes this Data into its wire format.
    pub fn to_wire(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);
        if let Some(freshness) = self.freshness_period_ms {
            TlvElement::nonneg_integer(tlv::TLV_FRESHNESS_PERIOD, freshness).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut inner);
        TlvElement::nonneg_integer(tlv::TLV_SIGNATURE_VALUE, self.signature_value as u64)
            .encode(&mut inner);
        if let Some(key_locator) = &self.key_locator {
            let mut nested = BytesMut::new();
            key_locator.to_tlv().encode(&mut nested);
            TlvElement::new(tlv::TLV_KEY_LOCATOR, nested.freeze()).encode(&mut inner);
        }
        if self.signal_flag {
            TlvElement::nonneg_integer(tlv::TLV_SIGNAL_FLAG, 1).encode(&mut inner);
        }
        if self.expiration_flag {
            TlvElement::nonneg_integer(tlv::TLV_EXPIRATION_FLAG, 1).encode(&mut inner);
        }
        if self.timestamp != 0 {
            TlvElement::nonneg_integer(tlv::TLV_TIMESTAMP, self.timestamp).encode(&mut inner);
        }
        if self.node_index != 0 {
            TlvElement::nonneg_integer(tlv::TLV_NODE_INDEX, self.node_index as u64)
                .encode(&mut inner);
        }
        if !self.pit_list.is_empty() {
            TlvElement::new(tlv::TLV_PIT_LIST, encode_pit_list(&self.pit_list).into_bytes())
                .encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a Data from its wire format.
    pub fn from_wire(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "Expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut data = Data::new(Name::new(), Bytes::new());
        let mut inner = outer.value.clone();
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_FRESHNESS_PERIOD => {
                    data.freshness_period_ms = Some(element.as_nonneg_integer()?);
                }
                tlv::TLV_CONTENT => data.content = element.value.clone(),
                tlv::TLV_SIGNATURE_VALUE => {
                    data.signature_value = element.as_nonneg_integer()? as u32;
                }
                tlv::TLV_KEY_LOCATOR => {
                    let mut nested = element.value.clone();
                    let name_element = TlvElement::decode(&mut nested)?;
                    data.key_locator = Some(Name::from_tlv(&name_element)?);
                }
                tlv::TLV_SIGNAL_FLAG => data.signal_flag = element.as_nonneg_integer()? == 1,
                tlv::TLV_EXPIRATION_FLAG => {
                    data.expiration_flag = element.as_nonneg_integer()? == 1;
                }
                tlv::TLV_TIMESTAMP => data.timestamp = element.as_nonneg_integer()?,
                tlv::TLV_NODE_INDEX => data.node_index = element.as_nonneg_integer()? as NodeIndex,
                tlv::TLV_PIT_LIST => data.pit_list = decode_pit_list(&element.value)?,
                _ => {}
            }
        }

        data.name = name.ok_or_else(|| Error::NdnPacket("Data is missing a Name".into()))?;
        Ok(data)
    }
}
