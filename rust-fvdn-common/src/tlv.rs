//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! This module provides the primitives used to encode and decode fvDN
//! packets, including the extension TLV types carried by the
//! freshness-validation protocol.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// NDN TLV packet types
pub const TLV_INTEREST: u8 = 0x05;
pub const TLV_DATA: u8 = 0x06;
pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;
pub const TLV_NONCE: u8 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_MUST_BE_FRESH: u8 = 0x12;
pub const TLV_CONTENT: u8 = 0x15;
pub const TLV_SIGNATURE_VALUE: u8 = 0x17;
pub const TLV_FRESHNESS_PERIOD: u8 = 0x19;
pub const TLV_KEY_LOCATOR: u8 = 0x1C;

/// Extension TLV types for the freshness-validation protocol (app range).
pub const TLV_SIGNAL_FLAG: u8 = 0x80;
pub const TLV_TIMESTAMP: u8 = 0x81;
pub const TLV_NODE_INDEX: u8 = 0x82;
pub const TLV_PIT_LIST: u8 = 0x83;
pub const TLV_EXPIRATION_FLAG: u8 = 0x84;

/// Encodes a TLV type field.
///
/// Currently only supports single-byte TLV types (0-255).
pub fn encode_tlv_type(tlv_type: u8, buf: &mut BytesMut) {
    buf.put_u8(tlv_type);
}

/// Encodes a TLV length field.
///
/// Supports variable-length encoding:
/// - If length < 253, uses 1 byte
/// - If length <= 65535, uses 3 bytes (253 + 2 bytes)
/// - If length > 65535, uses 5 bytes (254 + 4 bytes)
pub fn encode_tlv_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Decodes a TLV type field.
pub fn decode_tlv_type(buf: &mut impl Buf) -> Result<u8, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV type".into()));
    }
    Ok(buf.get_u8())
}

/// Decodes a TLV length field.
///
/// Handles variable-length encoding as per NDN spec.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV length".into()));
    }

    let first_byte = buf.get_u8();

    match first_byte {
        // Small length (< 253)
        0..=252 => Ok(first_byte as usize),

        // Medium length (16 bits)
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv(
                    "Buffer underflow when decoding 16-bit TLV length".into(),
                ));
            }
            Ok(buf.get_u16() as usize)
        }

        // Large length (32 bits)
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv(
                    "Buffer underflow when decoding 32-bit TLV length".into(),
                ));
            }
            Ok(buf.get_u32() as usize)
        }

        // 64-bit lengths are not supported in this implementation
        _ => Err(Error::Tlv("64-bit TLV lengths not supported".into())),
    }
}

/// Encodes a non-negative integer into the shortest of 1, 2, 4 or 8 bytes.
pub fn encode_nonneg_integer(value: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/// Decodes a non-negative integer from a 1, 2, 4 or 8 byte value.
pub fn decode_nonneg_integer(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]) as u64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(value);
            Ok(u64::from_be_bytes(bytes))
        }
        n => Err(Error::Tlv(format!(
            "Invalid non-negative integer length {}",
            n
        ))),
    }
}

/// A generic TLV element consisting of a type, length, and value.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Creates a new TLV element.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Creates a TLV element holding a non-negative integer value.
    pub fn nonneg_integer(tlv_type: u8, value: u64) -> Self {
        Self::new(tlv_type, encode_nonneg_integer(value))
    }

    /// Returns the value interpreted as a non-negative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }

    /// Returns the total length of this TLV element when encoded.
    pub fn len(&self) -> usize {
        let value_len = self.value.len();
        // Type (1 byte) + Length (variable) + Value
        1 + tlv_length_size(value_len) + value_len
    }

    /// Returns true if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encodes this TLV element into the provided buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_tlv_type(self.tlv_type, buf);
        encode_tlv_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decodes a TLV element from the provided buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("Buffer too small for TLV".into()));
        }

        let tlv_type = decode_tlv_type(buf)?;
        let length = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length);

        Ok(Self { tlv_type, value })
    }
}

/// Returns the number of bytes needed to encode the given length.
fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1 // 1 byte for length < 253
    } else if length <= 65535 {
        3 // 1 byte marker (253) + 2 bytes length
    } else {
        5 // 1 byte marker (254) + 4 bytes length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_round_trip() {
        let element = TlvElement::new(TLV_CONTENT, Bytes::from_static(b"abc"));
        let mut buf = BytesMut::new();
        element.encode(&mut buf);

        assert_eq!(buf.len(), 5); // 1 byte type + 1 byte length + 3 bytes value
        assert_eq!(buf[0], TLV_CONTENT);
        assert_eq!(buf[1], 3);

        let mut frozen = buf.freeze();
        let decoded = TlvElement::decode(&mut frozen).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn medium_and_large_lengths() {
        let mut buf = BytesMut::new();
        encode_tlv_length(1000, &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 253);
        let mut frozen = buf.freeze();
        assert_eq!(decode_tlv_length(&mut frozen).unwrap(), 1000);

        let mut buf = BytesMut::new();
        encode_tlv_length(100_000, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 254);
        let mut frozen = buf.freeze();
        assert_eq!(decode_tlv_length(&mut frozen).unwrap(), 100_000);
    }

    #[test]
    fn nonneg_integer_widths() {
        for (value, width) in [(0u64, 1), (255, 1), (256, 2), (70_000, 4), (u64::MAX, 8)] {
            let encoded = encode_nonneg_integer(value);
            assert_eq!(encoded.len(), width);
            assert_eq!(decode_nonneg_integer(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut buf = BytesMut::new();
        encode_tlv_type(TLV_NAME, &mut buf);
        encode_tlv_length(10, &mut buf);
        buf.extend_from_slice(b"abc"); // claims 10, carries 3
        let mut frozen = buf.freeze();
        assert!(TlvElement::decode(&mut frozen).is_err());
    }
}
