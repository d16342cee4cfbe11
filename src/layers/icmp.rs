// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Control Message Protocol, v4 (RFC 792) and v6 (RFC 4443).
//!
//! The two generations share their first four bytes (type, code, checksum)
//! but differ in what the checksum covers: ICMPv4 sums the message alone,
//! while ICMPv6 primes the sum with the IPv6 pseudo-header.

use crate::checksum::{self, PseudoHeader};
use crate::error::PacketError;
use crate::layers::ip::PROTO_ICMPV6;
use crate::layers::tcp::transport_chksum;
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::ByteSegment;
use crate::utils;

const ICMPV4_HEADER_LEN: usize = 8;
const ICMPV6_HEADER_LEN: usize = 4;

/// Common ICMPv4 message types.
pub const ICMPV4_ECHO_REPLY: u8 = 0;
pub const ICMPV4_DEST_UNREACHABLE: u8 = 3;
pub const ICMPV4_ECHO_REQUEST: u8 = 8;
pub const ICMPV4_TIME_EXCEEDED: u8 = 11;

/// Common ICMPv6 message types.
pub const ICMPV6_DEST_UNREACHABLE: u8 = 1;
pub const ICMPV6_PACKET_TOO_BIG: u8 = 2;
pub const ICMPV6_TIME_EXCEEDED: u8 = 3;
pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

/// An ICMPv4 message.
#[derive(Clone, Debug)]
pub struct Icmpv4 {
    msg_type: u8,
    code: u8,
    chksum: Option<u16>,
    // The four rest-of-header bytes: echo id/seq, the unused field of a
    // destination-unreachable, etc. Preserved verbatim.
    rest: [u8; 4],
    payload: Option<Box<dyn LayerObject>>,
}

impl Icmpv4 {
    /// An echo request with the given identifier and sequence number.
    pub fn echo_request(id: u16, seq: u16) -> Self {
        let mut rest = [0; 4];
        rest[..2].copy_from_slice(&id.to_be_bytes());
        rest[2..].copy_from_slice(&seq.to_be_bytes());
        Icmpv4 {
            msg_type: ICMPV4_ECHO_REQUEST,
            code: 0,
            chksum: None,
            rest,
            payload: None,
        }
    }

    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    #[inline]
    pub fn set_msg_type(&mut self, msg_type: u8) {
        self.msg_type = msg_type;
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.code
    }

    #[inline]
    pub fn set_code(&mut self, code: u8) {
        self.code = code;
    }

    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: u16) {
        self.chksum = Some(chksum);
    }

    /// Clears the assigned checksum so serialization recomputes it.
    #[inline]
    pub fn clear_chksum(&mut self) {
        self.chksum = None;
    }

    /// The four rest-of-header bytes.
    #[inline]
    pub fn rest_of_header(&self) -> [u8; 4] {
        self.rest
    }

    #[inline]
    pub fn set_rest_of_header(&mut self, rest: [u8; 4]) {
        self.rest = rest;
    }

    /// The echo identifier, for echo request/reply messages.
    #[inline]
    pub fn echo_id(&self) -> u16 {
        u16::from_be_bytes([self.rest[0], self.rest[1]])
    }

    /// The echo sequence number, for echo request/reply messages.
    #[inline]
    pub fn echo_seq(&self) -> u16 {
        u16::from_be_bytes([self.rest[2], self.rest[3]])
    }
}

impl LayerName for Icmpv4 {
    #[inline]
    fn name() -> &'static str {
        "Icmpv4"
    }
}

impl LayerLength for Icmpv4 {
    #[inline]
    fn len(&self) -> usize {
        ICMPV4_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Icmpv4 {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, verbose: bool) -> String {
        if verbose {
            format!(
                "type={} code={} rest={:02x?}",
                self.msg_type, self.code, self.rest
            )
        } else {
            format!("type={} code={}", self.msg_type, self.code)
        }
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        self.payload.as_deref()
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        self.payload.as_deref_mut()
    }

    #[inline]
    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool {
        payload.as_any().is::<Raw>()
    }

    #[inline]
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        self.payload = Some(payload);
    }

    #[inline]
    fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        self.payload.take()
    }
}

impl ToBytes for Icmpv4 {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.push(self.msg_type);
        bytes.push(self.code);
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.rest);
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Icmpv4>(), start)));
        }

        if self.chksum.is_none() {
            // The ICMPv4 checksum covers the message alone, no pseudo-header.
            let ck = checksum::checksum(&bytes[start..]);
            let field: &mut [u8; 2] = utils::get_mut_array(bytes, start + 2)
                .expect("ICMPv4 checksum field missing from serialized message");
            *field = ck.to_be_bytes();
        }
    }
}

impl Validate for Icmpv4 {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Icmpv4Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Icmpv4Ref::validate_payload(bytes)
    }
}

impl FromBytes for Icmpv4 {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = Icmpv4Ref::from_bytes_unchecked(bytes);
        let mut layer = Icmpv4 {
            msg_type: view.msg_type(),
            code: view.code(),
            chksum: Some(view.chksum()),
            rest: view.rest_of_header(),
            payload: None,
        };
        if bytes.len() > ICMPV4_HEADER_LEN {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                &bytes[ICMPV4_HEADER_LEN..],
            )));
        }
        layer
    }
}

/// An immutable view of an ICMPv4 message.
#[derive(Clone, Copy, Debug)]
pub struct Icmpv4Ref<'a> {
    data: ByteSegment<'a>,
}

impl<'a> Icmpv4Ref<'a> {
    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Type field")
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.data
            .read_u8(1)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Code field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Checksum field")
    }

    #[inline]
    pub fn rest_of_header(&self) -> [u8; 4] {
        self.data
            .read_array::<4>(4)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Rest of Header field")
    }

    #[inline]
    pub fn echo_id(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Echo Identifier field")
    }

    #[inline]
    pub fn echo_seq(&self) -> u16 {
        self.data
            .read_u16(6)
            .expect("insufficient bytes in Icmpv4Ref to retrieve Echo Sequence field")
    }

    /// The fixed 8-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(ICMPV4_HEADER_LEN)
            .expect("insufficient bytes in Icmpv4Ref to retrieve header")
    }

    /// The payload window after the header.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        self.header().encapsulated()
    }

    /// Whether the checksum folds to all-ones over the whole message.
    #[inline]
    pub fn chksum_valid(&self) -> bool {
        checksum::verify(self.data.as_slice())
    }
}

impl LayerName for Icmpv4Ref<'_> {
    #[inline]
    fn name() -> &'static str {
        Icmpv4::name()
    }
}

impl<'a> FromBytesRef<'a> for Icmpv4Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Icmpv4Ref {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for Icmpv4Ref<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < ICMPV4_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Icmpv4::name(),
                need: ICMPV4_HEADER_LEN,
                have: bytes.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for Icmpv4Ref<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() >= ICMPV4_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(ICMPV4_HEADER_LEN)
        } else {
            None
        }
    }
}

/// An ICMPv6 message.
#[derive(Clone, Debug)]
pub struct Icmpv6 {
    msg_type: u8,
    code: u8,
    chksum: Option<u16>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Icmpv6 {
    /// An echo request with the given identifier and sequence number.
    pub fn echo_request(id: u16, seq: u16) -> Self {
        let mut body = Vec::with_capacity(4);
        body.extend(id.to_be_bytes());
        body.extend(seq.to_be_bytes());
        Icmpv6 {
            msg_type: ICMPV6_ECHO_REQUEST,
            code: 0,
            chksum: None,
            payload: Some(Box::new(Raw::new(body))),
        }
    }

    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    #[inline]
    pub fn set_msg_type(&mut self, msg_type: u8) {
        self.msg_type = msg_type;
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.code
    }

    #[inline]
    pub fn set_code(&mut self, code: u8) {
        self.code = code;
    }

    #[inline]
    pub fn chksum(&self) -> Option<u16> {
        self.chksum
    }

    #[inline]
    pub fn set_chksum(&mut self, chksum: u16) {
        self.chksum = Some(chksum);
    }

    /// Clears the assigned checksum so serialization recomputes it from the
    /// enclosing IPv6 layer's pseudo-header.
    #[inline]
    pub fn clear_chksum(&mut self) {
        self.chksum = None;
    }
}

impl LayerName for Icmpv6 {
    #[inline]
    fn name() -> &'static str {
        "Icmpv6"
    }
}

impl LayerLength for Icmpv6 {
    #[inline]
    fn len(&self) -> usize {
        ICMPV6_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Icmpv6 {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, _verbose: bool) -> String {
        format!("type={} code={}", self.msg_type, self.code)
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        self.payload.as_deref()
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        self.payload.as_deref_mut()
    }

    #[inline]
    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool {
        payload.as_any().is::<Raw>()
    }

    #[inline]
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        self.payload = Some(payload);
    }

    #[inline]
    fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        self.payload.take()
    }
}

impl ToBytes for Icmpv6 {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.push(self.msg_type);
        bytes.push(self.code);
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Icmpv6>(), start)));
        }

        if self.chksum.is_none() {
            if let Some(ck) = transport_chksum(bytes, start, prev, PROTO_ICMPV6) {
                let field: &mut [u8; 2] = utils::get_mut_array(bytes, start + 2)
                    .expect("ICMPv6 checksum field missing from serialized message");
                *field = ck.to_be_bytes();
            }
        }
    }
}

impl Validate for Icmpv6 {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Icmpv6Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Icmpv6Ref::validate_payload(bytes)
    }
}

impl FromBytes for Icmpv6 {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = Icmpv6Ref::from_bytes_unchecked(bytes);
        let mut layer = Icmpv6 {
            msg_type: view.msg_type(),
            code: view.code(),
            chksum: Some(view.chksum()),
            payload: None,
        };
        if bytes.len() > ICMPV6_HEADER_LEN {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                &bytes[ICMPV6_HEADER_LEN..],
            )));
        }
        layer
    }
}

/// An immutable view of an ICMPv6 message.
#[derive(Clone, Copy, Debug)]
pub struct Icmpv6Ref<'a> {
    data: ByteSegment<'a>,
}

impl<'a> Icmpv6Ref<'a> {
    #[inline]
    pub fn msg_type(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Icmpv6Ref to retrieve Type field")
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.data
            .read_u8(1)
            .expect("insufficient bytes in Icmpv6Ref to retrieve Code field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in Icmpv6Ref to retrieve Checksum field")
    }

    /// The echo identifier, for echo request/reply messages.
    #[inline]
    pub fn echo_id(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in Icmpv6Ref to retrieve Echo Identifier field")
    }

    /// The echo sequence number, for echo request/reply messages.
    #[inline]
    pub fn echo_seq(&self) -> u16 {
        self.data
            .read_u16(6)
            .expect("insufficient bytes in Icmpv6Ref to retrieve Echo Sequence field")
    }

    /// The fixed 4-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(ICMPV6_HEADER_LEN)
            .expect("insufficient bytes in Icmpv6Ref to retrieve header")
    }

    /// The body window after the fixed header.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        self.header().encapsulated()
    }

    /// Whether the checksum folds to all-ones over the message primed with
    /// the IPv6 pseudo-header.
    #[inline]
    pub fn chksum_valid(&self, pseudo: &PseudoHeader) -> bool {
        pseudo.verify(self.data.as_slice())
    }
}

impl LayerName for Icmpv6Ref<'_> {
    #[inline]
    fn name() -> &'static str {
        Icmpv6::name()
    }
}

impl<'a> FromBytesRef<'a> for Icmpv6Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Icmpv6Ref {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for Icmpv6Ref<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < ICMPV6_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Icmpv6::name(),
                need: ICMPV6_HEADER_LEN,
                have: bytes.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for Icmpv6Ref<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() >= ICMPV6_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(ICMPV6_HEADER_LEN)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_checksums_itself() {
        let mut echo = Icmpv4::echo_request(0x1234, 1);
        echo.set_payload(Box::new(Raw::new(vec![0xAB; 8]))).unwrap();
        let bytes = echo.to_bytes();
        assert_eq!(bytes[0], ICMPV4_ECHO_REQUEST);
        assert!(checksum::verify(&bytes));

        let parsed = Icmpv4::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.echo_id(), 0x1234);
        assert_eq!(parsed.echo_seq(), 1);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn view_validates_checksum_in_place() {
        let echo = Icmpv4::echo_request(7, 9);
        let mut bytes = echo.to_bytes();
        assert!(Icmpv4Ref::from_bytes(&bytes).unwrap().chksum_valid());
        bytes[4] ^= 0xFF;
        assert!(!Icmpv4Ref::from_bytes(&bytes).unwrap().chksum_valid());
    }

    #[test]
    fn rejects_short_message() {
        assert!(matches!(
            Icmpv4Ref::validate(&[8, 0, 0]),
            Err(PacketError::Truncated { need: 8, have: 3, .. })
        ));
    }
}
