// SPDX-License-Identifier: MIT OR Apache-2.0

//! The User Datagram Protocol (UDP).

use crate::checksum::{self, PseudoHeader};
use crate::error::PacketError;
use crate::layers::ip::PROTO_UDP;
use crate::layers::tcp::transport_chksum;
use crate::layers::traits::*;
use crate::layers::{Raw, RawRef};
use crate::segment::{ByteSegment, ByteSegmentMut};

const UDP_HEADER_LEN: usize = 8;

/// A UDP datagram (RFC 768).
#[derive(Clone, Debug)]
pub struct Udp {
    sport: u16,
    dport: u16,
    chksum: Option<u16>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Udp {
    /// A datagram with the given ports and an empty payload.
    pub fn new(sport: u16, dport: u16) -> Self {
        Udp {
            sport,
            dport,
            chksum: None,
            payload: None,
        }
    }

    #[inline]
    pub fn sport(&self) -> u16 {
        self.sport
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) {
        self.sport = sport;
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.dport
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) {
        self.dport = dport;
    }

    /// The assigned checksum, or `None` if it is to be computed at
    /// serialization time. A computed checksum of zero is transmitted as
    /// `0xFFFF`, zero meaning "no checksum" on the wire.
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
}

impl LayerName for Udp {
    #[inline]
    fn name() -> &'static str {
        "Udp"
    }
}

impl LayerLength for Udp {
    #[inline]
    fn len(&self) -> usize {
        UDP_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Udp {
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
                "sport={} dport={} len={}",
                self.sport,
                self.dport,
                self.len()
            )
        } else {
            format!("sport={} dport={}", self.sport, self.dport)
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
    fn can_set_payload(&self, _payload: &dyn LayerObject) -> bool {
        true
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

impl ToBytes for Udp {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        let len = u16::try_from(self.len()).unwrap_or(u16::MAX);
        bytes.extend(self.sport.to_be_bytes());
        bytes.extend(self.dport.to_be_bytes());
        bytes.extend(len.to_be_bytes());
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Udp>(), start)));
        }

        if self.chksum.is_none() {
            if let Some(ck) = transport_chksum(bytes, start, prev, PROTO_UDP) {
                let ck = if ck == 0 { 0xFFFF } else { ck };
                bytes[start + 6..start + 8].copy_from_slice(&ck.to_be_bytes());
            }
        }
    }
}

impl Validate for Udp {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        UdpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        UdpRef::validate_payload(bytes)
    }
}

impl FromBytes for Udp {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = UdpRef::from_bytes_unchecked(bytes);
        let payload_segment = view.payload_segment();
        let mut layer = Udp {
            sport: view.sport(),
            dport: view.dport(),
            chksum: Some(view.chksum()),
            payload: None,
        };
        if !payload_segment.is_empty() {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                payload_segment.as_slice(),
            )));
        }
        layer
    }
}

/// An immutable view of a UDP datagram.
#[derive(Clone, Copy, Debug)]
pub struct UdpRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> UdpRef<'a> {
    #[inline]
    pub fn sport(&self) -> u16 {
        self.data
            .read_u16(0)
            .expect("insufficient bytes in UdpRef to retrieve Source Port field")
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in UdpRef to retrieve Destination Port field")
    }

    /// The declared length of the datagram, header included.
    #[inline]
    pub fn packet_length(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in UdpRef to retrieve Length field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(6)
            .expect("insufficient bytes in UdpRef to retrieve Checksum field")
    }

    /// The fixed 8-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(UDP_HEADER_LEN)
            .expect("insufficient bytes in UdpRef to retrieve header")
    }

    /// The whole datagram window, clipped to the declared length. Bytes
    /// past the length field (frame padding from an outer layer) fall
    /// outside it.
    #[inline]
    pub fn datagram(&self) -> ByteSegment<'a> {
        let declared = (self.packet_length() as usize).min(self.data.len());
        self.data
            .clipped(declared)
            .expect("insufficient bytes in UdpRef to retrieve datagram")
    }

    /// The payload window between the header and the end of the declared
    /// length. The length field is the source of truth: trailing bytes
    /// beyond it are not part of the payload.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        let declared = (self.packet_length() as usize).min(self.data.len());
        self.data
            .slice(UDP_HEADER_LEN, declared.saturating_sub(UDP_HEADER_LEN))
            .expect("insufficient bytes in UdpRef to retrieve payload")
    }

    /// Whether the checksum folds to all-ones over the declared datagram
    /// primed with `pseudo`. A wire checksum of zero means the sender
    /// computed none, which validates trivially.
    #[inline]
    pub fn chksum_valid(&self, pseudo: &PseudoHeader) -> bool {
        if self.chksum() == 0 {
            return true;
        }
        pseudo.verify(self.datagram().as_slice())
    }
}

impl LayerName for UdpRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Udp::name()
    }
}

impl<'a> FromBytesRef<'a> for UdpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        UdpRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for UdpRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < UDP_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Udp::name(),
                need: UDP_HEADER_LEN,
                have: bytes.len(),
            });
        }

        let length = u16::from_be_bytes(bytes[4..6].try_into().unwrap()) as usize;
        if length < UDP_HEADER_LEN {
            return Err(PacketError::Malformed {
                layer: Udp::name(),
                detail: "UDP length field smaller than the header",
            });
        }
        if length > bytes.len() {
            return Err(PacketError::Truncated {
                layer: Udp::name(),
                need: length,
                have: bytes.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        // The layer after UDP is Raw unless a caller-side dispatcher says
        // otherwise, and Raw has no constraints.
        RawRef::validate(&bytes[UDP_HEADER_LEN.min(bytes.len())..])
    }
}

impl LayerOffset for UdpRef<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() >= UDP_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(UDP_HEADER_LEN)
        } else {
            None
        }
    }
}

/// An in-place mutator over a UDP header.
#[derive(Debug)]
pub struct UdpMut<'a> {
    data: ByteSegmentMut<'a>,
}

impl<'a> UdpMut<'a> {
    #[inline]
    pub fn sport(&self) -> u16 {
        self.data
            .read_u16(0)
            .expect("insufficient bytes in UdpMut to retrieve Source Port field")
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) {
        self.data
            .write_u16(0, sport)
            .expect("insufficient bytes in UdpMut to set Source Port field");
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in UdpMut to retrieve Destination Port field")
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) {
        self.data
            .write_u16(2, dport)
            .expect("insufficient bytes in UdpMut to set Destination Port field");
    }

    #[inline]
    pub fn packet_length(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in UdpMut to retrieve Length field")
    }

    #[inline]
    pub fn set_packet_length(&mut self, len: u16) {
        self.data
            .write_u16(4, len)
            .expect("insufficient bytes in UdpMut to set Length field");
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(6)
            .expect("insufficient bytes in UdpMut to retrieve Checksum field")
    }

    /// Assigns the checksum field. Mutate fields first, then recompute:
    /// `set_chksum(compute_chksum(&pseudo))`.
    #[inline]
    pub fn set_chksum(&mut self, chksum: u16) {
        self.data
            .write_u16(6, chksum)
            .expect("insufficient bytes in UdpMut to set Checksum field");
    }

    /// The checksum the declared datagram bytes call for under `pseudo`,
    /// computed with the checksum field taken as zero and the RFC 768 zero
    /// rule applied.
    pub fn compute_chksum(&self, pseudo: &PseudoHeader) -> u16 {
        let declared = (self.packet_length() as usize).min(self.data.len());
        let bytes = &self.data.as_slice()[..declared];
        let mut sum = pseudo.sum();
        sum = checksum::ones_complement_add(sum, checksum::ones_complement_sum(&bytes[..6]));
        sum = checksum::ones_complement_add(sum, checksum::ones_complement_sum(&bytes[8..]));
        match !sum {
            0 => 0xFFFF,
            ck => ck,
        }
    }

    /// Reborrows as an immutable view.
    #[inline]
    pub fn as_ref(&self) -> UdpRef<'_> {
        UdpRef {
            data: self.data.as_segment(),
        }
    }
}

impl LayerName for UdpMut<'_> {
    #[inline]
    fn name() -> &'static str {
        Udp::name()
    }
}

impl Validate for UdpMut<'_> {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        UdpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        UdpRef::validate_payload(bytes)
    }
}

impl<'a> FromBytesMut<'a> for UdpMut<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self {
        UdpMut {
            data: ByteSegmentMut::new(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_udp() -> Vec<u8> {
        vec![
            0x00, 0x35, 0xC0, 0x01, // ports 53 -> 49153
            0x00, 0x0C, 0x00, 0x00, // length 12, checksum 0
            0xDE, 0xAD, 0xBE, 0xEF,
        ]
    }

    #[test]
    fn parses_and_round_trips() {
        let bytes = sample_udp();
        let udp = Udp::from_bytes(&bytes).unwrap();
        assert_eq!(udp.sport(), 53);
        assert_eq!(udp.dport(), 49153);
        assert_eq!(udp.len(), 12);
        assert_eq!(udp.to_bytes(), bytes);
    }

    #[test]
    fn rejects_length_beyond_buffer() {
        let mut bytes = sample_udp();
        bytes[4..6].copy_from_slice(&64u16.to_be_bytes());
        assert!(matches!(
            UdpRef::validate(&bytes),
            Err(PacketError::Truncated { need: 64, have: 12, .. })
        ));
    }

    #[test]
    fn bytes_past_declared_length_are_clipped() {
        let mut bytes = sample_udp();
        bytes.extend([0u8; 6]); // frame padding from an outer layer

        let view = UdpRef::from_bytes(&bytes).unwrap();
        assert_eq!(view.datagram().len(), 12);
        assert_eq!(view.payload_segment().as_slice(), &[0xDE, 0xAD, 0xBE, 0xEF]);

        // The decoded payload honors the length field, so serialization
        // reproduces the declared datagram, padding excluded.
        let udp = Udp::from_bytes(&bytes).unwrap();
        assert_eq!(udp.len(), 12);
        assert_eq!(udp.to_bytes(), &bytes[..12]);
    }

    #[test]
    fn mut_checksum_recompute_is_idempotent() {
        let mut bytes = sample_udp();
        let pseudo = PseudoHeader::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: PROTO_UDP,
            len: bytes.len() as u16,
        };
        let mut udp = UdpMut::from_bytes(&mut bytes).unwrap();
        let first = udp.compute_chksum(&pseudo);
        udp.set_chksum(first);
        assert!(udp.as_ref().chksum_valid(&pseudo));
        let second = udp.compute_chksum(&pseudo);
        assert_eq!(first, second);
    }
}
