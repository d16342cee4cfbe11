// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Protocol layers: IPv4, IPv6 and the IPv6 extension headers.

use crate::checksum::{self, PseudoHeader};
use crate::error::PacketError;
use crate::layers::icmp::{Icmpv4, Icmpv6, Icmpv4Ref, Icmpv6Ref};
use crate::layers::igmp::{Igmpv2, Igmpv2Ref};
use crate::layers::tcp::{Tcp, TcpRef};
use crate::layers::udp::{Udp, UdpRef};
use crate::layers::{Raw, RawRef};
use crate::layers::traits::*;
use crate::segment::{ByteSegment, ByteSegmentMut};
use crate::utils;

use bitflags::bitflags;
use std::net::{Ipv4Addr, Ipv6Addr};

/// IP protocol / next-header numbers the dispatch tables recognize.
pub const PROTO_ICMP: u8 = 1;
pub const PROTO_IGMP: u8 = 2;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_IPV6: u8 = 41;
pub const PROTO_ICMPV6: u8 = 58;

/// IPv6 extension header numbers. Each consumes its own sub-segment and
/// recurses on the next-header it carries.
pub const EXT_HOP_BY_HOP: u8 = 0;
pub const EXT_ROUTING: u8 = 43;
pub const EXT_FRAGMENT: u8 = 44;
pub const EXT_DEST_OPTS: u8 = 60;

const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;

/// Explicit Congestion Notification codepoint (RFC 3168), the low two bits
/// of the former ToS byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Ecn {
    NotEct = 0,
    Ect1 = 1,
    Ect0 = 2,
    Ce = 3,
}

impl From<u8> for Ecn {
    /// Uses the least significant two bits of `value`.
    #[inline]
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Ecn::NotEct,
            1 => Ecn::Ect1,
            2 => Ecn::Ect0,
            _ => Ecn::Ce,
        }
    }
}

bitflags! {
    /// The three-bit IPv4 flags field.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Ipv4Flags: u8 {
        const RESERVED = 0b100;
        const DONT_FRAGMENT = 0b010;
        const MORE_FRAGMENTS = 0b001;
    }
}

/// The IPv4 options region, preserved verbatim (padding included) so an
/// unmodified parse serializes back byte-for-byte. The region's structure is
/// checked during validation; its contents are not interpreted further.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ipv4Options {
    bytes: Vec<u8>,
}

impl Ipv4Options {
    /// Wraps an options region. The length must be a multiple of 4 so the
    /// IHL stays representable.
    pub fn new(bytes: Vec<u8>) -> Result<Self, PacketError> {
        if bytes.len() % 4 != 0 || bytes.len() > 40 {
            return Err(PacketError::ValueOutOfRange {
                field: "Ipv4 options length",
                max: 40,
                got: bytes.len(),
            });
        }
        Ok(Ipv4Options { bytes })
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Walks the Eool/Noop/length-prefixed option structure, rejecting
    /// truncated or self-contradictory records.
    fn validate_region(mut region: &[u8]) -> Result<(), PacketError> {
        while let Some((&option_type, next)) = region.split_first() {
            match option_type {
                0 => break,
                1 => region = next,
                _ => match region.get(1) {
                    None => {
                        return Err(PacketError::Malformed {
                            layer: Ipv4::name(),
                            detail: "length field missing from IPv4 option",
                        })
                    }
                    Some(0..=1) => {
                        return Err(PacketError::Malformed {
                            layer: Ipv4::name(),
                            detail: "IPv4 option length must be at least 2",
                        })
                    }
                    Some(&len) => match region.get(len as usize..) {
                        Some(rest) => region = rest,
                        None => {
                            return Err(PacketError::Malformed {
                                layer: Ipv4::name(),
                                detail: "IPv4 option length exceeds the options region",
                            })
                        }
                    },
                },
            }
        }
        Ok(())
    }
}

/// An IPv4 packet (RFC 791).
#[derive(Clone, Debug)]
pub struct Ipv4 {
    // version, IHL, total length and (optionally) the checksum are derived
    // at serialization time
    dscp: u8,
    ecn: Ecn,
    id: u16,
    flags: Ipv4Flags,
    frag_offset: u16,
    ttl: u8,
    protocol: u8,
    chksum: Option<u16>,
    saddr: Ipv4Addr,
    daddr: Ipv4Addr,
    options: Ipv4Options,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ipv4 {
    /// A minimal header with the given addresses and an empty payload.
    pub fn new(saddr: Ipv4Addr, daddr: Ipv4Addr) -> Self {
        Ipv4 {
            dscp: 0,
            ecn: Ecn::NotEct,
            id: 0,
            flags: Ipv4Flags::empty(),
            frag_offset: 0,
            ttl: 64,
            protocol: PROTO_TCP,
            chksum: None,
            saddr,
            daddr,
            options: Ipv4Options::default(),
            payload: None,
        }
    }

    /// Header length in 32-bit words, derived from the options region.
    #[inline]
    pub fn ihl(&self) -> u8 {
        (5 + self.options.byte_len() / 4) as u8
    }

    #[inline]
    pub fn dscp(&self) -> u8 {
        self.dscp
    }

    #[inline]
    pub fn set_dscp(&mut self, dscp: u8) {
        self.dscp = dscp & 0b0011_1111;
    }

    #[inline]
    pub fn ecn(&self) -> Ecn {
        self.ecn
    }

    #[inline]
    pub fn set_ecn(&mut self, ecn: Ecn) {
        self.ecn = ecn;
    }

    #[inline]
    pub fn identifier(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn set_identifier(&mut self, id: u16) {
        self.id = id;
    }

    #[inline]
    pub fn flags(&self) -> Ipv4Flags {
        self.flags
    }

    #[inline]
    pub fn set_flags(&mut self, flags: Ipv4Flags) {
        self.flags = flags;
    }

    #[inline]
    pub fn frag_offset(&self) -> u16 {
        self.frag_offset
    }

    /// Fragment offset in 8-byte units; 13 bits on the wire.
    pub fn set_frag_offset(&mut self, offset: u16) -> Result<(), PacketError> {
        if offset > 0x1FFF {
            return Err(PacketError::ValueOutOfRange {
                field: "Ipv4 fragment offset",
                max: 0x1FFF,
                got: offset as usize,
            });
        }
        self.frag_offset = offset;
        Ok(())
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    #[inline]
    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// The protocol number announced for the payload. Updated automatically
    /// when a known layer type is set as the payload.
    #[inline]
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    #[inline]
    pub fn set_protocol(&mut self, protocol: u8) {
        self.protocol = protocol;
    }

    /// The assigned header checksum, or `None` if it is to be computed at
    /// serialization time.
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

    #[inline]
    pub fn saddr(&self) -> Ipv4Addr {
        self.saddr
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv4Addr) {
        self.saddr = saddr;
    }

    #[inline]
    pub fn daddr(&self) -> Ipv4Addr {
        self.daddr
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv4Addr) {
        self.daddr = daddr;
    }

    #[inline]
    pub fn options(&self) -> &Ipv4Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Ipv4Options) {
        self.options = options;
    }

    /// The protocol number a known payload layer maps to, or `None` for
    /// layers carried opaquely.
    fn protocol_for(payload: &dyn LayerObject) -> Option<u8> {
        let any = payload.as_any();
        if any.is::<Tcp>() {
            Some(PROTO_TCP)
        } else if any.is::<Udp>() {
            Some(PROTO_UDP)
        } else if any.is::<Icmpv4>() {
            Some(PROTO_ICMP)
        } else if any.is::<Igmpv2>() {
            Some(PROTO_IGMP)
        } else if any.is::<Ipv6>() {
            Some(PROTO_IPV6)
        } else {
            None
        }
    }

    /// Decodes a payload according to the protocol dispatch table. Unknown
    /// protocol numbers decode as `Raw`.
    fn payload_for(protocol: u8, bytes: &[u8]) -> Box<dyn LayerObject> {
        match protocol {
            PROTO_TCP => Box::new(Tcp::from_bytes_unchecked(bytes)),
            PROTO_UDP => Box::new(Udp::from_bytes_unchecked(bytes)),
            PROTO_ICMP => Box::new(Icmpv4::from_bytes_unchecked(bytes)),
            PROTO_IGMP => Box::new(Igmpv2::from_bytes_unchecked(bytes)),
            PROTO_IPV6 => Box::new(Ipv6::from_bytes_unchecked(bytes)),
            _ => Box::new(Raw::from_bytes_unchecked(bytes)),
        }
    }
}

impl LayerName for Ipv4 {
    #[inline]
    fn name() -> &'static str {
        "Ipv4"
    }
}

impl LayerLength for Ipv4 {
    /// The total length in bytes of the IPv4 header and its payload.
    #[inline]
    fn len(&self) -> usize {
        IPV4_MIN_HEADER_LEN
            + self.options.byte_len()
            + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Ipv4 {
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
                "src={} dst={} proto={} ttl={} id=0x{:04x} flags={:?} frag={} dscp={} ecn={:?} ihl={}",
                self.saddr,
                self.daddr,
                self.protocol,
                self.ttl,
                self.id,
                self.flags,
                self.frag_offset,
                self.dscp,
                self.ecn,
                self.ihl(),
            )
        } else {
            format!("src={} dst={} proto={}", self.saddr, self.daddr, self.protocol)
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

    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool {
        Self::protocol_for(payload).is_some() || payload.as_any().is::<Raw>()
    }

    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        if let Some(protocol) = Self::protocol_for(payload.as_ref()) {
            self.protocol = protocol;
        }
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

impl ToBytes for Ipv4 {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        let header_len = IPV4_MIN_HEADER_LEN + self.options.byte_len();

        bytes.push(0x40 | self.ihl());
        bytes.push((self.dscp << 2) | self.ecn as u8);
        bytes.extend(
            u16::try_from(self.len())
                .unwrap_or(u16::MAX)
                .to_be_bytes(),
        );
        bytes.extend(self.id.to_be_bytes());
        bytes.extend(
            (((self.flags.bits() as u16) << 13) | self.frag_offset).to_be_bytes(),
        );
        bytes.push(self.ttl);
        bytes.push(self.protocol);
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.saddr.octets());
        bytes.extend(self.daddr.octets());
        bytes.extend(self.options.as_slice());

        if self.chksum.is_none() {
            // The IPv4 checksum covers only the header, no pseudo-header.
            let ck = checksum::checksum(&bytes[start..start + header_len]);
            let field: &mut [u8; 2] = utils::get_mut_array(bytes, start + 10)
                .expect("IPv4 checksum field missing from serialized header");
            *field = ck.to_be_bytes();
        }

        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Ipv4>(), start)));
        }
    }
}

impl Validate for Ipv4 {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv4Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv4Ref::validate_payload(bytes)
    }
}

impl FromBytes for Ipv4 {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = Ipv4Ref::from_bytes_unchecked(bytes);
        let payload_segment = view.payload_segment();
        let mut layer = Ipv4 {
            dscp: view.dscp(),
            ecn: view.ecn(),
            id: view.identifier(),
            flags: view.flags(),
            frag_offset: view.frag_offset(),
            ttl: view.ttl(),
            protocol: view.protocol(),
            chksum: Some(view.chksum()),
            saddr: view.saddr(),
            daddr: view.daddr(),
            options: Ipv4Options {
                bytes: Vec::from(view.options().as_slice()),
            },
            payload: None,
        };
        if !payload_segment.is_empty() {
            layer.payload = Some(Self::payload_for(
                layer.protocol,
                payload_segment.as_slice(),
            ));
        }
        layer
    }
}

/// An immutable view of an IPv4 packet.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4Ref<'a> {
    data: ByteSegment<'a>,
}

impl<'a> Ipv4Ref<'a> {
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Ipv4Ref to retrieve IP Version field")
            >> 4
    }

    #[inline]
    pub fn ihl(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Ipv4Ref to retrieve Internet Header Length field")
            & 0x0F
    }

    #[inline]
    pub fn dscp(&self) -> u8 {
        self.data
            .read_u8(1)
            .expect("insufficient bytes in Ipv4Ref to retrieve DSCP field")
            >> 2
    }

    #[inline]
    pub fn ecn(&self) -> Ecn {
        Ecn::from(
            self.data
                .read_u8(1)
                .expect("insufficient bytes in Ipv4Ref to retrieve ECN field"),
        )
    }

    #[inline]
    pub fn total_length(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in Ipv4Ref to retrieve Total Length field")
    }

    #[inline]
    pub fn identifier(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in Ipv4Ref to retrieve Identification field")
    }

    #[inline]
    pub fn flags(&self) -> Ipv4Flags {
        Ipv4Flags::from_bits_truncate(
            self.data
                .read_u8(6)
                .expect("insufficient bytes in Ipv4Ref to retrieve Flags field")
                >> 5,
        )
    }

    #[inline]
    pub fn frag_offset(&self) -> u16 {
        self.data
            .read_u16(6)
            .expect("insufficient bytes in Ipv4Ref to retrieve Fragment Offset field")
            & 0x1FFF
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.data
            .read_u8(8)
            .expect("insufficient bytes in Ipv4Ref to retrieve TTL field")
    }

    #[inline]
    pub fn protocol(&self) -> u8 {
        self.data
            .read_u8(9)
            .expect("insufficient bytes in Ipv4Ref to retrieve Protocol field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(10)
            .expect("insufficient bytes in Ipv4Ref to retrieve Header Checksum field")
    }

    #[inline]
    pub fn saddr(&self) -> Ipv4Addr {
        self.data
            .read_ipv4(12)
            .expect("insufficient bytes in Ipv4Ref to retrieve Source Address field")
    }

    #[inline]
    pub fn daddr(&self) -> Ipv4Addr {
        self.data
            .read_ipv4(16)
            .expect("insufficient bytes in Ipv4Ref to retrieve Destination Address field")
    }

    /// The options region: bytes `[20, IHL*4)` of the header.
    #[inline]
    pub fn options(&self) -> ByteSegment<'a> {
        let end = (self.ihl() as usize).max(5) * 4;
        self.data
            .slice(IPV4_MIN_HEADER_LEN, end - IPV4_MIN_HEADER_LEN)
            .expect("insufficient bytes in Ipv4Ref to retrieve IPv4 options")
    }

    /// The header window, clipped to IHL*4 bytes.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped((self.ihl() as usize).max(5) * 4)
            .expect("insufficient bytes in Ipv4Ref to retrieve header")
    }

    /// The payload window: everything between the header and the end of the
    /// declared total length, never reading past the containing segment.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        let header_len = (self.ihl() as usize).max(5) * 4;
        let declared = (self.total_length() as usize).min(self.data.len());
        self.data
            .slice(header_len, declared.saturating_sub(header_len))
            .expect("insufficient bytes in Ipv4Ref to retrieve payload")
    }

    /// Whether the header checksum folds to all-ones over the header bytes.
    #[inline]
    pub fn chksum_valid(&self) -> bool {
        checksum::verify(self.header().as_slice())
    }

    /// The pseudo-header a transport payload's checksum is primed with.
    #[inline]
    pub fn pseudo_header(&self) -> PseudoHeader {
        PseudoHeader::V4 {
            src: self.saddr(),
            dst: self.daddr(),
            protocol: self.protocol(),
            len: (self.payload_segment().len()) as u16,
        }
    }
}

impl LayerName for Ipv4Ref<'_> {
    #[inline]
    fn name() -> &'static str {
        Ipv4::name()
    }
}

impl<'a> FromBytesRef<'a> for Ipv4Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Ipv4Ref {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for Ipv4Ref<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        let (version, ihl) = match bytes.first() {
            None => {
                return Err(PacketError::Truncated {
                    layer: Ipv4::name(),
                    need: IPV4_MIN_HEADER_LEN,
                    have: 0,
                })
            }
            Some(&b) => (b >> 4, (b & 0x0F) as usize * 4),
        };

        if version != 4 {
            return Err(PacketError::Malformed {
                layer: Ipv4::name(),
                detail: "version number of IPv4 header was not 4",
            });
        }

        if ihl < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::Malformed {
                layer: Ipv4::name(),
                detail: "IHL must be at least 5",
            });
        }

        if bytes.len() < ihl {
            return Err(PacketError::Truncated {
                layer: Ipv4::name(),
                need: ihl,
                have: bytes.len(),
            });
        }

        let total_length = u16::from_be_bytes(
            utils::to_array(bytes, 2).expect("length field bounds already checked"),
        ) as usize;

        if total_length < ihl {
            return Err(PacketError::Malformed {
                layer: Ipv4::name(),
                detail: "total length smaller than the header length",
            });
        }

        if total_length > bytes.len() {
            return Err(PacketError::Truncated {
                layer: Ipv4::name(),
                need: total_length,
                have: bytes.len(),
            });
        }

        Ipv4Options::validate_region(&bytes[IPV4_MIN_HEADER_LEN..ihl])
    }

    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        let view = Ipv4Ref::from_bytes_unchecked(bytes);
        let payload = view.payload_segment();
        if payload.is_empty() {
            return Ok(());
        }
        match view.protocol() {
            PROTO_TCP => TcpRef::validate(payload.as_slice()),
            PROTO_UDP => UdpRef::validate(payload.as_slice()),
            PROTO_ICMP => Icmpv4Ref::validate(payload.as_slice()),
            PROTO_IGMP => Igmpv2Ref::validate(payload.as_slice()),
            PROTO_IPV6 => Ipv6Ref::validate(payload.as_slice()),
            _ => RawRef::validate(payload.as_slice()),
        }
    }
}

impl LayerOffset for Ipv4Ref<'_> {
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        let ihl = ((*bytes.first()? & 0x0F) as usize).max(5) * 4;
        let rest = bytes.get(ihl..)?;
        let index = match *bytes.get(9)? {
            PROTO_TCP if layer_type == LayerId::of::<Tcp>() => Some(0),
            PROTO_TCP => TcpRef::payload_byte_index(rest, layer_type),
            PROTO_UDP if layer_type == LayerId::of::<Udp>() => Some(0),
            PROTO_UDP => UdpRef::payload_byte_index(rest, layer_type),
            PROTO_ICMP if layer_type == LayerId::of::<Icmpv4>() => Some(0),
            PROTO_IGMP if layer_type == LayerId::of::<Igmpv2>() => Some(0),
            PROTO_IPV6 if layer_type == LayerId::of::<Ipv6>() => Some(0),
            PROTO_IPV6 => Ipv6Ref::payload_byte_index(rest, layer_type),
            _ if layer_type == LayerId::of::<Raw>() => Some(0),
            _ => None,
        };
        index.map(|idx| ihl + idx)
    }
}

/// An in-place mutator over an IPv4 header. Writes go straight into the
/// underlying buffer; the checksum is never recomputed implicitly.
#[derive(Debug)]
pub struct Ipv4Mut<'a> {
    data: ByteSegmentMut<'a>,
}

impl<'a> Ipv4Mut<'a> {
    #[inline]
    pub fn ihl(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Ipv4Mut to retrieve IHL field")
            & 0x0F
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.data
            .read_u8(8)
            .expect("insufficient bytes in Ipv4Mut to retrieve TTL field")
    }

    #[inline]
    pub fn set_ttl(&mut self, ttl: u8) {
        self.data
            .write_u8(8, ttl)
            .expect("insufficient bytes in Ipv4Mut to set TTL field");
    }

    #[inline]
    pub fn set_identifier(&mut self, id: u16) {
        self.data
            .write_u16(4, id)
            .expect("insufficient bytes in Ipv4Mut to set Identification field");
    }

    #[inline]
    pub fn set_dscp(&mut self, dscp: u8) {
        let tos = self
            .data
            .read_u8(1)
            .expect("insufficient bytes in Ipv4Mut to retrieve DSCP field");
        self.data
            .write_u8(1, (tos & 0b11) | (dscp << 2))
            .expect("insufficient bytes in Ipv4Mut to set DSCP field");
    }

    #[inline]
    pub fn saddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(
            self.data
                .read_array::<4>(12)
                .expect("insufficient bytes in Ipv4Mut to retrieve Source Address field"),
        )
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv4Addr) {
        self.data
            .write_ipv4(12, saddr)
            .expect("insufficient bytes in Ipv4Mut to set Source Address field");
    }

    #[inline]
    pub fn daddr(&self) -> Ipv4Addr {
        Ipv4Addr::from(
            self.data
                .read_array::<4>(16)
                .expect("insufficient bytes in Ipv4Mut to retrieve Destination Address field"),
        )
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv4Addr) {
        self.data
            .write_ipv4(16, daddr)
            .expect("insufficient bytes in Ipv4Mut to set Destination Address field");
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(10)
            .expect("insufficient bytes in Ipv4Mut to retrieve Header Checksum field")
    }

    /// Assigns the header checksum field. Callers mutate fields first, then
    /// recompute: `set_chksum(compute_chksum())`.
    #[inline]
    pub fn set_chksum(&mut self, chksum: u16) {
        self.data
            .write_u16(10, chksum)
            .expect("insufficient bytes in Ipv4Mut to set Header Checksum field");
    }

    /// The header checksum the current header bytes call for, computed with
    /// the checksum field taken as zero.
    pub fn compute_chksum(&self) -> u16 {
        let header_len = (self.ihl() as usize).max(5) * 4;
        let header = &self.data.as_slice()[..header_len];
        let mut sum = checksum::ones_complement_sum(&header[..10]);
        sum = checksum::ones_complement_add(sum, checksum::ones_complement_sum(&header[12..]));
        !sum
    }

    /// Reborrows as an immutable view.
    #[inline]
    pub fn as_ref(&self) -> Ipv4Ref<'_> {
        Ipv4Ref {
            data: self.data.as_segment(),
        }
    }
}

impl LayerName for Ipv4Mut<'_> {
    #[inline]
    fn name() -> &'static str {
        Ipv4::name()
    }
}

impl Validate for Ipv4Mut<'_> {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv4Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv4Ref::validate_payload(bytes)
    }
}

impl<'a> FromBytesMut<'a> for Ipv4Mut<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self {
        Ipv4Mut {
            data: ByteSegmentMut::new(bytes),
        }
    }
}

/// An IPv6 packet (RFC 8200).
#[derive(Clone, Debug)]
pub struct Ipv6 {
    traffic_class: u8,
    flow_label: u32,
    next_header: u8,
    hop_limit: u8,
    saddr: Ipv6Addr,
    daddr: Ipv6Addr,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ipv6 {
    /// A minimal header with the given addresses and an empty payload.
    pub fn new(saddr: Ipv6Addr, daddr: Ipv6Addr) -> Self {
        Ipv6 {
            traffic_class: 0,
            flow_label: 0,
            next_header: PROTO_TCP,
            hop_limit: 64,
            saddr,
            daddr,
            payload: None,
        }
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        self.traffic_class
    }

    #[inline]
    pub fn set_traffic_class(&mut self, tc: u8) {
        self.traffic_class = tc;
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        self.flow_label
    }

    /// Flow label; 20 bits on the wire.
    pub fn set_flow_label(&mut self, label: u32) -> Result<(), PacketError> {
        if label > 0xF_FFFF {
            return Err(PacketError::ValueOutOfRange {
                field: "Ipv6 flow label",
                max: 0xF_FFFF,
                got: label as usize,
            });
        }
        self.flow_label = label;
        Ok(())
    }

    /// The next-header number announced for the payload. Updated
    /// automatically when a known layer type is set as the payload.
    #[inline]
    pub fn next_header(&self) -> u8 {
        self.next_header
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: u8) {
        self.next_header = next_header;
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    #[inline]
    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.hop_limit = hop_limit;
    }

    #[inline]
    pub fn saddr(&self) -> Ipv6Addr {
        self.saddr
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv6Addr) {
        self.saddr = saddr;
    }

    #[inline]
    pub fn daddr(&self) -> Ipv6Addr {
        self.daddr
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv6Addr) {
        self.daddr = daddr;
    }

    fn next_header_for(payload: &dyn LayerObject) -> Option<u8> {
        let any = payload.as_any();
        if any.is::<Tcp>() {
            Some(PROTO_TCP)
        } else if any.is::<Udp>() {
            Some(PROTO_UDP)
        } else if any.is::<Icmpv6>() {
            Some(PROTO_ICMPV6)
        } else if let Some(ext) = any.downcast_ref::<Ipv6Ext>() {
            Some(ext.kind().header_number())
        } else {
            None
        }
    }

    /// Decodes a payload according to the next-header dispatch table.
    /// Extension headers consume their sub-segment and recurse; unknown
    /// numbers decode as `Raw`.
    fn payload_for(next_header: u8, bytes: &[u8]) -> Box<dyn LayerObject> {
        match next_header {
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS => {
                Box::new(Ipv6Ext::from_bytes_unchecked_with(next_header, bytes))
            }
            PROTO_TCP => Box::new(Tcp::from_bytes_unchecked(bytes)),
            PROTO_UDP => Box::new(Udp::from_bytes_unchecked(bytes)),
            PROTO_ICMPV6 => Box::new(Icmpv6::from_bytes_unchecked(bytes)),
            _ => Box::new(Raw::from_bytes_unchecked(bytes)),
        }
    }

    fn validate_next(
        next_header: u8,
        bytes: &[u8],
    ) -> Result<(), PacketError> {
        match next_header {
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS => {
                Ipv6Ext::validate_with(next_header, bytes)
            }
            PROTO_TCP => TcpRef::validate(bytes),
            PROTO_UDP => UdpRef::validate(bytes),
            PROTO_ICMPV6 => Icmpv6Ref::validate(bytes),
            _ => RawRef::validate(bytes),
        }
    }
}

impl LayerName for Ipv6 {
    #[inline]
    fn name() -> &'static str {
        "Ipv6"
    }
}

impl LayerLength for Ipv6 {
    #[inline]
    fn len(&self) -> usize {
        IPV6_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Ipv6 {
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
                "src={} dst={} next={} hlim={} tc={} flow=0x{:05x}",
                self.saddr,
                self.daddr,
                self.next_header,
                self.hop_limit,
                self.traffic_class,
                self.flow_label,
            )
        } else {
            format!("src={} dst={} next={}", self.saddr, self.daddr, self.next_header)
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

    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool {
        Self::next_header_for(payload).is_some() || payload.as_any().is::<Raw>()
    }

    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        if let Some(next_header) = Self::next_header_for(payload.as_ref()) {
            self.next_header = next_header;
        }
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

impl ToBytes for Ipv6 {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        let payload_len = self.payload.as_ref().map_or(0, |p| p.len());

        bytes.push(0x60 | (self.traffic_class >> 4));
        bytes.push((self.traffic_class << 4) | ((self.flow_label >> 16) as u8 & 0x0F));
        bytes.extend(((self.flow_label & 0xFFFF) as u16).to_be_bytes());
        bytes.extend(
            u16::try_from(payload_len).unwrap_or(u16::MAX).to_be_bytes(),
        );
        bytes.push(self.next_header);
        bytes.push(self.hop_limit);
        bytes.extend(self.saddr.octets());
        bytes.extend(self.daddr.octets());

        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Ipv6>(), start)));
        }
    }
}

impl Validate for Ipv6 {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv6Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv6Ref::validate_payload(bytes)
    }
}

impl FromBytes for Ipv6 {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = Ipv6Ref::from_bytes_unchecked(bytes);
        let payload_segment = view.payload_segment();
        let mut layer = Ipv6 {
            traffic_class: view.traffic_class(),
            flow_label: view.flow_label(),
            next_header: view.next_header(),
            hop_limit: view.hop_limit(),
            saddr: view.saddr(),
            daddr: view.daddr(),
            payload: None,
        };
        if !payload_segment.is_empty() {
            layer.payload = Some(Self::payload_for(
                layer.next_header,
                payload_segment.as_slice(),
            ));
        }
        layer
    }
}

/// An immutable view of an IPv6 packet.
#[derive(Clone, Copy, Debug)]
pub struct Ipv6Ref<'a> {
    data: ByteSegment<'a>,
}

impl<'a> Ipv6Ref<'a> {
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Ipv6Ref to retrieve IP Version field")
            >> 4
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        let word = self
            .data
            .read_u16(0)
            .expect("insufficient bytes in Ipv6Ref to retrieve Traffic Class field");
        ((word >> 4) & 0xFF) as u8
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        (self
            .data
            .read_u32(0)
            .expect("insufficient bytes in Ipv6Ref to retrieve Flow Label field"))
            & 0xF_FFFF
    }

    #[inline]
    pub fn payload_length(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in Ipv6Ref to retrieve Payload Length field")
    }

    #[inline]
    pub fn next_header(&self) -> u8 {
        self.data
            .read_u8(6)
            .expect("insufficient bytes in Ipv6Ref to retrieve Next Header field")
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.data
            .read_u8(7)
            .expect("insufficient bytes in Ipv6Ref to retrieve Hop Limit field")
    }

    #[inline]
    pub fn saddr(&self) -> Ipv6Addr {
        self.data
            .read_ipv6(8)
            .expect("insufficient bytes in Ipv6Ref to retrieve Source Address field")
    }

    #[inline]
    pub fn daddr(&self) -> Ipv6Addr {
        self.data
            .read_ipv6(24)
            .expect("insufficient bytes in Ipv6Ref to retrieve Destination Address field")
    }

    /// The fixed 40-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(IPV6_HEADER_LEN)
            .expect("insufficient bytes in Ipv6Ref to retrieve header")
    }

    /// The payload window, clipped to the declared payload length.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        let declared = IPV6_HEADER_LEN + self.payload_length() as usize;
        let end = declared.min(self.data.len());
        self.data
            .slice(IPV6_HEADER_LEN, end - IPV6_HEADER_LEN)
            .expect("insufficient bytes in Ipv6Ref to retrieve payload")
    }

    /// The pseudo-header an upper-layer checksum is primed with. The
    /// upper-layer length and next-header must describe the transport
    /// segment itself; when extension headers are present, use
    /// [`pseudo_header_for`](Self::pseudo_header_for) with the transport's
    /// protocol number and byte length.
    #[inline]
    pub fn pseudo_header(&self) -> PseudoHeader {
        self.pseudo_header_for(self.next_header(), self.payload_segment().len() as u32)
    }

    /// A pseudo-header for a transport segment of `len` bytes carried
    /// (possibly behind extension headers) inside this packet.
    #[inline]
    pub fn pseudo_header_for(&self, next_header: u8, len: u32) -> PseudoHeader {
        PseudoHeader::V6 {
            src: self.saddr(),
            dst: self.daddr(),
            next_header,
            len,
        }
    }
}

impl LayerName for Ipv6Ref<'_> {
    #[inline]
    fn name() -> &'static str {
        Ipv6::name()
    }
}

impl<'a> FromBytesRef<'a> for Ipv6Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Ipv6Ref {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for Ipv6Ref<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < IPV6_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Ipv6::name(),
                need: IPV6_HEADER_LEN,
                have: bytes.len(),
            });
        }

        if bytes[0] >> 4 != 6 {
            return Err(PacketError::Malformed {
                layer: Ipv6::name(),
                detail: "version number of IPv6 header was not 6",
            });
        }

        let payload_length = u16::from_be_bytes(
            utils::to_array(bytes, 4).expect("length field bounds already checked"),
        ) as usize;
        if IPV6_HEADER_LEN + payload_length > bytes.len() {
            return Err(PacketError::Truncated {
                layer: Ipv6::name(),
                need: IPV6_HEADER_LEN + payload_length,
                have: bytes.len(),
            });
        }

        Ok(())
    }

    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        let view = Ipv6Ref::from_bytes_unchecked(bytes);
        let payload = view.payload_segment();
        if payload.is_empty() {
            return Ok(());
        }
        Ipv6::validate_next(view.next_header(), payload.as_slice())
    }
}

impl LayerOffset for Ipv6Ref<'_> {
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() < IPV6_HEADER_LEN {
            return None;
        }
        let rest = &bytes[IPV6_HEADER_LEN..];
        let index = match *bytes.get(6)? {
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS
                if layer_type == LayerId::of::<Ipv6Ext>() =>
            {
                Some(0)
            }
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS => {
                Ipv6ExtRef::payload_byte_index(rest, layer_type)
            }
            PROTO_TCP if layer_type == LayerId::of::<Tcp>() => Some(0),
            PROTO_TCP => TcpRef::payload_byte_index(rest, layer_type),
            PROTO_UDP if layer_type == LayerId::of::<Udp>() => Some(0),
            PROTO_UDP => UdpRef::payload_byte_index(rest, layer_type),
            PROTO_ICMPV6 if layer_type == LayerId::of::<Icmpv6>() => Some(0),
            _ if layer_type == LayerId::of::<Raw>() => Some(0),
            _ => None,
        };
        index.map(|idx| IPV6_HEADER_LEN + idx)
    }
}

/// An in-place mutator over an IPv6 header.
#[derive(Debug)]
pub struct Ipv6Mut<'a> {
    data: ByteSegmentMut<'a>,
}

impl<'a> Ipv6Mut<'a> {
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.data
            .read_u8(7)
            .expect("insufficient bytes in Ipv6Mut to retrieve Hop Limit field")
    }

    #[inline]
    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.data
            .write_u8(7, hop_limit)
            .expect("insufficient bytes in Ipv6Mut to set Hop Limit field");
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv6Addr) {
        self.data
            .write_ipv6(8, saddr)
            .expect("insufficient bytes in Ipv6Mut to set Source Address field");
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv6Addr) {
        self.data
            .write_ipv6(24, daddr)
            .expect("insufficient bytes in Ipv6Mut to set Destination Address field");
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: u8) {
        self.data
            .write_u8(6, next_header)
            .expect("insufficient bytes in Ipv6Mut to set Next Header field");
    }

    /// Reborrows as an immutable view.
    #[inline]
    pub fn as_ref(&self) -> Ipv6Ref<'_> {
        Ipv6Ref {
            data: self.data.as_segment(),
        }
    }
}

impl LayerName for Ipv6Mut<'_> {
    #[inline]
    fn name() -> &'static str {
        Ipv6::name()
    }
}

impl Validate for Ipv6Mut<'_> {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv6Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Ipv6Ref::validate_payload(bytes)
    }
}

impl<'a> FromBytesMut<'a> for Ipv6Mut<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self {
        Ipv6Mut {
            data: ByteSegmentMut::new(bytes),
        }
    }
}

/// The kind of an IPv6 extension header, i.e. the next-header number by
/// which the previous layer reached it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ipv6ExtKind {
    HopByHop,
    Routing,
    Fragment,
    DestOpts,
}

impl Ipv6ExtKind {
    /// The next-header number identifying this extension.
    #[inline]
    pub fn header_number(&self) -> u8 {
        match self {
            Ipv6ExtKind::HopByHop => EXT_HOP_BY_HOP,
            Ipv6ExtKind::Routing => EXT_ROUTING,
            Ipv6ExtKind::Fragment => EXT_FRAGMENT,
            Ipv6ExtKind::DestOpts => EXT_DEST_OPTS,
        }
    }

    fn from_header_number(number: u8) -> Option<Self> {
        match number {
            EXT_HOP_BY_HOP => Some(Ipv6ExtKind::HopByHop),
            EXT_ROUTING => Some(Ipv6ExtKind::Routing),
            EXT_FRAGMENT => Some(Ipv6ExtKind::Fragment),
            EXT_DEST_OPTS => Some(Ipv6ExtKind::DestOpts),
            _ => None,
        }
    }
}

/// An IPv6 extension header.
///
/// Hop-by-Hop, Routing and Destination Options share the
/// `{next-header, length-in-8-byte-units}` layout; Fragment is a fixed
/// 8-byte header with offset/M-flag/identification accessors. The body after
/// the first two bytes is preserved verbatim; the extension recurses on its
/// own next-header for the layer beneath it.
#[derive(Clone, Debug)]
pub struct Ipv6Ext {
    kind: Ipv6ExtKind,
    next_header: u8,
    // Everything after the leading next-header byte. body[0] is the
    // hdr-ext-len byte (recomputed at serialization) or, for Fragment, the
    // reserved byte (preserved).
    body: Vec<u8>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ipv6Ext {
    #[inline]
    pub fn kind(&self) -> Ipv6ExtKind {
        self.kind
    }

    /// The next-header number announced for the layer beneath this
    /// extension.
    #[inline]
    pub fn next_header(&self) -> u8 {
        self.next_header
    }

    /// The extension header's own length in bytes.
    #[inline]
    pub fn header_len(&self) -> usize {
        1 + self.body.len()
    }

    /// Fragment offset in 8-byte units. Meaningful for
    /// [`Ipv6ExtKind::Fragment`] only.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        u16::from_be_bytes(
            utils::to_array(&self.body, 1)
                .expect("insufficient bytes in Ipv6Ext to retrieve Fragment Offset field"),
        ) >> 3
    }

    /// The M (more fragments) flag. Meaningful for
    /// [`Ipv6ExtKind::Fragment`] only.
    #[inline]
    pub fn more_fragments(&self) -> bool {
        self.body
            .get(2)
            .map(|b| b & 1 != 0)
            .expect("insufficient bytes in Ipv6Ext to retrieve M flag")
    }

    /// The fragment identification. Meaningful for
    /// [`Ipv6ExtKind::Fragment`] only.
    #[inline]
    pub fn identification(&self) -> u32 {
        u32::from_be_bytes(
            utils::to_array(&self.body, 3)
                .expect("insufficient bytes in Ipv6Ext to retrieve Identification field"),
        )
    }

    fn from_bytes_unchecked_with(header_number: u8, bytes: &[u8]) -> Self {
        let kind = Ipv6ExtKind::from_header_number(header_number)
            .expect("IPv6 extension constructed from a non-extension header number");
        let view = Ipv6ExtRef::from_bytes_unchecked_with(kind, bytes);
        let header_len = view.header_len();
        let mut layer = Ipv6Ext {
            kind,
            next_header: view.next_header(),
            body: Vec::from(&bytes[1..header_len]),
            payload: None,
        };
        let payload = &bytes[header_len..];
        if !payload.is_empty() {
            layer.payload = Some(Ipv6::payload_for(layer.next_header, payload));
        }
        layer
    }

    fn validate_with(header_number: u8, bytes: &[u8]) -> Result<(), PacketError> {
        let kind = match Ipv6ExtKind::from_header_number(header_number) {
            Some(kind) => kind,
            None => {
                return Err(PacketError::Malformed {
                    layer: Ipv6Ext::name(),
                    detail: "not an IPv6 extension header number",
                })
            }
        };
        Ipv6ExtRef::validate_current_with(kind, bytes)?;

        let view = Ipv6ExtRef::from_bytes_unchecked_with(kind, bytes);
        let payload = &bytes[view.header_len()..];
        if payload.is_empty() {
            return Ok(());
        }
        Ipv6::validate_next(view.next_header(), payload)
    }
}

impl LayerName for Ipv6Ext {
    #[inline]
    fn name() -> &'static str {
        "Ipv6Ext"
    }
}

impl LayerLength for Ipv6Ext {
    #[inline]
    fn len(&self) -> usize {
        self.header_len() + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Ipv6Ext {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, verbose: bool) -> String {
        match self.kind {
            Ipv6ExtKind::Fragment => {
                if verbose {
                    format!(
                        "Fragment next={} offset={} more={} id=0x{:08x}",
                        self.next_header,
                        self.frag_offset(),
                        self.more_fragments(),
                        self.identification(),
                    )
                } else {
                    format!("Fragment next={} offset={}", self.next_header, self.frag_offset())
                }
            }
            kind => format!("{:?} next={} len={}", kind, self.next_header, self.header_len()),
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

    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool {
        Ipv6::next_header_for(payload).is_some() || payload.as_any().is::<Raw>()
    }

    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        if let Some(next_header) = Ipv6::next_header_for(payload.as_ref()) {
            self.next_header = next_header;
        }
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

impl ToBytes for Ipv6Ext {
    /// Serializes the extension and forwards `prev` unchanged, so a
    /// transport checksum beneath this extension is still primed from the
    /// IP layer's pseudo-header.
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, prev: Option<(LayerId, usize)>) {
        bytes.push(self.next_header);
        match self.kind {
            Ipv6ExtKind::Fragment => bytes.extend(&self.body),
            _ => {
                // hdr-ext-len counts 8-byte units beyond the first eight.
                bytes.push((self.header_len() / 8 - 1) as u8);
                bytes.extend(&self.body[1..]);
            }
        }
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, prev);
        }
    }
}

/// An immutable view of an IPv6 extension header. The kind is supplied by
/// the dispatching layer; the bytes themselves do not repeat it.
#[derive(Clone, Copy, Debug)]
pub struct Ipv6ExtRef<'a> {
    kind: Ipv6ExtKind,
    data: ByteSegment<'a>,
}

impl<'a> Ipv6ExtRef<'a> {
    /// Wraps `bytes` as an extension header of the given kind.
    #[inline]
    pub fn from_bytes_unchecked_with(kind: Ipv6ExtKind, bytes: &'a [u8]) -> Self {
        Ipv6ExtRef {
            kind,
            data: ByteSegment::new(bytes),
        }
    }

    #[inline]
    pub fn kind(&self) -> Ipv6ExtKind {
        self.kind
    }

    #[inline]
    pub fn next_header(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in Ipv6ExtRef to retrieve Next Header field")
    }

    /// The extension header's own length in bytes: fixed 8 for Fragment,
    /// `(hdr-ext-len + 1) * 8` otherwise.
    #[inline]
    pub fn header_len(&self) -> usize {
        match self.kind {
            Ipv6ExtKind::Fragment => 8,
            _ => {
                (self
                    .data
                    .read_u8(1)
                    .expect("insufficient bytes in Ipv6ExtRef to retrieve Header Length field")
                    as usize
                    + 1)
                    * 8
            }
        }
    }

    #[inline]
    pub fn frag_offset(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in Ipv6ExtRef to retrieve Fragment Offset field")
            >> 3
    }

    #[inline]
    pub fn more_fragments(&self) -> bool {
        self.data
            .read_u8(3)
            .expect("insufficient bytes in Ipv6ExtRef to retrieve M flag")
            & 1
            != 0
    }

    #[inline]
    pub fn identification(&self) -> u32 {
        self.data
            .read_u32(4)
            .expect("insufficient bytes in Ipv6ExtRef to retrieve Identification field")
    }

    /// The window after this extension header.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        self.data
            .clipped(self.header_len())
            .expect("insufficient bytes in Ipv6ExtRef to retrieve payload")
            .encapsulated()
    }

    fn validate_current_with(kind: Ipv6ExtKind, bytes: &[u8]) -> Result<(), PacketError> {
        let need = match kind {
            Ipv6ExtKind::Fragment => 8,
            _ => match bytes.get(1) {
                Some(&len) => (len as usize + 1) * 8,
                None => {
                    return Err(PacketError::Truncated {
                        layer: Ipv6Ext::name(),
                        need: 2,
                        have: bytes.len(),
                    })
                }
            },
        };
        if bytes.len() < need {
            return Err(PacketError::Truncated {
                layer: Ipv6Ext::name(),
                need,
                have: bytes.len(),
            });
        }
        Ok(())
    }
}

impl LayerName for Ipv6ExtRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Ipv6Ext::name()
    }
}

impl LayerOffset for Ipv6ExtRef<'_> {
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        // The hdr-ext-len layout is shared by every kind except Fragment,
        // whose second byte is reserved-zero; reading it as hdr-ext-len
        // still yields the fixed length of 8, so one read serves all kinds.
        let next_header = *bytes.first()?;
        let header_len = (*bytes.get(1)? as usize + 1) * 8;
        let rest = bytes.get(header_len..)?;
        let index = match next_header {
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS
                if layer_type == LayerId::of::<Ipv6Ext>() =>
            {
                Some(0)
            }
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_FRAGMENT | EXT_DEST_OPTS => {
                Ipv6ExtRef::payload_byte_index(rest, layer_type)
            }
            PROTO_TCP if layer_type == LayerId::of::<Tcp>() => Some(0),
            PROTO_TCP => TcpRef::payload_byte_index(rest, layer_type),
            PROTO_UDP if layer_type == LayerId::of::<Udp>() => Some(0),
            PROTO_UDP => UdpRef::payload_byte_index(rest, layer_type),
            PROTO_ICMPV6 if layer_type == LayerId::of::<Icmpv6>() => Some(0),
            _ if layer_type == LayerId::of::<Raw>() => Some(0),
            _ => None,
        };
        index.map(|idx| header_len + idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tcp::Tcp;

    fn sample_ipv4_udp() -> Vec<u8> {
        // 20-byte header + 8-byte UDP header + 4 bytes of payload
        let mut bytes = vec![
            0x45, 0x00, 0x00, 0x20, // version/IHL, ToS, total length 32
            0x12, 0x34, 0x00, 0x00, // id, flags/frag
            0x40, 0x11, 0x00, 0x00, // ttl 64, UDP, checksum 0
            192, 168, 0, 1, // src
            192, 168, 0, 2, // dst
            0x00, 0x35, 0x00, 0x35, // ports
            0x00, 0x0C, 0x00, 0x00, // length 12, checksum 0
            0xDE, 0xAD, 0xBE, 0xEF, // payload
        ];
        let ck = checksum::checksum(&bytes[..20]);
        bytes[10..12].copy_from_slice(&ck.to_be_bytes());
        bytes
    }

    #[test]
    fn parses_and_round_trips() {
        let bytes = sample_ipv4_udp();
        let ipv4 = Ipv4::from_bytes(&bytes).unwrap();
        assert_eq!(ipv4.protocol(), PROTO_UDP);
        assert_eq!(ipv4.saddr(), Ipv4Addr::new(192, 168, 0, 1));
        assert!(ipv4.get_layer::<Udp>().is_some());
        assert_eq!(ipv4.to_bytes(), bytes);
    }

    #[test]
    fn view_reads_without_decoding() {
        let bytes = sample_ipv4_udp();
        let view = Ipv4Ref::from_bytes(&bytes).unwrap();
        assert_eq!(view.version(), 4);
        assert_eq!(view.ihl(), 5);
        assert_eq!(view.total_length(), 32);
        assert_eq!(view.ttl(), 64);
        assert!(view.chksum_valid());
        assert_eq!(view.payload_segment().len(), 12);
    }

    #[test]
    fn rejects_overclaimed_total_length() {
        let mut bytes = sample_ipv4_udp();
        bytes[2..4].copy_from_slice(&100u16.to_be_bytes());
        match Ipv4Ref::validate(&bytes) {
            Err(PacketError::Truncated { layer, need, have }) => {
                assert_eq!(layer, "Ipv4");
                assert_eq!(need, 100);
                assert_eq!(have, 32);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn rejects_small_ihl() {
        let mut bytes = sample_ipv4_udp();
        bytes[0] = 0x44;
        assert!(matches!(
            Ipv4Ref::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }

    #[test]
    fn mutator_rewrites_in_place() {
        let mut bytes = sample_ipv4_udp();
        let mut view = Ipv4Mut::from_bytes(&mut bytes).unwrap();
        view.set_ttl(32);
        view.set_saddr(Ipv4Addr::new(10, 0, 0, 1));
        let ck = view.compute_chksum();
        view.set_chksum(ck);
        assert!(view.as_ref().chksum_valid());
        assert_eq!(bytes[8], 32);
        assert_eq!(&bytes[12..16], &[10, 0, 0, 1]);
        // Bytes outside the mutated fields are untouched.
        assert_eq!(&bytes[20..], &sample_ipv4_udp()[20..]);
    }

    #[test]
    fn unknown_protocol_decodes_as_raw() {
        let mut bytes = sample_ipv4_udp();
        bytes[9] = 0xFD;
        let ck = {
            bytes[10..12].copy_from_slice(&[0, 0]);
            checksum::checksum(&bytes[..20])
        };
        bytes[10..12].copy_from_slice(&ck.to_be_bytes());
        let ipv4 = Ipv4::from_bytes(&bytes).unwrap();
        assert_eq!(ipv4.protocol(), 0xFD);
        assert!(ipv4.get_layer::<Raw>().is_some());
        assert_eq!(ipv4.to_bytes(), bytes);
    }

    #[test]
    fn setting_payload_updates_protocol() {
        let mut ipv4 = Ipv4::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        ipv4.set_payload(Box::new(Tcp::new(1234, 80))).unwrap();
        assert_eq!(ipv4.protocol(), PROTO_TCP);
    }

    #[test]
    fn ipv6_parses_and_round_trips() {
        let mut bytes = vec![
            0x60, 0x00, 0x00, 0x00, // version, tc, flow
            0x00, 0x04, 59, 64, // payload length 4, no-next-header, hop limit
        ];
        bytes.extend(Ipv6Addr::LOCALHOST.octets());
        bytes.extend(Ipv6Addr::LOCALHOST.octets());
        bytes.extend([1, 2, 3, 4]);

        let ipv6 = Ipv6::from_bytes(&bytes).unwrap();
        assert_eq!(ipv6.next_header(), 59);
        assert_eq!(ipv6.hop_limit(), 64);
        assert!(ipv6.get_layer::<Raw>().is_some());
        assert_eq!(ipv6.to_bytes(), bytes);
    }

    #[test]
    fn ipv6_fragment_extension_chain() {
        // IPv6 / Fragment / 4 raw bytes
        let mut bytes = vec![0x60, 0x00, 0x00, 0x00, 0x00, 0x0C, EXT_FRAGMENT, 64];
        bytes.extend(Ipv6Addr::LOCALHOST.octets());
        bytes.extend(Ipv6Addr::LOCALHOST.octets());
        // Fragment: next-header 59, reserved, offset 64 (<< 3) | M, id
        bytes.extend([59, 0x00, 0x02, 0x01, 0x00, 0x00, 0xAB, 0xCD]);
        bytes.extend([9, 9, 9, 9]);

        let ipv6 = Ipv6::from_bytes(&bytes).unwrap();
        let ext = ipv6.get_layer::<Ipv6Ext>().expect("fragment header expected");
        assert_eq!(ext.kind(), Ipv6ExtKind::Fragment);
        assert_eq!(ext.frag_offset(), 64);
        assert!(ext.more_fragments());
        assert_eq!(ext.identification(), 0x0000ABCD);
        assert_eq!(ipv6.to_bytes(), bytes);
    }
}
