// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Transmission Control Protocol (TCP) and its options machinery.

use crate::checksum::{self, PseudoHeader};
use crate::error::PacketError;
use crate::layers::ip::{Ipv4, Ipv6, PROTO_TCP};
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::{ByteSegment, ByteSegmentMut};
use crate::utils;

use std::net::{Ipv4Addr, Ipv6Addr};

const TCP_MIN_HEADER_LEN: usize = 20;

/// Option kinds that are experimental or historic; the default parse path
/// carries them as opaque [`TcpOption::Experimental`] values so captured
/// packets round-trip, and strict mode rejects them.
const EXPERIMENTAL_KINDS: [u8; 6] = [9, 10, 11, 12, 13, 27];

/// The length of a DDM header, the smallest unit a DRDA exchange sends.
pub const DDM_HEADER_LEN: usize = 10;

/// Whether a TCP payload looks like the start of a DRDA exchange: a DDM
/// header's magic byte in third position with enough bytes behind it.
///
/// Recognition is all this library does with DRDA; the payload stays [`Raw`]
/// for an external decoder.
#[inline]
pub fn looks_like_drda(payload: &[u8]) -> bool {
    payload.len() >= DDM_HEADER_LEN && payload.get(2) == Some(&0xD0)
}

/// The nine TCP flag bits (NS through FIN), straddling the low bit of the
/// data-offset byte and the whole byte after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TcpFlags {
    data: u16,
}

const NS_BIT: u16 = 0b_0000_0001_0000_0000;
const CWR_BIT: u16 = 0b_0000_0000_1000_0000;
const ECE_BIT: u16 = 0b_0000_0000_0100_0000;
const URG_BIT: u16 = 0b_0000_0000_0010_0000;
const ACK_BIT: u16 = 0b_0000_0000_0001_0000;
const PSH_BIT: u16 = 0b_0000_0000_0000_1000;
const RST_BIT: u16 = 0b_0000_0000_0000_0100;
const SYN_BIT: u16 = 0b_0000_0000_0000_0010;
const FIN_BIT: u16 = 0b_0000_0000_0000_0001;

macro_rules! flag_accessors {
    ($($get:ident, $set:ident, $bit:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> bool {
                self.data & $bit > 0
            }

            #[inline]
            pub fn $set(&mut self, value: bool) {
                if value {
                    self.data |= $bit;
                } else {
                    self.data &= !$bit;
                }
            }
        )*
    };
}

impl TcpFlags {
    #[inline]
    pub fn new() -> Self {
        TcpFlags::default()
    }

    flag_accessors! {
        ns, set_ns, NS_BIT;
        cwr, set_cwr, CWR_BIT;
        ece, set_ece, ECE_BIT;
        urg, set_urg, URG_BIT;
        ack, set_ack, ACK_BIT;
        psh, set_psh, PSH_BIT;
        rst, set_rst, RST_BIT;
        syn, set_syn, SYN_BIT;
        fin, set_fin, FIN_BIT;
    }

    /// The flag bits as the low nine bits of the offset/flags word.
    #[inline]
    pub fn bits(&self) -> u16 {
        self.data
    }
}

impl From<u16> for TcpFlags {
    /// Uses the low nine bits of the offset/flags word.
    #[inline]
    fn from(value: u16) -> Self {
        TcpFlags {
            data: value & 0b_0000_0001_1111_1111,
        }
    }
}

/// A TCP segment (RFC 793).
#[derive(Clone, Debug)]
pub struct Tcp {
    sport: u16,
    dport: u16,
    seq: u32,
    ack: u32,
    reserved: u8,
    flags: TcpFlags,
    window: u16,
    chksum: Option<u16>,
    urgent_ptr: u16,
    options: TcpOptions,
    payload: Option<Box<dyn LayerObject>>,
}

impl Tcp {
    /// A segment with the given ports and every other field zeroed.
    pub fn new(sport: u16, dport: u16) -> Self {
        Tcp {
            sport,
            dport,
            seq: 0,
            ack: 0,
            reserved: 0,
            flags: TcpFlags::new(),
            window: 0,
            chksum: None,
            urgent_ptr: 0,
            options: TcpOptions::default(),
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

    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[inline]
    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        self.ack
    }

    #[inline]
    pub fn set_ack(&mut self, ack: u32) {
        self.ack = ack;
    }

    /// Header length in 32-bit words, derived from the options region.
    #[inline]
    pub fn data_offset(&self) -> usize {
        5 + self.options.byte_len() / 4
    }

    #[inline]
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    #[inline]
    pub fn set_reserved(&mut self, reserved: u8) {
        self.reserved = reserved & 0b111;
    }

    #[inline]
    pub fn flags(&self) -> TcpFlags {
        self.flags
    }

    #[inline]
    pub fn flags_mut(&mut self) -> &mut TcpFlags {
        &mut self.flags
    }

    #[inline]
    pub fn set_flags(&mut self, flags: TcpFlags) {
        self.flags = flags;
    }

    #[inline]
    pub fn window(&self) -> u16 {
        self.window
    }

    #[inline]
    pub fn set_window(&mut self, window: u16) {
        self.window = window;
    }

    /// The assigned checksum, or `None` if it is to be computed at
    /// serialization time from the enclosing IP layer's pseudo-header.
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
    pub fn urgent_ptr(&self) -> u16 {
        self.urgent_ptr
    }

    #[inline]
    pub fn set_urgent_ptr(&mut self, urgent_ptr: u16) {
        self.urgent_ptr = urgent_ptr;
    }

    #[inline]
    pub fn options(&self) -> &TcpOptions {
        &self.options
    }

    /// Replaces the options. The padded options length feeds the data
    /// offset, which tops out at 15 words (40 option bytes); the region must
    /// land on a 32-bit boundary ([`TcpOptions::from_options`] pads).
    pub fn set_options(&mut self, options: TcpOptions) -> Result<(), PacketError> {
        if options.byte_len() > 40 {
            return Err(PacketError::ValueOutOfRange {
                field: "Tcp options length",
                max: 40,
                got: options.byte_len(),
            });
        }
        if options.byte_len() % 4 != 0 {
            return Err(PacketError::Malformed {
                layer: Tcp::name(),
                detail: "TCP options region must be a multiple of 4 bytes",
            });
        }
        self.options = options;
        Ok(())
    }
}

impl LayerName for Tcp {
    #[inline]
    fn name() -> &'static str {
        "Tcp"
    }
}

impl LayerLength for Tcp {
    #[inline]
    fn len(&self) -> usize {
        self.data_offset() * 4 + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Tcp {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, verbose: bool) -> String {
        let mut flags = String::new();
        for (set, c) in [
            (self.flags.syn(), 'S'),
            (self.flags.ack(), 'A'),
            (self.flags.fin(), 'F'),
            (self.flags.rst(), 'R'),
            (self.flags.psh(), 'P'),
            (self.flags.urg(), 'U'),
        ] {
            if set {
                flags.push(c);
            }
        }
        if verbose {
            format!(
                "sport={} dport={} seq={} ack={} flags=[{}] win={} urg={} options={}",
                self.sport,
                self.dport,
                self.seq,
                self.ack,
                flags,
                self.window,
                self.urgent_ptr,
                self.options.options().len(),
            )
        } else {
            format!("sport={} dport={} flags=[{}]", self.sport, self.dport, flags)
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
        true // any protocol may be served over TCP
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

impl ToBytes for Tcp {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.extend(self.sport.to_be_bytes());
        bytes.extend(self.dport.to_be_bytes());
        bytes.extend(self.seq.to_be_bytes());
        bytes.extend(self.ack.to_be_bytes());
        bytes.push(
            ((self.data_offset() as u8) << 4)
                | (self.reserved << 1)
                | ((self.flags.bits() >> 8) as u8),
        );
        bytes.push((self.flags.bits() & 0x00FF) as u8);
        bytes.extend(self.window.to_be_bytes());
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.urgent_ptr.to_be_bytes());
        self.options.to_bytes_extended(bytes);
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Tcp>(), start)));
        }

        if self.chksum.is_none() {
            if let Some(ck) = transport_chksum(bytes, start, prev, PROTO_TCP) {
                let field: &mut [u8; 2] = utils::get_mut_array(bytes, start + 16)
                    .expect("TCP checksum field missing from serialized header");
                *field = ck.to_be_bytes();
            }
            // Without an IPv4/IPv6 pseudo-header the checksum stays zero.
        }
    }
}

/// Computes the checksum for the transport segment at `bytes[start..]`,
/// priming the sum from the IP header that `prev` points at. Returns `None`
/// when the previous layer is not an IP layer.
pub(crate) fn transport_chksum(
    bytes: &[u8],
    start: usize,
    prev: Option<(LayerId, usize)>,
    protocol: u8,
) -> Option<u16> {
    let (id, prev_idx) = prev?;
    let segment_len = bytes.len() - start;
    let pseudo = if id == LayerId::of::<Ipv4>() {
        PseudoHeader::V4 {
            src: Ipv4Addr::from(utils::to_array::<4>(bytes, prev_idx + 12)?),
            dst: Ipv4Addr::from(utils::to_array::<4>(bytes, prev_idx + 16)?),
            protocol,
            len: segment_len as u16,
        }
    } else if id == LayerId::of::<Ipv6>() {
        PseudoHeader::V6 {
            src: Ipv6Addr::from(utils::to_array::<16>(bytes, prev_idx + 8)?),
            dst: Ipv6Addr::from(utils::to_array::<16>(bytes, prev_idx + 24)?),
            next_header: protocol,
            len: segment_len as u32,
        }
    } else {
        return None;
    };
    Some(pseudo.checksum_of(&bytes[start..]))
}

impl Validate for Tcp {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        TcpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        TcpRef::validate_payload(bytes)
    }
}

impl FromBytes for Tcp {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = TcpRef::from_bytes_unchecked(bytes);
        let header_len = view.data_offset().max(5) * 4;
        let mut layer = Tcp {
            sport: view.sport(),
            dport: view.dport(),
            seq: view.seq(),
            ack: view.ack(),
            reserved: view.reserved(),
            flags: view.flags(),
            window: view.window(),
            chksum: Some(view.chksum()),
            urgent_ptr: view.urgent_ptr(),
            options: TcpOptions::from(view.options()),
            payload: None,
        };
        if bytes.len() > header_len {
            // DRDA and other application protocols are recognized but left
            // to external decoders; the payload is retained byte-for-byte.
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(&bytes[header_len..])));
        }
        layer
    }
}

/// An immutable view of a TCP segment.
#[derive(Clone, Copy, Debug)]
pub struct TcpRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> TcpRef<'a> {
    #[inline]
    pub fn sport(&self) -> u16 {
        self.data
            .read_u16(0)
            .expect("insufficient bytes in TcpRef to retrieve Source Port field")
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in TcpRef to retrieve Destination Port field")
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.data
            .read_u32(4)
            .expect("insufficient bytes in TcpRef to retrieve Sequence Number field")
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        self.data
            .read_u32(8)
            .expect("insufficient bytes in TcpRef to retrieve Acknowledgement Number field")
    }

    #[inline]
    pub fn data_offset(&self) -> usize {
        (self
            .data
            .read_u8(12)
            .expect("insufficient bytes in TcpRef to retrieve Data Offset field")
            >> 4) as usize
    }

    #[inline]
    pub fn reserved(&self) -> u8 {
        (self
            .data
            .read_u8(12)
            .expect("insufficient bytes in TcpRef to retrieve Reserved field")
            & 0b_0000_1110)
            >> 1
    }

    #[inline]
    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from(
            self.data
                .read_u16(12)
                .expect("insufficient bytes in TcpRef to retrieve TCP Flags"),
        )
    }

    #[inline]
    pub fn window(&self) -> u16 {
        self.data
            .read_u16(14)
            .expect("insufficient bytes in TcpRef to retrieve Window Size field")
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(16)
            .expect("insufficient bytes in TcpRef to retrieve Checksum field")
    }

    #[inline]
    pub fn urgent_ptr(&self) -> u16 {
        self.data
            .read_u16(18)
            .expect("insufficient bytes in TcpRef to retrieve Urgent Pointer field")
    }

    /// The options region: bytes `[20, DataOffset*4)` of the header.
    #[inline]
    pub fn options(&self) -> TcpOptionsRef<'a> {
        let end = self.data_offset().max(5) * 4;
        TcpOptionsRef::from_bytes_unchecked(
            self.data
                .slice(TCP_MIN_HEADER_LEN, end - TCP_MIN_HEADER_LEN)
                .expect("insufficient bytes in TcpRef to retrieve TCP Options")
                .as_slice(),
        )
    }

    /// The header window, clipped to DataOffset*4 bytes.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(self.data_offset().max(5) * 4)
            .expect("insufficient bytes in TcpRef to retrieve header")
    }

    /// The payload window after the header.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        self.header().encapsulated()
    }

    /// Whether the checksum folds to all-ones over the segment primed with
    /// `pseudo` (built from the enclosing IP layer; see
    /// [`Ipv4Ref::pseudo_header`]).
    ///
    /// [`Ipv4Ref::pseudo_header`]: crate::layers::ip::Ipv4Ref::pseudo_header
    #[inline]
    pub fn chksum_valid(&self, pseudo: &PseudoHeader) -> bool {
        pseudo.verify(self.data.as_slice())
    }
}

impl LayerName for TcpRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Tcp::name()
    }
}

impl<'a> FromBytesRef<'a> for TcpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        TcpRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for TcpRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        let header_len = match bytes.get(12) {
            None => {
                return Err(PacketError::Truncated {
                    layer: Tcp::name(),
                    need: TCP_MIN_HEADER_LEN,
                    have: bytes.len(),
                })
            }
            Some(l) => (l >> 4) as usize * 4,
        };

        if header_len < TCP_MIN_HEADER_LEN {
            return Err(PacketError::Malformed {
                layer: Tcp::name(),
                detail: "Data Offset must be at least 5",
            });
        }

        if bytes.len() < header_len {
            return Err(PacketError::Truncated {
                layer: Tcp::name(),
                need: header_len,
                have: bytes.len(),
            });
        }

        TcpOptionsRef::validate(&bytes[TCP_MIN_HEADER_LEN..header_len])
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        // The layer after TCP is Raw, which has no constraints.
        Ok(())
    }
}

impl LayerOffset for TcpRef<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if layer_type == LayerId::of::<Raw>() {
            Some(((*bytes.get(12)? >> 4) as usize).max(5) * 4)
        } else {
            None
        }
    }
}

/// An in-place mutator over a TCP header. Writes go straight into the
/// underlying buffer; the checksum is never recomputed implicitly.
#[derive(Debug)]
pub struct TcpMut<'a> {
    data: ByteSegmentMut<'a>,
}

impl<'a> TcpMut<'a> {
    #[inline]
    pub fn sport(&self) -> u16 {
        self.data
            .read_u16(0)
            .expect("insufficient bytes in TcpMut to retrieve Source Port field")
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) {
        self.data
            .write_u16(0, sport)
            .expect("insufficient bytes in TcpMut to set Source Port field");
    }

    #[inline]
    pub fn dport(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in TcpMut to retrieve Destination Port field")
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) {
        self.data
            .write_u16(2, dport)
            .expect("insufficient bytes in TcpMut to set Destination Port field");
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.data
            .read_u32(4)
            .expect("insufficient bytes in TcpMut to retrieve Sequence Number field")
    }

    #[inline]
    pub fn set_seq(&mut self, seq: u32) {
        self.data
            .write_u32(4, seq)
            .expect("insufficient bytes in TcpMut to set Sequence Number field");
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        self.data
            .read_u32(8)
            .expect("insufficient bytes in TcpMut to retrieve Acknowledgement Number field")
    }

    #[inline]
    pub fn set_ack(&mut self, ack: u32) {
        self.data
            .write_u32(8, ack)
            .expect("insufficient bytes in TcpMut to set Acknowledgement Number field");
    }

    #[inline]
    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from(
            self.data
                .read_u16(12)
                .expect("insufficient bytes in TcpMut to retrieve TCP Flags"),
        )
    }

    #[inline]
    pub fn set_flags(&mut self, flags: TcpFlags) {
        let word = self
            .data
            .read_u16(12)
            .expect("insufficient bytes in TcpMut to retrieve TCP Flags");
        self.data
            .write_u16(12, (word & !0x01FF) | flags.bits())
            .expect("insufficient bytes in TcpMut to set TCP Flags");
    }

    #[inline]
    pub fn window(&self) -> u16 {
        self.data
            .read_u16(14)
            .expect("insufficient bytes in TcpMut to retrieve Window Size field")
    }

    #[inline]
    pub fn set_window(&mut self, window: u16) {
        self.data
            .write_u16(14, window)
            .expect("insufficient bytes in TcpMut to set Window Size field");
    }

    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(16)
            .expect("insufficient bytes in TcpMut to retrieve Checksum field")
    }

    /// Assigns the checksum field. Mutate fields first, then recompute:
    /// `set_chksum(compute_chksum(&pseudo))`.
    #[inline]
    pub fn set_chksum(&mut self, chksum: u16) {
        self.data
            .write_u16(16, chksum)
            .expect("insufficient bytes in TcpMut to set Checksum field");
    }

    /// The checksum the current segment bytes call for under `pseudo`,
    /// computed with the checksum field taken as zero.
    pub fn compute_chksum(&self, pseudo: &PseudoHeader) -> u16 {
        let bytes = self.data.as_slice();
        let mut sum = pseudo.sum();
        sum = checksum::ones_complement_add(sum, checksum::ones_complement_sum(&bytes[..16]));
        sum = checksum::ones_complement_add(sum, checksum::ones_complement_sum(&bytes[18..]));
        !sum
    }

    #[inline]
    pub fn set_urgent_ptr(&mut self, urgent_ptr: u16) {
        self.data
            .write_u16(18, urgent_ptr)
            .expect("insufficient bytes in TcpMut to set Urgent Pointer field");
    }

    /// Reborrows as an immutable view.
    #[inline]
    pub fn as_ref(&self) -> TcpRef<'_> {
        TcpRef {
            data: self.data.as_segment(),
        }
    }
}

impl LayerName for TcpMut<'_> {
    #[inline]
    fn name() -> &'static str {
        Tcp::name()
    }
}

impl Validate for TcpMut<'_> {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        TcpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        TcpRef::validate_payload(bytes)
    }
}

impl<'a> FromBytesMut<'a> for TcpMut<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self {
        TcpMut {
            data: ByteSegmentMut::new(bytes),
        }
    }
}

// =============================================================================
//                               TCP Options
// =============================================================================

/// A single TCP option.
///
/// End-of-list and No-op occupy one byte with no length field; every other
/// variant serializes as `{kind, length, value}`. Kinds the library does not
/// model are carried as [`Unknown`](TcpOption::Unknown), and experimental or
/// historic kinds as [`Experimental`](TcpOption::Experimental), so any
/// capture round-trips unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TcpOption {
    /// End of option list (kind 0).
    Eool,
    /// No-operation padding (kind 1).
    Noop,
    /// Maximum segment size (kind 2).
    Mss(u16),
    /// Window scale shift count (kind 3).
    WindowScale(u8),
    /// SACK permitted (kind 4).
    SackPermitted,
    /// SACK blocks (kind 5).
    Sack(Vec<(u32, u32)>),
    /// Echo (kind 6, historic).
    Echo(u32),
    /// Echo reply (kind 7, historic).
    EchoReply(u32),
    /// Timestamp value/echo pair (kind 8).
    Timestamp { value: u32, echo: u32 },
    /// Alternate checksum request (kind 14, historic).
    AltChecksumRequest(u8),
    /// Alternate checksum data (kind 15, historic).
    AltChecksumData(Vec<u8>),
    /// MD5 signature (kind 19).
    Md5Signature([u8; 16]),
    /// User timeout (kind 28).
    UserTimeout(u16),
    /// An experimental or historic kind carried opaquely (kinds 9-13, 27).
    Experimental { kind: u8, data: Vec<u8> },
    /// Any other kind, carried opaquely.
    Unknown { kind: u8, data: Vec<u8> },
}

impl TcpOption {
    /// The option's kind byte.
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::Eool => 0,
            TcpOption::Noop => 1,
            TcpOption::Mss(_) => 2,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 4,
            TcpOption::Sack(_) => 5,
            TcpOption::Echo(_) => 6,
            TcpOption::EchoReply(_) => 7,
            TcpOption::Timestamp { .. } => 8,
            TcpOption::AltChecksumRequest(_) => 14,
            TcpOption::AltChecksumData(_) => 15,
            TcpOption::Md5Signature(_) => 19,
            TcpOption::UserTimeout(_) => 28,
            TcpOption::Experimental { kind, .. } => *kind,
            TcpOption::Unknown { kind, .. } => *kind,
        }
    }

    /// The option's full length on the wire, the kind and length bytes
    /// included.
    pub fn byte_len(&self) -> usize {
        match self {
            TcpOption::Eool | TcpOption::Noop => 1,
            TcpOption::Mss(_) => 4,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 2,
            TcpOption::Sack(blocks) => 2 + blocks.len() * 8,
            TcpOption::Echo(_) | TcpOption::EchoReply(_) => 6,
            TcpOption::Timestamp { .. } => 10,
            TcpOption::AltChecksumRequest(_) => 3,
            TcpOption::AltChecksumData(data) => 2 + data.len(),
            TcpOption::Md5Signature(_) => 18,
            TcpOption::UserTimeout(_) => 4,
            TcpOption::Experimental { data, .. } | TcpOption::Unknown { data, .. } => {
                2 + data.len()
            }
        }
    }

    /// Decodes one already-validated option record.
    fn from_record(kind: u8, data: &[u8]) -> Self {
        match kind {
            0 => TcpOption::Eool,
            1 => TcpOption::Noop,
            2 if data.len() == 2 => {
                TcpOption::Mss(u16::from_be_bytes(data.try_into().unwrap()))
            }
            3 if data.len() == 1 => TcpOption::WindowScale(data[0]),
            4 if data.is_empty() => TcpOption::SackPermitted,
            5 if data.len() % 8 == 0 => TcpOption::Sack(
                data.chunks_exact(8)
                    .map(|block| {
                        (
                            u32::from_be_bytes(block[..4].try_into().unwrap()),
                            u32::from_be_bytes(block[4..].try_into().unwrap()),
                        )
                    })
                    .collect(),
            ),
            6 if data.len() == 4 => {
                TcpOption::Echo(u32::from_be_bytes(data.try_into().unwrap()))
            }
            7 if data.len() == 4 => {
                TcpOption::EchoReply(u32::from_be_bytes(data.try_into().unwrap()))
            }
            8 if data.len() == 8 => TcpOption::Timestamp {
                value: u32::from_be_bytes(data[..4].try_into().unwrap()),
                echo: u32::from_be_bytes(data[4..].try_into().unwrap()),
            },
            14 if data.len() == 1 => TcpOption::AltChecksumRequest(data[0]),
            15 => TcpOption::AltChecksumData(Vec::from(data)),
            19 if data.len() == 16 => {
                TcpOption::Md5Signature(data.try_into().unwrap())
            }
            28 if data.len() == 2 => {
                TcpOption::UserTimeout(u16::from_be_bytes(data.try_into().unwrap()))
            }
            kind if EXPERIMENTAL_KINDS.contains(&kind) => TcpOption::Experimental {
                kind,
                data: Vec::from(data),
            },
            kind => TcpOption::Unknown {
                kind,
                data: Vec::from(data),
            },
        }
    }

    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.kind());
        match self {
            TcpOption::Eool | TcpOption::Noop => return,
            _ => bytes.push(self.byte_len() as u8),
        }
        match self {
            TcpOption::Mss(mss) => bytes.extend(mss.to_be_bytes()),
            TcpOption::WindowScale(shift) => bytes.push(*shift),
            TcpOption::SackPermitted => (),
            TcpOption::Sack(blocks) => {
                for (left, right) in blocks {
                    bytes.extend(left.to_be_bytes());
                    bytes.extend(right.to_be_bytes());
                }
            }
            TcpOption::Echo(value) | TcpOption::EchoReply(value) => {
                bytes.extend(value.to_be_bytes())
            }
            TcpOption::Timestamp { value, echo } => {
                bytes.extend(value.to_be_bytes());
                bytes.extend(echo.to_be_bytes());
            }
            TcpOption::AltChecksumRequest(alg) => bytes.push(*alg),
            TcpOption::AltChecksumData(data) => bytes.extend(data),
            TcpOption::Md5Signature(digest) => bytes.extend(digest),
            TcpOption::UserTimeout(timeout) => bytes.extend(timeout.to_be_bytes()),
            TcpOption::Experimental { data, .. } | TcpOption::Unknown { data, .. } => {
                bytes.extend(data)
            }
            TcpOption::Eool | TcpOption::Noop => unreachable!(),
        }
    }
}

/// The decoded options region of a TCP header: the option records plus any
/// trailing padding bytes, preserved so the region round-trips.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpOptions {
    options: Vec<TcpOption>,
    padding: Vec<u8>,
}

impl TcpOptions {
    /// Decodes an options region, carrying experimental kinds opaquely.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        TcpOptionsRef::validate(bytes)?;
        Ok(Self::from(TcpOptionsRef::from_bytes_unchecked(bytes)))
    }

    /// Decodes an options region, rejecting experimental kinds with
    /// [`PacketError::UnsupportedExperimental`].
    pub fn from_bytes_strict(bytes: &[u8]) -> Result<Self, PacketError> {
        let parsed = Self::from_bytes(bytes)?;
        for option in &parsed.options {
            if let TcpOption::Experimental { .. } = option {
                return Err(PacketError::UnsupportedExperimental {
                    feature: "experimental TCP option kind",
                });
            }
        }
        Ok(parsed)
    }

    /// Builds an options region from records, padding with zeros to a
    /// 32-bit boundary.
    pub fn from_options(options: Vec<TcpOption>) -> Self {
        let unpadded: usize = options.iter().map(TcpOption::byte_len).sum();
        let padding = vec![0; utils::padded_length::<4>(unpadded) - unpadded];
        TcpOptions { options, padding }
    }

    /// The region's full length, padding included.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.options.iter().map(TcpOption::byte_len).sum::<usize>() + self.padding.len()
    }

    #[inline]
    pub fn options(&self) -> &[TcpOption] {
        &self.options
    }

    #[inline]
    pub fn padding(&self) -> &[u8] {
        &self.padding
    }

    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        for option in &self.options {
            option.to_bytes_extended(bytes);
        }
        bytes.extend(&self.padding);
    }
}

impl From<TcpOptionsRef<'_>> for TcpOptions {
    fn from(value: TcpOptionsRef<'_>) -> Self {
        let mut options = Vec::new();
        let mut iter = value.iter();
        for record in iter.by_ref() {
            options.push(TcpOption::from_record(record.kind(), record.data()));
        }
        TcpOptions {
            options,
            padding: Vec::from(iter.remaining()),
        }
    }
}

/// An immutable view of a TCP options region.
#[derive(Clone, Copy, Debug)]
pub struct TcpOptionsRef<'a> {
    bytes: &'a [u8],
}

impl<'a> TcpOptionsRef<'a> {
    #[inline]
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, PacketError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    #[inline]
    pub fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        TcpOptionsRef { bytes }
    }

    /// Walks the region's record structure: a kind byte, then (for kinds
    /// past No-op) a length byte of at least 2 that stays inside the region.
    pub fn validate(bytes: &[u8]) -> Result<(), PacketError> {
        let mut remaining = bytes;
        while let Some(&kind) = remaining.first() {
            match kind {
                0 => break,
                1 => remaining = &remaining[1..],
                _ => match remaining.get(1) {
                    None => {
                        return Err(PacketError::Truncated {
                            layer: Tcp::name(),
                            need: 2,
                            have: 1,
                        })
                    }
                    Some(0..=1) => {
                        return Err(PacketError::Malformed {
                            layer: Tcp::name(),
                            detail: "TCP option length must be at least 2",
                        })
                    }
                    Some(&len) => match remaining.get(len as usize..) {
                        Some(rest) => remaining = rest,
                        None => {
                            return Err(PacketError::Truncated {
                                layer: Tcp::name(),
                                need: len as usize,
                                have: remaining.len(),
                            })
                        }
                    },
                },
            }
        }
        Ok(())
    }

    /// Iterates over the option records, ending after an End-of-list.
    #[inline]
    pub fn iter(&self) -> TcpOptionsIterRef<'a> {
        TcpOptionsIterRef {
            bytes: self.bytes,
            curr_idx: 0,
            end_reached: false,
        }
    }

    /// The padding bytes after the option records.
    pub fn padding(&self) -> &'a [u8] {
        let mut iter = self.iter();
        while iter.next().is_some() {}
        iter.remaining()
    }
}

/// One raw option record yielded by [`TcpOptionsIterRef`].
#[derive(Clone, Copy, Debug)]
pub struct TcpOptionRef<'a> {
    bytes: &'a [u8],
}

impl<'a> TcpOptionRef<'a> {
    #[inline]
    pub fn kind(&self) -> u8 {
        self.bytes[0]
    }

    /// The record's length on the wire.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// The value bytes after the kind and length fields.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        match self.bytes[0] {
            0 | 1 => &[],
            _ => &self.bytes[2..],
        }
    }

    /// The decoded form of this record.
    #[inline]
    pub fn decode(&self) -> TcpOption {
        TcpOption::from_record(self.kind(), self.data())
    }
}

/// Iterator over the option records of a validated options region.
pub struct TcpOptionsIterRef<'a> {
    bytes: &'a [u8],
    curr_idx: usize,
    end_reached: bool,
}

impl<'a> TcpOptionsIterRef<'a> {
    /// The bytes after the last yielded record (padding once iteration has
    /// ended).
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.curr_idx..]
    }
}

impl<'a> Iterator for TcpOptionsIterRef<'a> {
    type Item = TcpOptionRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_reached {
            return None;
        }

        match self.bytes.get(self.curr_idx) {
            Some(&kind @ (0 | 1)) => {
                let record = &self.bytes[self.curr_idx..self.curr_idx + 1];
                self.curr_idx += 1;
                if kind == 0 {
                    self.end_reached = true;
                }
                Some(TcpOptionRef { bytes: record })
            }
            Some(_) => {
                let len = self.bytes[self.curr_idx + 1] as usize;
                let record = &self.bytes[self.curr_idx..self.curr_idx + len];
                self.curr_idx += len;
                Some(TcpOptionRef { bytes: record })
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits() {
        let mut flags = TcpFlags::new();
        flags.set_syn(true);
        flags.set_ack(true);
        assert!(flags.syn() && flags.ack() && !flags.fin());
        assert_eq!(flags.bits(), SYN_BIT | ACK_BIT);
        assert_eq!(TcpFlags::from(0xFFFF).bits(), 0x01FF);
    }

    #[test]
    fn parses_noop_padded_options() {
        let bytes = [0x01, 0x01, 0x02, 0x04, 0x05, 0xB4, 0x00];
        let options = TcpOptions::from_bytes(&bytes).unwrap();
        assert_eq!(
            options.options(),
            &[
                TcpOption::Noop,
                TcpOption::Noop,
                TcpOption::Mss(1460),
                TcpOption::Eool,
            ]
        );
    }

    #[test]
    fn options_round_trip() {
        let bytes = [
            0x02, 0x04, 0x05, 0xB4, // MSS 1460
            0x04, 0x02, // SACK permitted
            0x08, 0x0A, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, // timestamp
            0x01, 0x01, // padding as no-ops
        ];
        let options = TcpOptions::from_bytes(&bytes).unwrap();
        let mut out = Vec::new();
        options.to_bytes_extended(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn unknown_kind_is_a_value_not_an_error() {
        let bytes = [0xFE, 0x04, 0xAA, 0xBB];
        let options = TcpOptions::from_bytes(&bytes).unwrap();
        assert_eq!(
            options.options(),
            &[TcpOption::Unknown {
                kind: 0xFE,
                data: vec![0xAA, 0xBB]
            }]
        );
    }

    #[test]
    fn experimental_kind_is_opaque_by_default_and_rejected_in_strict_mode() {
        // Quick-Start Response (kind 27), 8 bytes.
        let bytes = [27, 0x08, 0, 0, 0, 0, 0, 0];
        let options = TcpOptions::from_bytes(&bytes).unwrap();
        assert!(matches!(
            options.options()[0],
            TcpOption::Experimental { kind: 27, .. }
        ));
        assert_eq!(
            TcpOptions::from_bytes_strict(&bytes),
            Err(PacketError::UnsupportedExperimental {
                feature: "experimental TCP option kind"
            })
        );
    }

    #[test]
    fn rejects_truncated_option() {
        let bytes = [0x02, 0x04, 0x05];
        assert!(matches!(
            TcpOptionsRef::validate(&bytes),
            Err(PacketError::Truncated { .. })
        ));
        let bytes = [0x02, 0x01];
        assert!(matches!(
            TcpOptionsRef::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }

    fn sample_tcp_syn() -> Vec<u8> {
        vec![
            0xC0, 0x00, 0x00, 0x50, // ports 49152 -> 80
            0x12, 0x34, 0x56, 0x78, // seq
            0x00, 0x00, 0x00, 0x00, // ack
            0x60, 0x02, 0x71, 0x10, // offset 6, SYN, window
            0x00, 0x00, 0x00, 0x00, // checksum, urgent
            0x02, 0x04, 0x05, 0xB4, // MSS 1460
        ]
    }

    #[test]
    fn parses_syn_with_mss() {
        let bytes = sample_tcp_syn();
        let tcp = Tcp::from_bytes(&bytes).unwrap();
        assert_eq!(tcp.sport(), 49152);
        assert_eq!(tcp.dport(), 80);
        assert_eq!(tcp.seq(), 0x12345678);
        assert!(tcp.flags().syn());
        assert!(!tcp.flags().ack());
        assert_eq!(tcp.data_offset(), 6);
        assert_eq!(tcp.options().options(), &[TcpOption::Mss(1460)]);
        assert_eq!(tcp.to_bytes(), bytes);
    }

    #[test]
    fn urgent_segments_still_expose_options() {
        let mut bytes = sample_tcp_syn();
        bytes[13] |= 0x20; // URG
        bytes[18..20].copy_from_slice(&4u16.to_be_bytes());
        let tcp = Tcp::from_bytes(&bytes).unwrap();
        assert!(tcp.flags().urg());
        assert_eq!(tcp.options().options(), &[TcpOption::Mss(1460)]);
    }

    #[test]
    fn rejects_small_data_offset() {
        let mut bytes = sample_tcp_syn();
        bytes[12] = 0x40; // offset 4
        assert!(matches!(
            TcpRef::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = sample_tcp_syn();
        match TcpRef::validate(&bytes[..22]) {
            Err(PacketError::Truncated { need, have, .. }) => {
                assert_eq!(need, 24);
                assert_eq!(have, 22);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn mutator_touches_only_its_field() {
        let mut bytes = sample_tcp_syn();
        let original = bytes.clone();
        let mut tcp = TcpMut::from_bytes(&mut bytes).unwrap();
        tcp.set_window(0x1000);
        assert_eq!(&bytes[..14], &original[..14]);
        assert_eq!(&bytes[14..16], &[0x10, 0x00]);
        assert_eq!(&bytes[16..], &original[16..]);
    }

    #[test]
    fn drda_magic_check() {
        assert!(looks_like_drda(&[0x00, 0x0A, 0xD0, 0x01, 0, 0, 0, 0, 0, 0]));
        assert!(!looks_like_drda(&[0x00, 0x0A, 0xD0])); // shorter than a DDM header
        assert!(!looks_like_drda(&[0x00, 0x0A, 0x00, 0x01, 0, 0, 0, 0, 0, 0]));
    }
}
