// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Link Layer Discovery Protocol (IEEE 802.1AB) and its TLV chain.
//!
//! Each TLV packs a 7-bit type and a 9-bit length into a 2-byte header,
//! followed by `length` value bytes; the chain terminates at the
//! End-of-LLDPDU sentinel. The length prefix is the single source of truth:
//! readers trust it, and every setter that changes a value's size derives
//! the new prefix from the value during serialization, so prefix and value
//! can never be observed out of sync.

use crate::error::PacketError;
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::ByteSegment;

use bitflags::bitflags;

/// The LLDP multicast destination (nearest bridge).
pub const LLDP_MULTICAST: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E];

/// The protocol maximum for a ManagementAddress object identifier.
pub const LLDP_OID_MAX_LEN: usize = 128;

/// The protocol maximum for a management address value.
pub const LLDP_MGMT_ADDR_MAX_LEN: usize = 31;

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;
const TLV_PORT_DESCRIPTION: u8 = 4;
const TLV_SYSTEM_NAME: u8 = 5;
const TLV_SYSTEM_DESCRIPTION: u8 = 6;
const TLV_CAPABILITIES: u8 = 7;
const TLV_MANAGEMENT_ADDRESS: u8 = 8;
const TLV_ORG_SPECIFIC: u8 = 127;

bitflags! {
    /// The system capabilities bitmap carried by the Capabilities TLV.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LldpCapabilities: u16 {
        const OTHER = 0x0001;
        const REPEATER = 0x0002;
        const BRIDGE = 0x0004;
        const WLAN_ACCESS_POINT = 0x0008;
        const ROUTER = 0x0010;
        const TELEPHONE = 0x0020;
        const DOCSIS = 0x0040;
        const STATION_ONLY = 0x0080;
    }
}

/// The ManagementAddress TLV body: an address (subtype plus value), the
/// interface it lives on, and an optional object identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagementAddress {
    addr_subtype: u8,
    addr: Vec<u8>,
    if_subtype: u8,
    if_number: u32,
    oid: Vec<u8>,
}

impl ManagementAddress {
    /// A management address with no object identifier.
    pub fn new(addr_subtype: u8, addr: Vec<u8>, if_subtype: u8, if_number: u32) -> Result<Self, PacketError> {
        if addr.len() > LLDP_MGMT_ADDR_MAX_LEN {
            return Err(PacketError::ValueOutOfRange {
                field: "Lldp management address length",
                max: LLDP_MGMT_ADDR_MAX_LEN,
                got: addr.len(),
            });
        }
        Ok(ManagementAddress {
            addr_subtype,
            addr,
            if_subtype,
            if_number,
            oid: Vec::new(),
        })
    }

    #[inline]
    pub fn addr_subtype(&self) -> u8 {
        self.addr_subtype
    }

    #[inline]
    pub fn addr(&self) -> &[u8] {
        &self.addr
    }

    #[inline]
    pub fn if_subtype(&self) -> u8 {
        self.if_subtype
    }

    #[inline]
    pub fn if_number(&self) -> u32 {
        self.if_number
    }

    #[inline]
    pub fn set_if_number(&mut self, if_number: u32) {
        self.if_number = if_number;
    }

    #[inline]
    pub fn oid(&self) -> &[u8] {
        &self.oid
    }

    /// The value of the OID length prefix.
    #[inline]
    pub fn oid_len(&self) -> usize {
        self.oid.len()
    }

    /// Replaces the object identifier. Rejected before any mutation if the
    /// new value exceeds the protocol maximum of 128 bytes.
    pub fn set_oid(&mut self, oid: &[u8]) -> Result<(), PacketError> {
        if oid.len() > LLDP_OID_MAX_LEN {
            return Err(PacketError::ValueOutOfRange {
                field: "Lldp management OID length",
                max: LLDP_OID_MAX_LEN,
                got: oid.len(),
            });
        }
        self.oid = Vec::from(oid);
        Ok(())
    }

    fn byte_len(&self) -> usize {
        8 + self.addr.len() + self.oid.len()
    }

    fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        bytes.push((1 + self.addr.len()) as u8);
        bytes.push(self.addr_subtype);
        bytes.extend(&self.addr);
        bytes.push(self.if_subtype);
        bytes.extend(self.if_number.to_be_bytes());
        bytes.push(self.oid.len() as u8);
        bytes.extend(&self.oid);
    }

    /// Decodes a ManagementAddress body, or `None` if the inner length
    /// prefixes contradict the value bytes.
    fn from_value(value: &[u8]) -> Option<Self> {
        let addr_string_len = *value.first()? as usize;
        let addr_len = addr_string_len.checked_sub(1)?;
        let addr_subtype = *value.get(1)?;
        let addr = value.get(2..2 + addr_len)?;
        let rest = value.get(2 + addr_len..)?;
        let if_subtype = *rest.first()?;
        let if_number = u32::from_be_bytes(rest.get(1..5)?.try_into().ok()?);
        let oid_len = *rest.get(5)? as usize;
        let oid = rest.get(6..6 + oid_len)?;
        if rest.len() != 6 + oid_len {
            return None;
        }
        Some(ManagementAddress {
            addr_subtype,
            addr: Vec::from(addr),
            if_subtype,
            if_number,
            oid: Vec::from(oid),
        })
    }
}

/// A single LLDP TLV. Types the library does not model, and modeled types
/// whose inner structure contradicts their value bytes, are carried as
/// [`Unknown`](LldpTlv::Unknown) so any capture round-trips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LldpTlv {
    /// End of LLDPDU (type 0, empty value).
    End,
    /// Chassis identifier (type 1).
    ChassisId { subtype: u8, id: Vec<u8> },
    /// Port identifier (type 2).
    PortId { subtype: u8, id: Vec<u8> },
    /// Time to live in seconds (type 3).
    Ttl(u16),
    /// Port description (type 4).
    PortDescription(Vec<u8>),
    /// System name (type 5).
    SystemName(Vec<u8>),
    /// System description (type 6).
    SystemDescription(Vec<u8>),
    /// System capabilities: supported and enabled bitmaps (type 7).
    Capabilities {
        capabilities: LldpCapabilities,
        enabled: LldpCapabilities,
    },
    /// Management address (type 8).
    ManagementAddress(ManagementAddress),
    /// Organizationally specific (type 127): OUI, subtype and opaque data.
    OrgSpecific {
        oui: [u8; 3],
        subtype: u8,
        data: Vec<u8>,
    },
    /// Any other type, carried opaquely.
    Unknown { tlv_type: u8, data: Vec<u8> },
}

impl LldpTlv {
    /// The TLV's 7-bit type number.
    pub fn tlv_type(&self) -> u8 {
        match self {
            LldpTlv::End => TLV_END,
            LldpTlv::ChassisId { .. } => TLV_CHASSIS_ID,
            LldpTlv::PortId { .. } => TLV_PORT_ID,
            LldpTlv::Ttl(_) => TLV_TTL,
            LldpTlv::PortDescription(_) => TLV_PORT_DESCRIPTION,
            LldpTlv::SystemName(_) => TLV_SYSTEM_NAME,
            LldpTlv::SystemDescription(_) => TLV_SYSTEM_DESCRIPTION,
            LldpTlv::Capabilities { .. } => TLV_CAPABILITIES,
            LldpTlv::ManagementAddress(_) => TLV_MANAGEMENT_ADDRESS,
            LldpTlv::OrgSpecific { .. } => TLV_ORG_SPECIFIC,
            LldpTlv::Unknown { tlv_type, .. } => *tlv_type,
        }
    }

    /// The TLV's value length (the 9-bit length field).
    pub fn value_len(&self) -> usize {
        match self {
            LldpTlv::End => 0,
            LldpTlv::ChassisId { id, .. } | LldpTlv::PortId { id, .. } => 1 + id.len(),
            LldpTlv::Ttl(_) => 2,
            LldpTlv::PortDescription(text)
            | LldpTlv::SystemName(text)
            | LldpTlv::SystemDescription(text) => text.len(),
            LldpTlv::Capabilities { .. } => 4,
            LldpTlv::ManagementAddress(addr) => addr.byte_len(),
            LldpTlv::OrgSpecific { data, .. } => 4 + data.len(),
            LldpTlv::Unknown { data, .. } => data.len(),
        }
    }

    /// The TLV's full length on the wire, header included.
    #[inline]
    pub fn byte_len(&self) -> usize {
        2 + self.value_len()
    }

    /// Serializes the TLV, the length prefix derived from the value.
    pub fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        let header = ((self.tlv_type() as u16) << 9) | (self.value_len() as u16);
        bytes.extend(header.to_be_bytes());
        match self {
            LldpTlv::End => (),
            LldpTlv::ChassisId { subtype, id } | LldpTlv::PortId { subtype, id } => {
                bytes.push(*subtype);
                bytes.extend(id);
            }
            LldpTlv::Ttl(seconds) => bytes.extend(seconds.to_be_bytes()),
            LldpTlv::PortDescription(text)
            | LldpTlv::SystemName(text)
            | LldpTlv::SystemDescription(text) => bytes.extend(text),
            LldpTlv::Capabilities {
                capabilities,
                enabled,
            } => {
                bytes.extend(capabilities.bits().to_be_bytes());
                bytes.extend(enabled.bits().to_be_bytes());
            }
            LldpTlv::ManagementAddress(addr) => addr.to_bytes_extended(bytes),
            LldpTlv::OrgSpecific { oui, subtype, data } => {
                bytes.extend(oui);
                bytes.push(*subtype);
                bytes.extend(data);
            }
            LldpTlv::Unknown { data, .. } => bytes.extend(data),
        }
    }

    /// Decodes one already-validated TLV record.
    fn from_record(tlv_type: u8, value: &[u8]) -> Self {
        let opaque = || LldpTlv::Unknown {
            tlv_type,
            data: Vec::from(value),
        };
        match tlv_type {
            TLV_END if value.is_empty() => LldpTlv::End,
            TLV_CHASSIS_ID if !value.is_empty() => LldpTlv::ChassisId {
                subtype: value[0],
                id: Vec::from(&value[1..]),
            },
            TLV_PORT_ID if !value.is_empty() => LldpTlv::PortId {
                subtype: value[0],
                id: Vec::from(&value[1..]),
            },
            TLV_TTL if value.len() == 2 => {
                LldpTlv::Ttl(u16::from_be_bytes(value.try_into().unwrap()))
            }
            TLV_PORT_DESCRIPTION => LldpTlv::PortDescription(Vec::from(value)),
            TLV_SYSTEM_NAME => LldpTlv::SystemName(Vec::from(value)),
            TLV_SYSTEM_DESCRIPTION => LldpTlv::SystemDescription(Vec::from(value)),
            TLV_CAPABILITIES if value.len() == 4 => LldpTlv::Capabilities {
                capabilities: LldpCapabilities::from_bits_retain(u16::from_be_bytes(
                    value[..2].try_into().unwrap(),
                )),
                enabled: LldpCapabilities::from_bits_retain(u16::from_be_bytes(
                    value[2..].try_into().unwrap(),
                )),
            },
            TLV_MANAGEMENT_ADDRESS => match ManagementAddress::from_value(value) {
                Some(addr) => LldpTlv::ManagementAddress(addr),
                None => opaque(),
            },
            TLV_ORG_SPECIFIC if value.len() >= 4 => LldpTlv::OrgSpecific {
                oui: value[..3].try_into().unwrap(),
                subtype: value[3],
                data: Vec::from(&value[4..]),
            },
            _ => opaque(),
        }
    }
}

/// An LLDP data unit: a TLV chain terminated by End-of-LLDPDU, with any
/// frame padding after the sentinel riding along as a raw payload.
#[derive(Clone, Debug)]
pub struct Lldp {
    tlvs: Vec<LldpTlv>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Lldp {
    /// The mandatory opening sequence: chassis id, port id and TTL,
    /// terminated by End-of-LLDPDU.
    pub fn new(chassis_mac: [u8; 6], port_name: &[u8], ttl_secs: u16) -> Self {
        Lldp {
            tlvs: vec![
                LldpTlv::ChassisId {
                    subtype: 4, // MAC address
                    id: chassis_mac.to_vec(),
                },
                LldpTlv::PortId {
                    subtype: 5, // interface name
                    id: port_name.to_vec(),
                },
                LldpTlv::Ttl(ttl_secs),
                LldpTlv::End,
            ],
            payload: None,
        }
    }

    #[inline]
    pub fn tlvs(&self) -> &[LldpTlv] {
        &self.tlvs
    }

    #[inline]
    pub fn tlvs_mut(&mut self) -> &mut Vec<LldpTlv> {
        &mut self.tlvs
    }

    /// Inserts a TLV just before the End-of-LLDPDU sentinel (or appends if
    /// the chain carries none).
    pub fn push_tlv(&mut self, tlv: LldpTlv) {
        let at = self
            .tlvs
            .iter()
            .position(|t| matches!(t, LldpTlv::End))
            .unwrap_or(self.tlvs.len());
        self.tlvs.insert(at, tlv);
    }

    /// The first TTL TLV's value, if present.
    pub fn ttl(&self) -> Option<u16> {
        self.tlvs.iter().find_map(|tlv| match tlv {
            LldpTlv::Ttl(seconds) => Some(*seconds),
            _ => None,
        })
    }

    /// The first chassis id TLV's value, if present.
    pub fn chassis_id(&self) -> Option<(u8, &[u8])> {
        self.tlvs.iter().find_map(|tlv| match tlv {
            LldpTlv::ChassisId { subtype, id } => Some((*subtype, id.as_slice())),
            _ => None,
        })
    }

    /// The first system name TLV's value, if present.
    pub fn system_name(&self) -> Option<&[u8]> {
        self.tlvs.iter().find_map(|tlv| match tlv {
            LldpTlv::SystemName(name) => Some(name.as_slice()),
            _ => None,
        })
    }

    /// The first management address TLV's body, if present.
    pub fn management_address(&self) -> Option<&ManagementAddress> {
        self.tlvs.iter().find_map(|tlv| match tlv {
            LldpTlv::ManagementAddress(addr) => Some(addr),
            _ => None,
        })
    }

    /// Mutable access to the first management address TLV's body. Resizing
    /// its OID relocates every trailing TLV at the next serialization, the
    /// length prefix updated in the same pass.
    pub fn management_address_mut(&mut self) -> Option<&mut ManagementAddress> {
        self.tlvs.iter_mut().find_map(|tlv| match tlv {
            LldpTlv::ManagementAddress(addr) => Some(addr),
            _ => None,
        })
    }

    fn tlvs_byte_len(&self) -> usize {
        self.tlvs.iter().map(LldpTlv::byte_len).sum()
    }
}

impl LayerName for Lldp {
    #[inline]
    fn name() -> &'static str {
        "Lldp"
    }
}

impl LayerLength for Lldp {
    #[inline]
    fn len(&self) -> usize {
        self.tlvs_byte_len() + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Lldp {
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
            let types: Vec<u8> = self.tlvs.iter().map(LldpTlv::tlv_type).collect();
            format!("{} TLVs, types {:?}", self.tlvs.len(), types)
        } else {
            format!("{} TLVs", self.tlvs.len())
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
        // Frame padding only.
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

impl ToBytes for Lldp {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        for tlv in &self.tlvs {
            tlv.to_bytes_extended(bytes);
        }
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Lldp>(), start)));
        }
    }
}

impl Validate for Lldp {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        LldpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        LldpRef::validate_payload(bytes)
    }
}

impl FromBytes for Lldp {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = LldpRef::from_bytes_unchecked(bytes);
        let mut layer = Lldp {
            tlvs: Vec::new(),
            payload: None,
        };
        let mut iter = view.iter();
        for tlv in iter.by_ref() {
            layer.tlvs.push(tlv.decode());
        }
        let trailing = iter.remaining();
        if !trailing.is_empty() {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(trailing)));
        }
        layer
    }
}

/// An immutable view of an LLDP data unit.
#[derive(Clone, Copy, Debug)]
pub struct LldpRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> LldpRef<'a> {
    /// Iterates over the TLV records, ending after an End-of-LLDPDU.
    #[inline]
    pub fn iter(&self) -> LldpTlvsIterRef<'a> {
        LldpTlvsIterRef {
            bytes: self.data.as_slice(),
            curr_idx: 0,
            end_reached: false,
        }
    }

    /// The segment this view reads from.
    #[inline]
    pub fn segment(&self) -> ByteSegment<'a> {
        self.data
    }
}

impl LayerName for LldpRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Lldp::name()
    }
}

impl<'a> FromBytesRef<'a> for LldpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        LldpRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for LldpRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        let mut idx = 0;
        loop {
            let Some(header) = bytes.get(idx..idx + 2) else {
                // A chain without the End sentinel simply stops at the
                // region's edge.
                if idx == bytes.len() {
                    return Ok(());
                }
                return Err(PacketError::Truncated {
                    layer: Lldp::name(),
                    need: idx + 2,
                    have: bytes.len(),
                });
            };
            let header = u16::from_be_bytes(header.try_into().unwrap());
            let tlv_type = (header >> 9) as u8;
            let value_len = (header & 0x01FF) as usize;
            if bytes.len() < idx + 2 + value_len {
                return Err(PacketError::Truncated {
                    layer: Lldp::name(),
                    need: idx + 2 + value_len,
                    have: bytes.len(),
                });
            }
            idx += 2 + value_len;
            if tlv_type == TLV_END {
                return Ok(());
            }
        }
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for LldpRef<'_> {
    #[inline]
    fn payload_byte_index(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

/// One raw TLV record yielded by [`LldpTlvsIterRef`].
#[derive(Clone, Copy, Debug)]
pub struct LldpTlvRef<'a> {
    bytes: &'a [u8],
}

impl<'a> LldpTlvRef<'a> {
    /// The TLV's 7-bit type number.
    #[inline]
    pub fn tlv_type(&self) -> u8 {
        (u16::from_be_bytes([self.bytes[0], self.bytes[1]]) >> 9) as u8
    }

    /// The TLV's 9-bit value length.
    #[inline]
    pub fn value_len(&self) -> usize {
        (u16::from_be_bytes([self.bytes[0], self.bytes[1]]) & 0x01FF) as usize
    }

    /// The value bytes after the 2-byte header.
    #[inline]
    pub fn value(&self) -> &'a [u8] {
        &self.bytes[2..]
    }

    /// The decoded form of this record.
    #[inline]
    pub fn decode(&self) -> LldpTlv {
        LldpTlv::from_record(self.tlv_type(), self.value())
    }
}

/// Iterator over the TLV records of a validated LLDPDU.
pub struct LldpTlvsIterRef<'a> {
    bytes: &'a [u8],
    curr_idx: usize,
    end_reached: bool,
}

impl<'a> LldpTlvsIterRef<'a> {
    /// The bytes after the last yielded record (frame padding once the End
    /// sentinel has been seen).
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.curr_idx..]
    }
}

impl<'a> Iterator for LldpTlvsIterRef<'a> {
    type Item = LldpTlvRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_reached {
            return None;
        }

        let header = self.bytes.get(self.curr_idx..self.curr_idx + 2)?;
        let header = u16::from_be_bytes(header.try_into().unwrap());
        let tlv_type = (header >> 9) as u8;
        let value_len = (header & 0x01FF) as usize;
        let record = &self.bytes[self.curr_idx..self.curr_idx + 2 + value_len];
        self.curr_idx += 2 + value_len;
        if tlv_type == TLV_END {
            self.end_reached = true;
        }
        Some(LldpTlvRef { bytes: record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lldpdu() -> Lldp {
        let mut lldp = Lldp::new(
            [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            b"eth0",
            120,
        );
        lldp.push_tlv(LldpTlv::SystemName(b"switch-7".to_vec()));
        lldp.push_tlv(LldpTlv::ManagementAddress(
            ManagementAddress::new(1, vec![192, 168, 0, 1], 2, 7).unwrap(),
        ));
        lldp.push_tlv(LldpTlv::Capabilities {
            capabilities: LldpCapabilities::BRIDGE | LldpCapabilities::ROUTER,
            enabled: LldpCapabilities::BRIDGE,
        });
        lldp
    }

    #[test]
    fn tlv_chain_round_trips() {
        let bytes = sample_lldpdu().to_bytes();
        let parsed = Lldp::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.chassis_id().unwrap().1, &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(parsed.ttl(), Some(120));
        assert_eq!(parsed.system_name().unwrap(), b"switch-7");
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn seven_nine_bit_packing() {
        // Type 5 (system name), length 260 needs the length field's high bit.
        let name = vec![b'x'; 260];
        let tlv = LldpTlv::SystemName(name.clone());
        let mut bytes = Vec::new();
        tlv.to_bytes_extended(&mut bytes);
        assert_eq!(bytes[0], (5 << 1) | 1); // type in the top 7 bits
        assert_eq!(bytes[1], (260 & 0xFF) as u8);
        let parsed = Lldp::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.system_name().unwrap(), name.as_slice());
    }

    #[test]
    fn oid_resize_relocates_trailing_tlvs() {
        let mut lldp = sample_lldpdu();
        let before = lldp.to_bytes();

        let oid = b"1.3.6.1.4.1";
        lldp.management_address_mut()
            .unwrap()
            .set_oid(oid)
            .unwrap();
        let after = lldp.to_bytes();

        assert_eq!(lldp.management_address().unwrap().oid_len(), 11);
        assert_eq!(after.len(), before.len() + 11);

        // Everything before the management TLV's value is unchanged except
        // its length prefix; everything after the OID is relocated intact.
        let mgmt_start = {
            let view = LldpRef::from_bytes_unchecked(&before);
            let mut idx = 0;
            for tlv in view.iter() {
                if tlv.tlv_type() == TLV_MANAGEMENT_ADDRESS {
                    break;
                }
                idx += 2 + tlv.value_len();
            }
            idx
        };
        assert_eq!(&after[..mgmt_start], &before[..mgmt_start]);

        let old_value_len =
            (u16::from_be_bytes([before[mgmt_start], before[mgmt_start + 1]]) & 0x1FF) as usize;
        let new_value_len =
            (u16::from_be_bytes([after[mgmt_start], after[mgmt_start + 1]]) & 0x1FF) as usize;
        assert_eq!(new_value_len, old_value_len + 11);

        // The trailing TLVs follow the grown value, byte for byte.
        let old_tail = &before[mgmt_start + 2 + old_value_len..];
        let new_tail = &after[mgmt_start + 2 + new_value_len..];
        assert_eq!(old_tail, new_tail);

        // The grown value ends with the OID, its length prefix in front.
        let value = &after[mgmt_start + 2..mgmt_start + 2 + new_value_len];
        assert_eq!(value[value.len() - 12], 11);
        assert_eq!(&value[value.len() - 11..], oid);

        // A reparse of the mutated buffer sees the same structure.
        let reparsed = Lldp::from_bytes(&after).unwrap();
        assert_eq!(reparsed.management_address().unwrap().oid(), oid);
        assert_eq!(reparsed.tlvs().len(), lldp.tlvs().len());
    }

    #[test]
    fn oid_maximum_is_enforced_before_mutation() {
        let mut addr = ManagementAddress::new(1, vec![10, 0, 0, 1], 2, 1).unwrap();
        addr.set_oid(&[0x2B; 12]).unwrap();
        let err = addr.set_oid(&[0; 129]).unwrap_err();
        assert_eq!(
            err,
            PacketError::ValueOutOfRange {
                field: "Lldp management OID length",
                max: 128,
                got: 129
            }
        );
        // The rejected setter left the previous value in place.
        assert_eq!(addr.oid(), &[0x2B; 12]);
    }

    #[test]
    fn truncated_tlv_is_rejected() {
        let mut bytes = sample_lldpdu().to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            LldpRef::validate(&bytes),
            Err(PacketError::Truncated { .. })
        ));
    }

    #[test]
    fn unknown_tlv_type_is_opaque() {
        // Type 9 (unmodeled), 2 value bytes, then End.
        let bytes = [0x12, 0x02, 0xAA, 0xBB, 0x00, 0x00];
        let lldp = Lldp::from_bytes(&bytes).unwrap();
        assert_eq!(
            lldp.tlvs()[0],
            LldpTlv::Unknown {
                tlv_type: 9,
                data: vec![0xAA, 0xBB]
            }
        );
        assert_eq!(lldp.to_bytes(), bytes);
    }
}
