// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ethernet II framing and the link-layer oddballs carried directly in it.

use crate::error::PacketError;
use crate::layers::arp::{mac_string, Arp, ArpRef};
use crate::layers::ip::{Ipv4, Ipv4Ref, Ipv6, Ipv6Ref};
use crate::layers::lldp::{Lldp, LldpRef};
use crate::layers::pppoe::{Pppoe, PppoeRef};
use crate::layers::traits::*;
use crate::layers::{Raw, RawRef};
use crate::segment::{ByteSegment, ByteSegmentMut};

const ETHER_HEADER_LEN: usize = 14;

/// EtherTypes the dispatch table recognizes.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_WAKE_ON_LAN: u16 = 0x0842;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const ETHERTYPE_PPPOE_DISCOVERY: u16 = 0x8863;
pub const ETHERTYPE_PPPOE_SESSION: u16 = 0x8864;
pub const ETHERTYPE_LLDP: u16 = 0x88CC;

/// An Ethernet II frame.
#[derive(Clone, Debug)]
pub struct Ether {
    dst: [u8; 6],
    src: [u8; 6],
    eth_type: u16,
    payload: Option<Box<dyn LayerObject>>,
}

impl Ether {
    /// A frame between the given addresses with an empty payload.
    pub fn new(dst: [u8; 6], src: [u8; 6], eth_type: u16) -> Self {
        Ether {
            dst,
            src,
            eth_type,
            payload: None,
        }
    }

    #[inline]
    pub fn dst_mac(&self) -> [u8; 6] {
        self.dst
    }

    #[inline]
    pub fn set_dst_mac(&mut self, dst: [u8; 6]) {
        self.dst = dst;
    }

    #[inline]
    pub fn src_mac(&self) -> [u8; 6] {
        self.src
    }

    #[inline]
    pub fn set_src_mac(&mut self, src: [u8; 6]) {
        self.src = src;
    }

    /// The EtherType announced for the payload. Updated automatically when
    /// a known layer type is set as the payload.
    #[inline]
    pub fn eth_type(&self) -> u16 {
        self.eth_type
    }

    #[inline]
    pub fn set_eth_type(&mut self, eth_type: u16) {
        self.eth_type = eth_type;
    }

    fn eth_type_for(payload: &dyn LayerObject) -> Option<u16> {
        let any = payload.as_any();
        if any.is::<Ipv4>() {
            Some(ETHERTYPE_IPV4)
        } else if any.is::<Ipv6>() {
            Some(ETHERTYPE_IPV6)
        } else if any.is::<Arp>() {
            Some(ETHERTYPE_ARP)
        } else if let Some(pppoe) = any.downcast_ref::<Pppoe>() {
            Some(if pppoe.is_discovery() {
                ETHERTYPE_PPPOE_DISCOVERY
            } else {
                ETHERTYPE_PPPOE_SESSION
            })
        } else if any.is::<Lldp>() {
            Some(ETHERTYPE_LLDP)
        } else if any.is::<WakeOnLan>() {
            Some(ETHERTYPE_WAKE_ON_LAN)
        } else {
            None
        }
    }

    /// Decodes a payload according to the EtherType dispatch table. Unknown
    /// EtherTypes decode as `Raw`.
    fn payload_for(eth_type: u16, bytes: &[u8]) -> Box<dyn LayerObject> {
        match eth_type {
            ETHERTYPE_IPV4 => Box::new(Ipv4::from_bytes_unchecked(bytes)),
            ETHERTYPE_IPV6 => Box::new(Ipv6::from_bytes_unchecked(bytes)),
            ETHERTYPE_ARP => Box::new(Arp::from_bytes_unchecked(bytes)),
            ETHERTYPE_PPPOE_DISCOVERY | ETHERTYPE_PPPOE_SESSION => {
                Box::new(Pppoe::from_bytes_unchecked(bytes))
            }
            ETHERTYPE_LLDP => Box::new(Lldp::from_bytes_unchecked(bytes)),
            ETHERTYPE_WAKE_ON_LAN => Box::new(WakeOnLan::from_bytes_unchecked(bytes)),
            _ => Box::new(Raw::from_bytes_unchecked(bytes)),
        }
    }
}

impl LayerName for Ether {
    #[inline]
    fn name() -> &'static str {
        "Ether"
    }
}

impl LayerLength for Ether {
    #[inline]
    fn len(&self) -> usize {
        ETHER_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Ether {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, _verbose: bool) -> String {
        format!(
            "src={} dst={} type=0x{:04x}",
            mac_string(self.src),
            mac_string(self.dst),
            self.eth_type
        )
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
        Self::eth_type_for(payload).is_some() || payload.as_any().is::<Raw>()
    }

    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>) {
        if let Some(eth_type) = Self::eth_type_for(payload.as_ref()) {
            self.eth_type = eth_type;
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

impl ToBytes for Ether {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.extend(self.dst);
        bytes.extend(self.src);
        bytes.extend(self.eth_type.to_be_bytes());
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Ether>(), start)));
        }
    }
}

impl Validate for Ether {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        EtherRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        EtherRef::validate_payload(bytes)
    }
}

impl FromBytes for Ether {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = EtherRef::from_bytes_unchecked(bytes);
        let mut layer = Ether {
            dst: view.dst_mac(),
            src: view.src_mac(),
            eth_type: view.eth_type(),
            payload: None,
        };
        let payload = view.payload_segment();
        if !payload.is_empty() {
            layer.payload = Some(Self::payload_for(layer.eth_type, payload.as_slice()));
        }
        layer
    }
}

/// An immutable view of an Ethernet II frame.
#[derive(Clone, Copy, Debug)]
pub struct EtherRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> EtherRef<'a> {
    #[inline]
    pub fn dst_mac(&self) -> [u8; 6] {
        self.data
            .read_mac(0)
            .expect("insufficient bytes in EtherRef to retrieve Destination MAC Address field")
    }

    #[inline]
    pub fn src_mac(&self) -> [u8; 6] {
        self.data
            .read_mac(6)
            .expect("insufficient bytes in EtherRef to retrieve Source MAC Address field")
    }

    #[inline]
    pub fn eth_type(&self) -> u16 {
        self.data
            .read_u16(12)
            .expect("insufficient bytes in EtherRef to retrieve EtherType field")
    }

    /// The fixed 14-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(ETHER_HEADER_LEN)
            .expect("insufficient bytes in EtherRef to retrieve header")
    }

    /// The payload window after the header.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        self.header().encapsulated()
    }
}

impl LayerName for EtherRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Ether::name()
    }
}

impl<'a> FromBytesRef<'a> for EtherRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        EtherRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for EtherRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < ETHER_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Ether::name(),
                need: ETHER_HEADER_LEN,
                have: bytes.len(),
            });
        }
        Ok(())
    }

    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        let view = EtherRef::from_bytes_unchecked(bytes);
        let payload = view.payload_segment();
        if payload.is_empty() {
            return Ok(());
        }
        match view.eth_type() {
            ETHERTYPE_IPV4 => Ipv4Ref::validate(payload.as_slice()),
            ETHERTYPE_IPV6 => Ipv6Ref::validate(payload.as_slice()),
            ETHERTYPE_ARP => ArpRef::validate(payload.as_slice()),
            ETHERTYPE_PPPOE_DISCOVERY | ETHERTYPE_PPPOE_SESSION => {
                PppoeRef::validate(payload.as_slice())
            }
            ETHERTYPE_LLDP => LldpRef::validate(payload.as_slice()),
            ETHERTYPE_WAKE_ON_LAN => WakeOnLanRef::validate(payload.as_slice()),
            _ => RawRef::validate(payload.as_slice()),
        }
    }
}

impl LayerOffset for EtherRef<'_> {
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() < ETHER_HEADER_LEN {
            return None;
        }
        let eth_type = u16::from_be_bytes([bytes[12], bytes[13]]);
        let rest = &bytes[ETHER_HEADER_LEN..];
        let index = match eth_type {
            ETHERTYPE_IPV4 if layer_type == LayerId::of::<Ipv4>() => Some(0),
            ETHERTYPE_IPV4 => Ipv4Ref::payload_byte_index(rest, layer_type),
            ETHERTYPE_IPV6 if layer_type == LayerId::of::<Ipv6>() => Some(0),
            ETHERTYPE_IPV6 => Ipv6Ref::payload_byte_index(rest, layer_type),
            ETHERTYPE_ARP if layer_type == LayerId::of::<Arp>() => Some(0),
            ETHERTYPE_PPPOE_DISCOVERY | ETHERTYPE_PPPOE_SESSION
                if layer_type == LayerId::of::<Pppoe>() =>
            {
                Some(0)
            }
            ETHERTYPE_LLDP if layer_type == LayerId::of::<Lldp>() => Some(0),
            ETHERTYPE_WAKE_ON_LAN if layer_type == LayerId::of::<WakeOnLan>() => Some(0),
            _ if layer_type == LayerId::of::<Raw>() => Some(0),
            _ => None,
        };
        index.map(|idx| ETHER_HEADER_LEN + idx)
    }
}

/// An in-place mutator over an Ethernet II header.
#[derive(Debug)]
pub struct EtherMut<'a> {
    data: ByteSegmentMut<'a>,
}

impl<'a> EtherMut<'a> {
    #[inline]
    pub fn dst_mac(&self) -> [u8; 6] {
        self.data
            .read_array::<6>(0)
            .expect("insufficient bytes in EtherMut to retrieve Destination MAC Address field")
    }

    #[inline]
    pub fn set_dst_mac(&mut self, dst: [u8; 6]) {
        self.data
            .write_mac(0, dst)
            .expect("insufficient bytes in EtherMut to set Destination MAC Address field");
    }

    #[inline]
    pub fn src_mac(&self) -> [u8; 6] {
        self.data
            .read_array::<6>(6)
            .expect("insufficient bytes in EtherMut to retrieve Source MAC Address field")
    }

    #[inline]
    pub fn set_src_mac(&mut self, src: [u8; 6]) {
        self.data
            .write_mac(6, src)
            .expect("insufficient bytes in EtherMut to set Source MAC Address field");
    }

    #[inline]
    pub fn eth_type(&self) -> u16 {
        self.data
            .read_u16(12)
            .expect("insufficient bytes in EtherMut to retrieve EtherType field")
    }

    #[inline]
    pub fn set_eth_type(&mut self, eth_type: u16) {
        self.data
            .write_u16(12, eth_type)
            .expect("insufficient bytes in EtherMut to set EtherType field");
    }

    /// Reborrows as an immutable view.
    #[inline]
    pub fn as_ref(&self) -> EtherRef<'_> {
        EtherRef {
            data: self.data.as_segment(),
        }
    }
}

impl LayerName for EtherMut<'_> {
    #[inline]
    fn name() -> &'static str {
        Ether::name()
    }
}

impl Validate for EtherMut<'_> {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        EtherRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        EtherRef::validate_payload(bytes)
    }
}

impl<'a> FromBytesMut<'a> for EtherMut<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self {
        EtherMut {
            data: ByteSegmentMut::new(bytes),
        }
    }
}

const WOL_SYNC_LEN: usize = 6;
const WOL_BODY_LEN: usize = WOL_SYNC_LEN + 16 * 6;

/// A Wake-on-LAN magic packet: six `0xFF` sync bytes, sixteen repetitions
/// of the target MAC, and an optional 4- or 6-byte password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WakeOnLan {
    target: [u8; 6],
    password: Vec<u8>,
}

impl WakeOnLan {
    /// A magic packet for the given target with no password.
    pub fn new(target: [u8; 6]) -> Self {
        WakeOnLan {
            target,
            password: Vec::new(),
        }
    }

    #[inline]
    pub fn target(&self) -> [u8; 6] {
        self.target
    }

    #[inline]
    pub fn set_target(&mut self, target: [u8; 6]) {
        self.target = target;
    }

    #[inline]
    pub fn password(&self) -> &[u8] {
        &self.password
    }

    /// Sets the password; the protocol allows none, 4 or 6 bytes.
    pub fn set_password(&mut self, password: &[u8]) -> Result<(), PacketError> {
        if !matches!(password.len(), 0 | 4 | 6) {
            return Err(PacketError::ValueOutOfRange {
                field: "WakeOnLan password length",
                max: 6,
                got: password.len(),
            });
        }
        self.password = Vec::from(password);
        Ok(())
    }
}

impl LayerName for WakeOnLan {
    #[inline]
    fn name() -> &'static str {
        "WakeOnLan"
    }
}

impl LayerLength for WakeOnLan {
    #[inline]
    fn len(&self) -> usize {
        WOL_BODY_LEN + self.password.len()
    }
}

impl LayerObject for WakeOnLan {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, _verbose: bool) -> String {
        format!("target={}", mac_string(self.target))
    }

    #[inline]
    fn payload(&self) -> Option<&dyn LayerObject> {
        None
    }

    #[inline]
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject> {
        None
    }

    #[inline]
    fn can_set_payload(&self, _payload: &dyn LayerObject) -> bool {
        false
    }

    #[inline]
    fn set_payload_unchecked(&mut self, _payload: Box<dyn LayerObject>) {
        unreachable!("`WakeOnLan` layer cannot have a payload")
    }

    #[inline]
    fn has_payload(&self) -> bool {
        false
    }

    #[inline]
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>> {
        None
    }
}

impl ToBytes for WakeOnLan {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        bytes.extend([0xFF; WOL_SYNC_LEN]);
        for _ in 0..16 {
            bytes.extend(self.target);
        }
        bytes.extend(&self.password);
    }
}

impl Validate for WakeOnLan {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        WakeOnLanRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        WakeOnLanRef::validate_payload(bytes)
    }
}

impl FromBytes for WakeOnLan {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = WakeOnLanRef::from_bytes_unchecked(bytes);
        WakeOnLan {
            target: view.target(),
            password: Vec::from(view.password()),
        }
    }
}

/// An immutable view of a Wake-on-LAN magic packet.
#[derive(Clone, Copy, Debug)]
pub struct WakeOnLanRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> WakeOnLanRef<'a> {
    #[inline]
    pub fn target(&self) -> [u8; 6] {
        self.data
            .read_mac(WOL_SYNC_LEN)
            .expect("insufficient bytes in WakeOnLanRef to retrieve Target MAC field")
    }

    #[inline]
    pub fn password(&self) -> &'a [u8] {
        &self.data.as_slice()[WOL_BODY_LEN.min(self.data.len())..]
    }
}

impl LayerName for WakeOnLanRef<'_> {
    #[inline]
    fn name() -> &'static str {
        WakeOnLan::name()
    }
}

impl<'a> FromBytesRef<'a> for WakeOnLanRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        WakeOnLanRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for WakeOnLanRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < WOL_BODY_LEN {
            return Err(PacketError::Truncated {
                layer: WakeOnLan::name(),
                need: WOL_BODY_LEN,
                have: bytes.len(),
            });
        }
        if bytes[..WOL_SYNC_LEN] != [0xFF; WOL_SYNC_LEN] {
            return Err(PacketError::Malformed {
                layer: WakeOnLan::name(),
                detail: "magic packet does not open with six 0xFF sync bytes",
            });
        }
        let target = &bytes[WOL_SYNC_LEN..WOL_SYNC_LEN + 6];
        for repetition in 1..16 {
            let at = WOL_SYNC_LEN + repetition * 6;
            if &bytes[at..at + 6] != target {
                return Err(PacketError::Malformed {
                    layer: WakeOnLan::name(),
                    detail: "target MAC repetitions disagree",
                });
            }
        }
        if !matches!(bytes.len() - WOL_BODY_LEN, 0 | 4 | 6) {
            return Err(PacketError::Malformed {
                layer: WakeOnLan::name(),
                detail: "password must be absent, 4 or 6 bytes",
            });
        }
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for WakeOnLanRef<'_> {
    #[inline]
    fn payload_byte_index(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LinkType;

    #[test]
    fn frame_dispatches_on_eth_type() {
        let mut bytes = vec![
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x08, 0x06, // ARP
        ];
        bytes.extend(
            Arp::request(
                [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
                "10.0.0.1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
            )
            .to_bytes(),
        );

        let frame = Ether::from_bytes(&bytes).unwrap();
        assert_eq!(frame.eth_type(), ETHERTYPE_ARP);
        assert!(frame.get_layer::<Arp>().is_some());
        assert_eq!(frame.to_bytes(), bytes);
    }

    #[test]
    fn unknown_eth_type_keeps_raw_payload() {
        let mut bytes = vec![0u8; ETHER_HEADER_LEN];
        bytes[12..14].copy_from_slice(&0x22F0u16.to_be_bytes());
        bytes.extend([1, 2, 3]);
        let frame = Ether::from_bytes(&bytes).unwrap();
        assert!(frame.get_layer::<Raw>().is_some());
        assert_eq!(frame.to_bytes(), bytes);
    }

    #[test]
    fn parse_entry_point() {
        let mut bytes = vec![0u8; ETHER_HEADER_LEN];
        bytes[12..14].copy_from_slice(&ETHERTYPE_WAKE_ON_LAN.to_be_bytes());
        let wol = WakeOnLan::new([0xAA; 6]);
        bytes.extend(wol.to_bytes());

        let packet = crate::layers::parse(LinkType::Ethernet, &bytes).unwrap();
        let wol = packet.get_layer::<WakeOnLan>().expect("WOL layer expected");
        assert_eq!(wol.target(), [0xAA; 6]);
    }

    #[test]
    fn wol_rejects_disagreeing_repetitions() {
        let mut bytes = WakeOnLan::new([0xAA; 6]).to_bytes();
        bytes[WOL_SYNC_LEN + 13] ^= 0x01;
        assert!(matches!(
            WakeOnLanRef::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }

    #[test]
    fn mutator_rewrites_macs() {
        let mut bytes = vec![0u8; ETHER_HEADER_LEN + 2];
        bytes[12..14].copy_from_slice(&0x22F0u16.to_be_bytes());
        let mut frame = EtherMut::from_bytes(&mut bytes).unwrap();
        frame.set_src_mac([1, 2, 3, 4, 5, 6]);
        frame.set_dst_mac([6, 5, 4, 3, 2, 1]);
        assert_eq!(frame.as_ref().src_mac(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(&bytes[0..6], &[6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[6..12], &[1, 2, 3, 4, 5, 6]);
    }
}
