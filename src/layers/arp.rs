// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Address Resolution Protocol (RFC 826), for the Ethernet/IPv4 pairing.

use crate::error::PacketError;
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::ByteSegment;

use std::net::Ipv4Addr;

const ARP_HEADER_LEN: usize = 28;

const HTYPE_ETHERNET: u16 = 1;
const PTYPE_IPV4: u16 = 0x0800;

/// An ARP operation code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Unknown(u16),
}

impl ArpOperation {
    #[inline]
    pub fn code(&self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Unknown(code) => *code,
        }
    }
}

impl From<u16> for ArpOperation {
    #[inline]
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            other => ArpOperation::Unknown(other),
        }
    }
}

/// An ARP packet mapping IPv4 addresses to Ethernet hardware addresses.
#[derive(Clone, Debug)]
pub struct Arp {
    oper: ArpOperation,
    sender_hw: [u8; 6],
    sender_ip: Ipv4Addr,
    target_hw: [u8; 6],
    target_ip: Ipv4Addr,
    payload: Option<Box<dyn LayerObject>>,
}

impl Arp {
    /// A request asking who holds `target_ip`.
    pub fn request(sender_hw: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Arp {
            oper: ArpOperation::Request,
            sender_hw,
            sender_ip,
            target_hw: [0; 6],
            target_ip,
            payload: None,
        }
    }

    /// A reply announcing that `sender_ip` is held by `sender_hw`.
    pub fn reply(
        sender_hw: [u8; 6],
        sender_ip: Ipv4Addr,
        target_hw: [u8; 6],
        target_ip: Ipv4Addr,
    ) -> Self {
        Arp {
            oper: ArpOperation::Reply,
            sender_hw,
            sender_ip,
            target_hw,
            target_ip,
            payload: None,
        }
    }

    #[inline]
    pub fn operation(&self) -> ArpOperation {
        self.oper
    }

    #[inline]
    pub fn set_operation(&mut self, oper: ArpOperation) {
        self.oper = oper;
    }

    #[inline]
    pub fn sender_hw(&self) -> [u8; 6] {
        self.sender_hw
    }

    #[inline]
    pub fn set_sender_hw(&mut self, hw: [u8; 6]) {
        self.sender_hw = hw;
    }

    #[inline]
    pub fn sender_ip(&self) -> Ipv4Addr {
        self.sender_ip
    }

    #[inline]
    pub fn set_sender_ip(&mut self, ip: Ipv4Addr) {
        self.sender_ip = ip;
    }

    #[inline]
    pub fn target_hw(&self) -> [u8; 6] {
        self.target_hw
    }

    #[inline]
    pub fn set_target_hw(&mut self, hw: [u8; 6]) {
        self.target_hw = hw;
    }

    #[inline]
    pub fn target_ip(&self) -> Ipv4Addr {
        self.target_ip
    }

    #[inline]
    pub fn set_target_ip(&mut self, ip: Ipv4Addr) {
        self.target_ip = ip;
    }
}

impl LayerName for Arp {
    #[inline]
    fn name() -> &'static str {
        "Arp"
    }
}

impl LayerLength for Arp {
    #[inline]
    fn len(&self) -> usize {
        ARP_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Arp {
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
                "{:?} sender={}/{} target={}/{}",
                self.oper,
                self.sender_ip,
                mac_string(self.sender_hw),
                self.target_ip,
                mac_string(self.target_hw),
            )
        } else {
            format!("{:?} {} -> {}", self.oper, self.sender_ip, self.target_ip)
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

pub(crate) fn mac_string(mac: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

impl ToBytes for Arp {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.extend(HTYPE_ETHERNET.to_be_bytes());
        bytes.extend(PTYPE_IPV4.to_be_bytes());
        bytes.push(6);
        bytes.push(4);
        bytes.extend(self.oper.code().to_be_bytes());
        bytes.extend(self.sender_hw);
        bytes.extend(self.sender_ip.octets());
        bytes.extend(self.target_hw);
        bytes.extend(self.target_ip.octets());
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Arp>(), start)));
        }
    }
}

impl Validate for Arp {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        ArpRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        ArpRef::validate_payload(bytes)
    }
}

impl FromBytes for Arp {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = ArpRef::from_bytes_unchecked(bytes);
        let mut layer = Arp {
            oper: view.operation(),
            sender_hw: view.sender_hw(),
            sender_ip: view.sender_ip(),
            target_hw: view.target_hw(),
            target_ip: view.target_ip(),
            payload: None,
        };
        if bytes.len() > ARP_HEADER_LEN {
            // Ethernet frame padding rides along as a raw payload.
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                &bytes[ARP_HEADER_LEN..],
            )));
        }
        layer
    }
}

/// An immutable view of an ARP packet.
#[derive(Clone, Copy, Debug)]
pub struct ArpRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> ArpRef<'a> {
    #[inline]
    pub fn hardware_type(&self) -> u16 {
        self.data
            .read_u16(0)
            .expect("insufficient bytes in ArpRef to retrieve Hardware Type field")
    }

    #[inline]
    pub fn protocol_type(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in ArpRef to retrieve Protocol Type field")
    }

    #[inline]
    pub fn operation(&self) -> ArpOperation {
        ArpOperation::from(
            self.data
                .read_u16(6)
                .expect("insufficient bytes in ArpRef to retrieve Operation field"),
        )
    }

    #[inline]
    pub fn sender_hw(&self) -> [u8; 6] {
        self.data
            .read_mac(8)
            .expect("insufficient bytes in ArpRef to retrieve Sender Hardware Address field")
    }

    #[inline]
    pub fn sender_ip(&self) -> Ipv4Addr {
        self.data
            .read_ipv4(14)
            .expect("insufficient bytes in ArpRef to retrieve Sender Protocol Address field")
    }

    #[inline]
    pub fn target_hw(&self) -> [u8; 6] {
        self.data
            .read_mac(18)
            .expect("insufficient bytes in ArpRef to retrieve Target Hardware Address field")
    }

    #[inline]
    pub fn target_ip(&self) -> Ipv4Addr {
        self.data
            .read_ipv4(24)
            .expect("insufficient bytes in ArpRef to retrieve Target Protocol Address field")
    }

    /// The fixed 28-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(ARP_HEADER_LEN)
            .expect("insufficient bytes in ArpRef to retrieve header")
    }
}

impl LayerName for ArpRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Arp::name()
    }
}

impl<'a> FromBytesRef<'a> for ArpRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        ArpRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for ArpRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < ARP_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Arp::name(),
                need: ARP_HEADER_LEN,
                have: bytes.len(),
            });
        }

        let htype = u16::from_be_bytes(bytes[0..2].try_into().unwrap());
        let ptype = u16::from_be_bytes(bytes[2..4].try_into().unwrap());
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 {
            return Err(PacketError::Malformed {
                layer: Arp::name(),
                detail: "only Ethernet/IPv4 ARP is modeled",
            });
        }
        if bytes[4] != 6 || bytes[5] != 4 {
            return Err(PacketError::Malformed {
                layer: Arp::name(),
                detail: "hardware/protocol address lengths contradict Ethernet/IPv4",
            });
        }
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for ArpRef<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() > ARP_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(ARP_HEADER_LEN)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let arp = Arp::request(
            [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            Ipv4Addr::new(192, 168, 0, 1),
            Ipv4Addr::new(192, 168, 0, 2),
        );
        let bytes = arp.to_bytes();
        assert_eq!(bytes.len(), ARP_HEADER_LEN);

        let parsed = Arp::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.operation(), ArpOperation::Request);
        assert_eq!(parsed.sender_ip(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(parsed.target_hw(), [0; 6]);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn rejects_non_ethernet_arp() {
        let mut bytes = Arp::request([0; 6], Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
            .to_bytes();
        bytes[1] = 6; // hardware type: IEEE 802
        assert!(matches!(
            ArpRef::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }

    #[test]
    fn padding_is_preserved() {
        let mut bytes = Arp::request([0; 6], Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED)
            .to_bytes();
        bytes.extend([0u8; 18]); // frame padded to the Ethernet minimum
        let parsed = Arp::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.to_bytes(), bytes);
    }
}
