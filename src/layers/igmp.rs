// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Internet Group Management Protocol, version 2 (RFC 2236).

use crate::checksum;
use crate::error::PacketError;
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::ByteSegment;
use crate::utils;

use std::net::Ipv4Addr;

/// The fixed length of an IGMPv2 header. Coincidentally equal to the UDP
/// header length, but defined on its own terms.
pub const IGMP_HEADER_LEN: usize = 8;

/// An IGMPv2 message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgmpType {
    MembershipQuery,
    MembershipReportV1,
    MembershipReportV2,
    LeaveGroup,
    Unknown(u8),
}

impl IgmpType {
    #[inline]
    pub fn type_number(&self) -> u8 {
        match self {
            IgmpType::MembershipQuery => 0x11,
            IgmpType::MembershipReportV1 => 0x12,
            IgmpType::MembershipReportV2 => 0x16,
            IgmpType::LeaveGroup => 0x17,
            IgmpType::Unknown(number) => *number,
        }
    }
}

impl From<u8> for IgmpType {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0x11 => IgmpType::MembershipQuery,
            0x12 => IgmpType::MembershipReportV1,
            0x16 => IgmpType::MembershipReportV2,
            0x17 => IgmpType::LeaveGroup,
            other => IgmpType::Unknown(other),
        }
    }
}

/// An IGMPv2 message.
#[derive(Clone, Debug)]
pub struct Igmpv2 {
    msg_type: IgmpType,
    max_resp_time: u8,
    chksum: Option<u16>,
    group: Ipv4Addr,
    payload: Option<Box<dyn LayerObject>>,
}

impl Igmpv2 {
    /// A membership report for the given group.
    pub fn membership_report(group: Ipv4Addr) -> Self {
        Igmpv2 {
            msg_type: IgmpType::MembershipReportV2,
            max_resp_time: 0,
            chksum: None,
            group,
            payload: None,
        }
    }

    /// A membership query for the given group with the given maximum
    /// response time (in 0.1 second units).
    pub fn membership_query(group: Ipv4Addr, max_resp_time: u8) -> Self {
        Igmpv2 {
            msg_type: IgmpType::MembershipQuery,
            max_resp_time,
            chksum: None,
            group,
            payload: None,
        }
    }

    #[inline]
    pub fn msg_type(&self) -> IgmpType {
        self.msg_type
    }

    #[inline]
    pub fn set_msg_type(&mut self, msg_type: IgmpType) {
        self.msg_type = msg_type;
    }

    /// Maximum response time in 0.1 second units.
    #[inline]
    pub fn max_resp_time(&self) -> u8 {
        self.max_resp_time
    }

    #[inline]
    pub fn set_max_resp_time(&mut self, max_resp_time: u8) {
        self.max_resp_time = max_resp_time;
    }

    /// Maximum response time in seconds.
    #[inline]
    pub fn max_resp_time_secs(&self) -> f32 {
        self.max_resp_time as f32 / 10.0
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

    #[inline]
    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    #[inline]
    pub fn set_group(&mut self, group: Ipv4Addr) {
        self.group = group;
    }
}

impl LayerName for Igmpv2 {
    #[inline]
    fn name() -> &'static str {
        "Igmpv2"
    }
}

impl LayerLength for Igmpv2 {
    #[inline]
    fn len(&self) -> usize {
        IGMP_HEADER_LEN + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Igmpv2 {
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
                "{:?} group={} max_resp={:.1}s",
                self.msg_type,
                self.group,
                self.max_resp_time_secs()
            )
        } else {
            format!("{:?} group={}", self.msg_type, self.group)
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

impl ToBytes for Igmpv2 {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        bytes.push(self.msg_type.type_number());
        bytes.push(self.max_resp_time);
        bytes.extend(self.chksum.unwrap_or(0).to_be_bytes());
        bytes.extend(self.group.octets());
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Igmpv2>(), start)));
        }

        if self.chksum.is_none() {
            // The checksum covers the whole IGMP message, no pseudo-header.
            let ck = checksum::checksum(&bytes[start..]);
            let field: &mut [u8; 2] = utils::get_mut_array(bytes, start + 2)
                .expect("IGMP checksum field missing from serialized message");
            *field = ck.to_be_bytes();
        }
    }
}

impl Validate for Igmpv2 {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        Igmpv2Ref::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        Igmpv2Ref::validate_payload(bytes)
    }
}

impl FromBytes for Igmpv2 {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = Igmpv2Ref::from_bytes_unchecked(bytes);
        let mut layer = Igmpv2 {
            msg_type: view.msg_type(),
            max_resp_time: view.max_resp_time(),
            chksum: Some(view.chksum()),
            group: view.group(),
            payload: None,
        };
        if bytes.len() > IGMP_HEADER_LEN {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                &bytes[IGMP_HEADER_LEN..],
            )));
        }
        layer
    }
}

/// An immutable view of an IGMPv2 message.
#[derive(Clone, Copy, Debug)]
pub struct Igmpv2Ref<'a> {
    data: ByteSegment<'a>,
}

impl<'a> Igmpv2Ref<'a> {
    #[inline]
    pub fn msg_type(&self) -> IgmpType {
        IgmpType::from(
            self.data
                .read_u8(0)
                .expect("insufficient bytes in Igmpv2Ref to retrieve Type field"),
        )
    }

    /// Maximum response time in 0.1 second units.
    #[inline]
    pub fn max_resp_time(&self) -> u8 {
        self.data
            .read_u8(1)
            .expect("insufficient bytes in Igmpv2Ref to retrieve Max Response Time field")
    }

    /// The checksum as the unsigned 16-bit value it is on the wire.
    #[inline]
    pub fn chksum(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in Igmpv2Ref to retrieve Checksum field")
    }

    #[inline]
    pub fn group(&self) -> Ipv4Addr {
        self.data
            .read_ipv4(4)
            .expect("insufficient bytes in Igmpv2Ref to retrieve Group Address field")
    }

    /// The fixed 8-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(IGMP_HEADER_LEN)
            .expect("insufficient bytes in Igmpv2Ref to retrieve header")
    }

    /// Whether the checksum folds to all-ones over the whole message.
    #[inline]
    pub fn chksum_valid(&self) -> bool {
        checksum::verify(self.data.as_slice())
    }
}

impl LayerName for Igmpv2Ref<'_> {
    #[inline]
    fn name() -> &'static str {
        Igmpv2::name()
    }
}

impl<'a> FromBytesRef<'a> for Igmpv2Ref<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Igmpv2Ref {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for Igmpv2Ref<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < IGMP_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Igmpv2::name(),
                need: IGMP_HEADER_LEN,
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

impl LayerOffset for Igmpv2Ref<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() > IGMP_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(IGMP_HEADER_LEN)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_membership_report() {
        // Type 0x16, max response 100 (10.0s), checksum, group 224.0.0.1.
        let bytes = [0x16, 0x64, 0x09, 0x9A, 0xE0, 0x00, 0x00, 0x01];
        let igmp = Igmpv2::from_bytes(&bytes).unwrap();
        assert_eq!(igmp.msg_type(), IgmpType::MembershipReportV2);
        assert_eq!(igmp.max_resp_time_secs(), 10.0);
        assert_eq!(igmp.group(), Ipv4Addr::new(224, 0, 0, 1));
        assert!(Igmpv2Ref::from_bytes(&bytes).unwrap().chksum_valid());
        assert_eq!(igmp.to_bytes(), bytes);
    }

    #[test]
    fn synthesized_report_checksums_itself() {
        let report = Igmpv2::membership_report(Ipv4Addr::new(239, 1, 2, 3));
        let bytes = report.to_bytes();
        assert_eq!(bytes.len(), IGMP_HEADER_LEN);
        assert!(checksum::verify(&bytes));
        let parsed = Igmpv2::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.group(), Ipv4Addr::new(239, 1, 2, 3));
    }

    #[test]
    fn rejects_short_message() {
        assert!(matches!(
            Igmpv2Ref::validate(&[0x16, 0x00, 0x00]),
            Err(PacketError::Truncated { need: 8, have: 3, .. })
        ));
    }

    #[test]
    fn unknown_type_is_a_value() {
        let mut bytes = [0x42, 0x00, 0x00, 0x00, 0xE0, 0x00, 0x00, 0x02];
        let ck = checksum::checksum(&bytes);
        bytes[2..4].copy_from_slice(&ck.to_be_bytes());
        let igmp = Igmpv2::from_bytes(&bytes).unwrap();
        assert_eq!(igmp.msg_type(), IgmpType::Unknown(0x42));
        assert_eq!(igmp.to_bytes(), bytes);
    }
}
