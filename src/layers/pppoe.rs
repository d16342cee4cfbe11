// SPDX-License-Identifier: MIT OR Apache-2.0

//! PPP over Ethernet (RFC 2516): session data and the discovery stage's tag
//! chain.

use crate::error::PacketError;
use crate::layers::traits::*;
use crate::layers::Raw;
use crate::segment::ByteSegment;
use crate::utils;

const PPPOE_HEADER_LEN: usize = 6;

/// Discovery-stage tag types.
pub const TAG_END_OF_LIST: u16 = 0x0000;
pub const TAG_SERVICE_NAME: u16 = 0x0101;
pub const TAG_AC_NAME: u16 = 0x0102;
pub const TAG_HOST_UNIQ: u16 = 0x0103;
pub const TAG_AC_COOKIE: u16 = 0x0104;
pub const TAG_RELAY_SESSION_ID: u16 = 0x0110;
pub const TAG_SERVICE_NAME_ERROR: u16 = 0x0201;
pub const TAG_AC_SYSTEM_ERROR: u16 = 0x0202;
pub const TAG_GENERIC_ERROR: u16 = 0x0203;

/// A PPPoE code: the discovery handshake stages plus session data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PppoeCode {
    SessionData,
    Padi,
    Pado,
    Padr,
    Pads,
    Padt,
    Unknown(u8),
}

impl PppoeCode {
    #[inline]
    pub fn code(&self) -> u8 {
        match self {
            PppoeCode::SessionData => 0x00,
            PppoeCode::Padi => 0x09,
            PppoeCode::Pado => 0x07,
            PppoeCode::Padr => 0x19,
            PppoeCode::Pads => 0x65,
            PppoeCode::Padt => 0xA7,
            PppoeCode::Unknown(code) => *code,
        }
    }
}

impl From<u8> for PppoeCode {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0x00 => PppoeCode::SessionData,
            0x09 => PppoeCode::Padi,
            0x07 => PppoeCode::Pado,
            0x19 => PppoeCode::Padr,
            0x65 => PppoeCode::Pads,
            0xA7 => PppoeCode::Padt,
            other => PppoeCode::Unknown(other),
        }
    }
}

/// A discovery-stage tag: `{type, length, value}` with 16-bit type and
/// length fields. Unknown types are carried opaquely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PppoeTag {
    tag_type: u16,
    value: Vec<u8>,
}

impl PppoeTag {
    pub fn new(tag_type: u16, value: Vec<u8>) -> Self {
        PppoeTag { tag_type, value }
    }

    pub fn service_name(name: &str) -> Self {
        PppoeTag {
            tag_type: TAG_SERVICE_NAME,
            value: name.as_bytes().to_vec(),
        }
    }

    pub fn host_uniq(data: Vec<u8>) -> Self {
        PppoeTag {
            tag_type: TAG_HOST_UNIQ,
            value: data,
        }
    }

    #[inline]
    pub fn tag_type(&self) -> u16 {
        self.tag_type
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        4 + self.value.len()
    }

    fn to_bytes_extended(&self, bytes: &mut Vec<u8>) {
        bytes.extend(self.tag_type.to_be_bytes());
        bytes.extend((self.value.len() as u16).to_be_bytes());
        bytes.extend(&self.value);
    }
}

/// A PPPoE packet: discovery stages carry a tag chain, session data carries
/// the 2-byte PPP protocol id and an opaque payload.
#[derive(Clone, Debug)]
pub struct Pppoe {
    code: PppoeCode,
    session_id: u16,
    tags: Vec<PppoeTag>,
    payload: Option<Box<dyn LayerObject>>,
}

impl Pppoe {
    /// A discovery initiation (PADI) carrying the given tags.
    pub fn padi(tags: Vec<PppoeTag>) -> Self {
        Pppoe {
            code: PppoeCode::Padi,
            session_id: 0,
            tags,
            payload: None,
        }
    }

    /// A session-stage packet for the given session.
    pub fn session(session_id: u16) -> Self {
        Pppoe {
            code: PppoeCode::SessionData,
            session_id,
            tags: Vec::new(),
            payload: None,
        }
    }

    #[inline]
    pub fn code(&self) -> PppoeCode {
        self.code
    }

    #[inline]
    pub fn set_code(&mut self, code: PppoeCode) {
        self.code = code;
    }

    #[inline]
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    #[inline]
    pub fn set_session_id(&mut self, session_id: u16) {
        self.session_id = session_id;
    }

    /// Whether this is a discovery-stage packet (any code but session data).
    #[inline]
    pub fn is_discovery(&self) -> bool {
        self.code != PppoeCode::SessionData
    }

    /// The discovery tag chain; empty for session-stage packets.
    #[inline]
    pub fn tags(&self) -> &[PppoeTag] {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Vec<PppoeTag> {
        &mut self.tags
    }

    fn tags_byte_len(&self) -> usize {
        self.tags.iter().map(PppoeTag::byte_len).sum()
    }
}

impl LayerName for Pppoe {
    #[inline]
    fn name() -> &'static str {
        "Pppoe"
    }
}

impl LayerLength for Pppoe {
    #[inline]
    fn len(&self) -> usize {
        PPPOE_HEADER_LEN + self.tags_byte_len() + self.payload.as_ref().map_or(0, |p| p.len())
    }
}

impl LayerObject for Pppoe {
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
                "{:?} session=0x{:04x} tags={}",
                self.code,
                self.session_id,
                self.tags.len()
            )
        } else {
            format!("{:?} session=0x{:04x}", self.code, self.session_id)
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

impl ToBytes for Pppoe {
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        let start = bytes.len();
        let length = self.tags_byte_len() + self.payload.as_ref().map_or(0, |p| p.len());
        bytes.push(0x11); // version 1, type 1
        bytes.push(self.code.code());
        bytes.extend(self.session_id.to_be_bytes());
        bytes.extend(u16::try_from(length).unwrap_or(u16::MAX).to_be_bytes());
        for tag in &self.tags {
            tag.to_bytes_extended(bytes);
        }
        if let Some(payload) = self.payload.as_ref() {
            payload.to_bytes_chksummed(bytes, Some((LayerId::of::<Pppoe>(), start)));
        }
    }
}

impl Validate for Pppoe {
    #[inline]
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        PppoeRef::validate_current_layer(bytes)
    }

    #[inline]
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError> {
        PppoeRef::validate_payload(bytes)
    }
}

impl FromBytes for Pppoe {
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        let view = PppoeRef::from_bytes_unchecked(bytes);
        let payload_segment = view.payload_segment();
        let mut layer = Pppoe {
            code: view.code(),
            session_id: view.session_id(),
            tags: Vec::new(),
            payload: None,
        };
        if layer.is_discovery() {
            let mut region = payload_segment.as_slice();
            while let Some(tag_type) = utils::to_array::<2>(region, 0).map(u16::from_be_bytes) {
                let len =
                    u16::from_be_bytes(utils::to_array(region, 2).unwrap_or([0, 0])) as usize;
                layer.tags.push(PppoeTag {
                    tag_type,
                    value: Vec::from(&region[4..4 + len]),
                });
                region = &region[4 + len..];
            }
        } else if !payload_segment.is_empty() {
            layer.payload = Some(Box::new(Raw::from_bytes_unchecked(
                payload_segment.as_slice(),
            )));
        }
        layer
    }
}

/// An immutable view of a PPPoE packet.
#[derive(Clone, Copy, Debug)]
pub struct PppoeRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> PppoeRef<'a> {
    #[inline]
    pub fn version(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in PppoeRef to retrieve Version field")
            >> 4
    }

    #[inline]
    pub fn ppp_type(&self) -> u8 {
        self.data
            .read_u8(0)
            .expect("insufficient bytes in PppoeRef to retrieve Type field")
            & 0x0F
    }

    #[inline]
    pub fn code(&self) -> PppoeCode {
        PppoeCode::from(
            self.data
                .read_u8(1)
                .expect("insufficient bytes in PppoeRef to retrieve Code field"),
        )
    }

    #[inline]
    pub fn session_id(&self) -> u16 {
        self.data
            .read_u16(2)
            .expect("insufficient bytes in PppoeRef to retrieve Session ID field")
    }

    /// The declared payload length (tags or session data).
    #[inline]
    pub fn payload_length(&self) -> u16 {
        self.data
            .read_u16(4)
            .expect("insufficient bytes in PppoeRef to retrieve Length field")
    }

    /// The PPP protocol id carried by a session-stage payload.
    #[inline]
    pub fn ppp_protocol(&self) -> u16 {
        self.data
            .read_u16(PPPOE_HEADER_LEN)
            .expect("insufficient bytes in PppoeRef to retrieve PPP Protocol field")
    }

    /// The fixed 6-byte header window.
    #[inline]
    pub fn header(&self) -> ByteSegment<'a> {
        self.data
            .clipped(PPPOE_HEADER_LEN)
            .expect("insufficient bytes in PppoeRef to retrieve header")
    }

    /// The payload window, clipped to the declared length.
    #[inline]
    pub fn payload_segment(&self) -> ByteSegment<'a> {
        let declared = PPPOE_HEADER_LEN + self.payload_length() as usize;
        let end = declared.min(self.data.len());
        self.data
            .slice(PPPOE_HEADER_LEN, end - PPPOE_HEADER_LEN)
            .expect("insufficient bytes in PppoeRef to retrieve payload")
    }
}

impl LayerName for PppoeRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Pppoe::name()
    }
}

impl<'a> FromBytesRef<'a> for PppoeRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        PppoeRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for PppoeRef<'_> {
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError> {
        if bytes.len() < PPPOE_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: Pppoe::name(),
                need: PPPOE_HEADER_LEN,
                have: bytes.len(),
            });
        }

        if bytes[0] != 0x11 {
            return Err(PacketError::Malformed {
                layer: Pppoe::name(),
                detail: "PPPoE version/type was not 1/1",
            });
        }

        let length = u16::from_be_bytes(bytes[4..6].try_into().unwrap()) as usize;
        if PPPOE_HEADER_LEN + length > bytes.len() {
            return Err(PacketError::Truncated {
                layer: Pppoe::name(),
                need: PPPOE_HEADER_LEN + length,
                have: bytes.len(),
            });
        }

        // Discovery stages carry a tag chain; walk its structure.
        if bytes[1] != 0 {
            let mut region = &bytes[PPPOE_HEADER_LEN..PPPOE_HEADER_LEN + length];
            while !region.is_empty() {
                if region.len() < 4 {
                    return Err(PacketError::Malformed {
                        layer: Pppoe::name(),
                        detail: "PPPoE tag header extends past the declared length",
                    });
                }
                let tag_len =
                    u16::from_be_bytes(region[2..4].try_into().unwrap()) as usize;
                if region.len() < 4 + tag_len {
                    return Err(PacketError::Malformed {
                        layer: Pppoe::name(),
                        detail: "PPPoE tag value extends past the declared length",
                    });
                }
                region = &region[4 + tag_len..];
            }
        }

        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for PppoeRef<'_> {
    #[inline]
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize> {
        if bytes.len() > PPPOE_HEADER_LEN && layer_type == LayerId::of::<Raw>() {
            Some(PPPOE_HEADER_LEN)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_tags_round_trip() {
        let padi = Pppoe::padi(vec![
            PppoeTag::service_name(""),
            PppoeTag::host_uniq(vec![0xDE, 0xAD]),
        ]);
        let bytes = padi.to_bytes();
        assert_eq!(bytes[1], 0x09);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 10);

        let parsed = Pppoe::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.code(), PppoeCode::Padi);
        assert_eq!(parsed.tags().len(), 2);
        assert_eq!(parsed.tags()[1].value(), &[0xDE, 0xAD]);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn session_payload_stays_raw() {
        let bytes = [
            0x11, 0x00, 0xBE, 0xEF, // session 0xBEEF
            0x00, 0x04, // length
            0x00, 0x21, 0x45, 0x00, // PPP protocol: IPv4, then data
        ];
        let view = PppoeRef::from_bytes(&bytes).unwrap();
        assert_eq!(view.session_id(), 0xBEEF);
        assert_eq!(view.ppp_protocol(), 0x0021);

        let parsed = Pppoe::from_bytes(&bytes).unwrap();
        assert!(!parsed.is_discovery());
        assert!(parsed.has_payload());
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn rejects_overrunning_tag() {
        let bytes = [
            0x11, 0x09, 0x00, 0x00, // PADI
            0x00, 0x06, // length 6
            0x01, 0x01, 0x00, 0x08, 0x00, 0x00, // tag claims 8 value bytes
        ];
        assert!(matches!(
            PppoeRef::validate(&bytes),
            Err(PacketError::Malformed { .. })
        ));
    }
}
