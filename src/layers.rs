// SPDX-License-Identifier: MIT OR Apache-2.0

//! The protocol layers implemented by this library.
//!
//! Every layer decodes just enough of its own header to locate the next
//! layer, then delegates to it: Ethernet dispatches on EtherType, the IP
//! layers on their protocol/next-header field, and so on down to an
//! application-layer byte run. A dispatch key the library does not recognize
//! is never an error--the payload is retained as a [`Raw`] layer so callers
//! can still inspect and round-trip it.
//!
//! Tightly related layers share a module: [`ip`] holds IPv4, IPv6 and the
//! IPv6 extension headers, [`icmp`] both ICMP generations, and so on.
//! [`traits`] holds the trait family every layer implements.

pub mod arp;
pub mod icmp;
pub mod igmp;
pub mod ip;
pub mod l2;
pub mod lldp;
pub mod pppoe;
pub mod tcp;
pub mod traits;
pub mod udp;

use crate::error::PacketError;
use crate::layers::traits::*;
use crate::segment::ByteSegment;

/// A raw layer composed of unstructured bytes.
///
/// `Raw` terminates every decode chain: it holds payload data whose protocol
/// the library does not recognize (or deliberately leaves to an external
/// decoder), preserving the bytes exactly so an unmodified packet serializes
/// back to its original form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raw {
    data: Vec<u8>,
}

impl Raw {
    /// Wraps a byte vector as a raw payload layer.
    #[inline]
    pub fn new(data: Vec<u8>) -> Self {
        Raw { data }
    }

    /// The contained bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the contained bytes.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl LayerName for Raw {
    #[inline]
    fn name() -> &'static str {
        "Raw"
    }
}

impl LayerLength for Raw {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }
}

impl ToBytes for Raw {
    #[inline]
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, _prev: Option<(LayerId, usize)>) {
        bytes.extend(&self.data);
    }
}

impl LayerObject for Raw {
    #[inline]
    fn layer_name(&self) -> &'static str {
        Self::name()
    }

    #[inline]
    fn clone_boxed(&self) -> Box<dyn LayerObject> {
        Box::new(self.clone())
    }

    fn describe(&self, _verbose: bool) -> String {
        format!("{} bytes", self.data.len())
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
        unreachable!("`Raw` layer cannot have a payload")
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

impl Validate for Raw {
    #[inline]
    fn validate_current_layer(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl FromBytes for Raw {
    #[inline]
    fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        Raw {
            data: Vec::from(bytes),
        }
    }
}

/// An immutable view of a [`Raw`] layer.
#[derive(Clone, Copy, Debug)]
pub struct RawRef<'a> {
    data: ByteSegment<'a>,
}

impl<'a> RawRef<'a> {
    /// The contained bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data.as_slice()
    }

    /// The segment this view reads from.
    #[inline]
    pub fn segment(&self) -> ByteSegment<'a> {
        self.data
    }
}

impl LayerName for RawRef<'_> {
    #[inline]
    fn name() -> &'static str {
        Raw::name()
    }
}

impl<'a> FromBytesRef<'a> for RawRef<'a> {
    #[inline]
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        RawRef {
            data: ByteSegment::new(bytes),
        }
    }
}

impl Validate for RawRef<'_> {
    #[inline]
    fn validate_current_layer(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }

    #[inline]
    fn validate_payload(_bytes: &[u8]) -> Result<(), PacketError> {
        Ok(())
    }
}

impl LayerOffset for RawRef<'_> {
    #[inline]
    fn payload_byte_index(_bytes: &[u8], _layer_type: LayerId) -> Option<usize> {
        None
    }
}

/// The link-layer framing of an ingress buffer handed to [`parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II frames.
    Ethernet,
    /// Cooked captures starting at an IPv4 header.
    Ipv4,
    /// Cooked captures starting at an IPv6 header.
    Ipv6,
}

/// Decodes a buffer into a layered packet, dispatching on the link-layer
/// framing and recursing through each layer's own dispatch field.
pub fn parse(link: LinkType, bytes: &[u8]) -> Result<Box<dyn LayerObject>, PacketError> {
    match link {
        LinkType::Ethernet => Ok(Box::new(l2::Ether::from_bytes(bytes)?)),
        LinkType::Ipv4 => Ok(Box::new(ip::Ipv4::from_bytes(bytes)?)),
        LinkType::Ipv6 => Ok(Box::new(ip::Ipv6::from_bytes(bytes)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips() {
        let bytes = [1u8, 2, 3, 4];
        let raw = Raw::from_bytes(&bytes).unwrap();
        assert_eq!(raw.to_bytes(), bytes);
        assert_eq!(raw.len(), 4);
        assert!(!raw.has_payload());
    }
}
