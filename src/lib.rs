// SPDX-License-Identifier: MIT OR Apache-2.0

//! A library for decoding, constructing and modifying layered network
//! packets in place.
//!
//! `pktseg` presents typed accessors onto the protocol headers stacked
//! inside a byte buffer--link layer, internet layer, transport and
//! application-layer fragments--without copying the buffer. Mutation writes
//! back through the same views with correct endianness, layout and checksum
//! semantics.
//!
//! # Decoding
//!
//! [`parse`] wraps an ingress buffer and dispatches on the link-layer type;
//! each layer decodes just enough of its header to find the next one and
//! recurses. Dispatch keys the library does not recognize are values, not
//! errors: the payload is kept as a [`Raw`] layer.
//!
//! ```
//! use pktseg::prelude::*;
//! use pktseg::layers::tcp::Tcp;
//!
//! # fn example(buf: &[u8]) -> Result<(), pktseg::error::PacketError> {
//! let packet = pktseg::parse(LinkType::Ethernet, buf)?;
//! if let Some(tcp) = packet.get_layer::<Tcp>() {
//!     println!("{} -> {}", tcp.sport(), tcp.dport());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For read-heavy paths the `Ref` view types ([`Ipv4Ref`], [`TcpRef`], ...)
//! read every field straight from the buffer through a [`ByteSegment`]
//! window, allocating nothing.
//!
//! # Mutation
//!
//! Fixed-size fields are rewritten in place through the `Mut` views
//! ([`Ipv4Mut`], [`TcpMut`], ...). Checksums are never recomputed behind the
//! caller's back: mutate, then assign `set_chksum(compute_chksum(..))`.
//! Length-changing mutation (TCP options, LLDP TLV values) goes through the
//! owned layer types, which rebuild the buffer on serialization with every
//! length prefix rewritten in the same pass.
//!
//! An unmodified packet always serializes back byte-for-byte:
//! `parse(b)?.to_bytes() == b`.
//!
//! [`Raw`]: crate::layers::Raw
//! [`parse`]: crate::layers::parse
//! [`ByteSegment`]: crate::segment::ByteSegment
//! [`Ipv4Ref`]: crate::layers::ip::Ipv4Ref
//! [`TcpRef`]: crate::layers::tcp::TcpRef
//! [`Ipv4Mut`]: crate::layers::ip::Ipv4Mut
//! [`TcpMut`]: crate::layers::tcp::TcpMut

#![allow(clippy::len_without_is_empty)]

pub mod checksum;
pub mod error;
pub mod layers;
pub mod prelude;
pub mod segment;
pub mod utils;

pub use layers::parse;
