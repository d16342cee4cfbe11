// SPDX-License-Identifier: MIT OR Apache-2.0

//! The trait family shared by every protocol layer.
//!
//! Layers come in up to three variants: an owned type (e.g. `Tcp`) holding
//! decoded fields and an optional boxed payload layer, an immutable view
//! (`TcpRef`) reading every field straight out of a [`ByteSegment`], and for
//! the high-churn protocols a mutable view (`TcpMut`) writing fields in
//! place. The traits here give the three variants a common vocabulary:
//! validation at the parse boundary, conversion from bytes, serialization
//! with checksum chaining, and payload traversal.
//!
//! [`ByteSegment`]: crate::segment::ByteSegment

use crate::error::PacketError;
use core::any;
use core::fmt::Debug;

/// A unique identifier for a layer type, shared between its owned, `Ref` and
/// `Mut` variants by convention (each variant reports the owned type's id).
pub type LayerId = any::TypeId;

/// An extension to [`any::Any`] for retrieving `dyn Any` references.
pub trait AsAny: any::Any {
    fn as_any(&self) -> &dyn any::Any;
    fn as_any_mut(&mut self) -> &mut dyn any::Any;
}

impl<T: any::Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn any::Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn any::Any {
        self
    }
}

/// The name of a layer type, for diagnostics and error reporting.
pub trait LayerName {
    /// The layer's name. `Ref` and `Mut` variants report the same name as
    /// their owned type.
    fn name() -> &'static str;
}

/// The current length in bytes of a layer, including its payload chain.
pub trait LayerLength {
    /// The length in bytes of the layer's header plus its entire payload.
    fn len(&self) -> usize;
}

/// Serialization of an owned layer into its wire representation.
///
/// Layers that carry an Internet checksum receive `prev`: the [`LayerId`]
/// and starting byte index of the layer serialized immediately before them
/// in `bytes`. Transport layers use it to locate the enclosing IP header's
/// already-serialized address words when an unassigned checksum has to be
/// computed; IPv6 extension headers forward the `prev` they were given so
/// the pseudo-header always reflects the IP layer, never the extension.
pub trait ToBytes {
    /// Appends the layer's byte representation to `bytes`, computing any
    /// unassigned checksums against the previous layer's bytes.
    fn to_bytes_chksummed(&self, bytes: &mut Vec<u8>, prev: Option<(LayerId, usize)>);

    /// Serializes the layer (and its payload chain) into a fresh vector.
    #[inline]
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.to_bytes_chksummed(&mut bytes, None);
        bytes
    }
}

/// An object-safe owned layer: a decoded header plus an optional payload,
/// which is either another decoded layer or a `Raw` byte run.
pub trait LayerObject: AsAny + Debug + LayerLength + ToBytes {
    /// The name of this layer, equal to its type's [`LayerName::name`].
    fn layer_name(&self) -> &'static str;

    /// Clones this layer, payload chain included, behind a fresh box.
    fn clone_boxed(&self) -> Box<dyn LayerObject>;

    /// A one-line field summary of this layer alone (no payload). With
    /// `verbose`, includes every decoded field rather than the highlights.
    fn describe(&self, verbose: bool) -> String;

    /// The layer's payload, if any.
    fn payload(&self) -> Option<&dyn LayerObject>;

    /// Mutable access to the layer's payload, if any.
    fn payload_mut(&mut self) -> Option<&mut dyn LayerObject>;

    /// Whether `payload` is an acceptable payload layer for this one.
    fn can_set_payload(&self, payload: &dyn LayerObject) -> bool;

    /// Replaces the payload without checking compatibility. Serialization
    /// may later produce nonsensical dispatch fields if the payload is not
    /// a permitted layer.
    fn set_payload_unchecked(&mut self, payload: Box<dyn LayerObject>);

    fn has_payload(&self) -> bool;

    /// Removes and returns the payload, if any.
    fn remove_payload(&mut self) -> Option<Box<dyn LayerObject>>;

    /// Replaces the payload, rejecting layers this one cannot encapsulate.
    fn set_payload(&mut self, payload: Box<dyn LayerObject>) -> Result<(), PacketError> {
        if !self.can_set_payload(payload.as_ref()) {
            return Err(PacketError::InvalidPayload {
                layer: self.layer_name(),
            });
        }
        self.set_payload_unchecked(payload);
        Ok(())
    }

    /// Recursively stringifies this layer and its payload chain, one line
    /// per layer. Diagnostic only; the output is not stable. Side-effect
    /// free.
    ///
    /// The `color` flag is accepted for interface compatibility with
    /// colorizing frontends; this renderer itself emits plain text either
    /// way, leaving terminal styling to whatever formatter the caller
    /// drives with the output.
    fn format(&self, verbose: bool, _color: bool) -> String {
        let mut out = String::new();
        let mut line = |name: &str, body: String| {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&body);
            out.push('\n');
        };

        line(self.layer_name(), self.describe(verbose));
        let mut next = self.payload();
        while let Some(layer) = next {
            line(layer.layer_name(), layer.describe(verbose));
            next = layer.payload();
        }
        out
    }
}

impl Clone for Box<dyn LayerObject> {
    #[inline]
    fn clone(&self) -> Self {
        self.as_ref().clone_boxed()
    }
}

/// Downcast traversal through an owned layer's payload chain.
pub trait LayerIndex: LayerObject {
    /// A reference to the first layer of type `T` in the chain, the base
    /// layer included.
    fn get_layer<T: LayerObject>(&self) -> Option<&T> {
        if let Some(t) = self.as_any().downcast_ref::<T>() {
            return Some(t);
        }

        let mut next = self.payload();
        while let Some(layer) = next {
            if let Some(t) = layer.as_any().downcast_ref::<T>() {
                return Some(t);
            }
            next = layer.payload();
        }

        None
    }

    /// A mutable reference to the first layer of type `T` in the chain, the
    /// base layer included.
    fn get_layer_mut<T: LayerObject>(&mut self) -> Option<&mut T> {
        if AsAny::as_any(&*self).downcast_ref::<T>().is_some() {
            return self.as_any_mut().downcast_mut::<T>();
        }

        let mut next = self.payload_mut();
        let mut layer;
        loop {
            match next {
                None => return None,
                Some(l) => {
                    layer = l;
                    if AsAny::as_any(&*layer).downcast_ref::<T>().is_some() {
                        break;
                    }
                    next = layer.payload_mut();
                }
            }
        }

        layer.as_any_mut().downcast_mut::<T>()
    }
}

impl<L: LayerObject + ?Sized> LayerIndex for L {}

/// Validation of a byte slice against the expected structure of a layer.
///
/// Errors observe the clipping contract: a [`Truncated`] error means an
/// attempt to build the layer from these bytes could index out of bounds and
/// the unchecked constructors must not be used; a [`Malformed`] error means
/// a field value is structurally wrong but the bytes are safe to view.
///
/// [`Truncated`]: PacketError::Truncated
/// [`Malformed`]: PacketError::Malformed
pub trait Validate {
    /// Validates the layer's own header and the payload chain beneath it.
    fn validate(bytes: &[u8]) -> Result<(), PacketError> {
        Self::validate_current_layer(bytes)?;
        Self::validate_payload(bytes)
    }

    /// Validates this layer's header alone.
    fn validate_current_layer(bytes: &[u8]) -> Result<(), PacketError>;

    /// Validates the payload chain. `bytes` spans the current layer and its
    /// payload both.
    fn validate_payload(bytes: &[u8]) -> Result<(), PacketError>;
}

/// Conversion of a byte slice into an owned layer.
pub trait FromBytes: Sized + Validate {
    /// Decodes an owned layer (payload chain included) from `bytes`.
    #[inline]
    fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    /// Decodes without validating.
    ///
    /// # Panics
    ///
    /// May panic if `validate()` would have returned [`PacketError::Truncated`]
    /// for these bytes.
    fn from_bytes_unchecked(bytes: &[u8]) -> Self;
}

/// Conversion of a byte slice into an immutable layer view.
pub trait FromBytesRef<'a>: Sized + Validate {
    /// Wraps `bytes` in a validated view.
    #[inline]
    fn from_bytes(bytes: &'a [u8]) -> Result<Self, PacketError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    /// Wraps without validating.
    ///
    /// # Panics
    ///
    /// Getters on the resulting view may panic if `validate()` would have
    /// returned [`PacketError::Truncated`] for these bytes.
    fn from_bytes_unchecked(bytes: &'a [u8]) -> Self;
}

/// Conversion of a mutable byte slice into an in-place mutator view.
pub trait FromBytesMut<'a>: Sized + Validate {
    /// Wraps `bytes` in a validated mutator.
    #[inline]
    fn from_bytes(bytes: &'a mut [u8]) -> Result<Self, PacketError> {
        Self::validate(bytes)?;
        Ok(Self::from_bytes_unchecked(bytes))
    }

    /// Wraps without validating.
    ///
    /// # Panics
    ///
    /// Accessors on the resulting view may panic if `validate()` would have
    /// returned [`PacketError::Truncated`] for these bytes.
    fn from_bytes_unchecked(bytes: &'a mut [u8]) -> Self;
}

/// Byte-index location of an encapsulated layer within a serialized packet,
/// without allocating any owned layers.
pub trait LayerOffset {
    /// The index of the first byte of the layer identified by `layer_type`
    /// within `bytes`, if this layer's dispatch chain reaches it. The
    /// current layer itself is not checked against `layer_type`.
    fn payload_byte_index(bytes: &[u8], layer_type: LayerId) -> Option<usize>;
}
