// SPDX-License-Identifier: MIT OR Apache-2.0

//! The traits and entry points most callers want in scope.

pub use crate::layers::traits::{
    FromBytes, FromBytesMut, FromBytesRef, LayerIndex, LayerLength, LayerName, LayerObject,
    ToBytes, Validate,
};
pub use crate::layers::{parse, LinkType};
