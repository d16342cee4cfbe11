// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors surfaced while validating, constructing or mutating packet layers.
//!
//! Errors come out of parse boundaries (`validate()`, `from_bytes()`) and out
//! of setters that enforce protocol maxima. Field getters on views that have
//! already been validated do not fail--headers are clipped at parse time, not
//! lazily re-checked. Unknown enumeration values (EtherTypes, IP protocol
//! numbers, option kinds, TLV types) are never errors; they surface as raw
//! numbers or `Unknown` variants.

use thiserror::Error;

/// An error encountered while validating or mutating a packet layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum PacketError {
    /// A header or length-prefixed field extends past its containing segment.
    #[error("{layer}: truncated (need {need} bytes, have {have})")]
    Truncated {
        layer: &'static str,
        need: usize,
        have: usize,
    },

    /// A structural inconsistency detectable without full semantic knowledge,
    /// such as an IPv4 IHL below 5 or a version nibble that contradicts the
    /// layer being parsed.
    #[error("{layer}: {detail}")]
    Malformed {
        layer: &'static str,
        detail: &'static str,
    },

    /// A setter rejected a value that exceeds a protocol maximum. Raised
    /// before any buffer mutation takes place.
    #[error("{field}: value out of range (max {max}, got {got})")]
    ValueOutOfRange {
        field: &'static str,
        max: usize,
        got: usize,
    },

    /// An experimental feature was encountered while parsing in strict mode.
    /// The default parse path accepts these as opaque values instead.
    #[error("unsupported experimental feature: {feature}")]
    UnsupportedExperimental { feature: &'static str },

    /// A payload layer was rejected by `set_payload()` because the carrying
    /// layer cannot encapsulate it.
    #[error("{layer}: incompatible payload layer")]
    InvalidPayload { layer: &'static str },
}
