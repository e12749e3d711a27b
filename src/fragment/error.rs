//! Error and outcome types emitted by the fragmentation layer.
//!
//! The public façade of the engine keeps the protocol's silent-drop
//! behaviour, but every drop has a typed reason here so diagnostics and tests
//! can tell "still collecting" apart from "discarded".

use thiserror::Error;

use super::FragmentId;
use crate::packet::{CodecError, MessageType, Packet};

/// Errors produced while fragmenting outbound packets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The packet could not be encoded.
    #[error("failed to encode packet: {0}")]
    Encode(#[from] CodecError),
    /// The bare frame could not be recovered from the encoded packet.
    #[error("failed to strip padding: {0}")]
    Padding(#[source] CodecError),
    /// Splitting would need more fragments than the 16-bit total allows.
    #[error("packet needs {required} fragments, more than the wire format allows")]
    TooManyFragments { required: usize },
}

/// Why an inbound fragment did not advance reassembly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    /// The envelope is not tagged as a fragment.
    #[error("envelope type {0} is not a fragment")]
    NotAFragment(MessageType),
    /// The payload cannot hold the fixed fragment header.
    #[error("fragment payload of {len} bytes is shorter than the header")]
    TooShort { len: usize },
    /// The header declares an empty set.
    #[error("fragment declares zero total fragments")]
    ZeroTotal,
    /// The header places the fragment outside its own set.
    #[error("fragment index {index} out of range for total {total}")]
    IndexOutOfRange { index: u16, total: u16 },
    /// All fragments arrived but the joined bytes are not a valid packet.
    /// The set has been discarded.
    #[error("reassembled set {fragment_id} failed to decode: {source}")]
    ReassemblyDecode {
        fragment_id: FragmentId,
        source: CodecError,
    },
}

impl RejectReason {
    /// Short label used for metrics and structured logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotAFragment(_) => "not_a_fragment",
            Self::TooShort { .. } => "too_short",
            Self::ZeroTotal => "zero_total",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::ReassemblyDecode { .. } => "reassembly_decode",
        }
    }
}

/// Result of feeding one fragment envelope into the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// The set is still missing fragments.
    Pending {
        fragment_id: FragmentId,
        received: usize,
        total: u16,
    },
    /// The fragment completed its set; the packet has its TTL forced to zero.
    Complete(Packet),
    /// The fragment was dropped.
    Rejected(RejectReason),
}

impl FragmentOutcome {
    /// Return the reassembled packet, discarding pending or rejected states.
    #[must_use]
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Self::Complete(packet) => Some(packet),
            Self::Pending { .. } | Self::Rejected(_) => None,
        }
    }

    /// Whether the fragment completed a set.
    #[must_use]
    pub const fn is_complete(&self) -> bool { matches!(self, Self::Complete(_)) }
}
