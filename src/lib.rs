#![doc(html_root_url = "https://docs.rs/meshfrag/latest")]
//! Public API for the `meshfrag` library.
//!
//! This crate splits oversized mesh packets into link-sized fragments and
//! rebuilds them at the receiving peer, evicting sets that never complete.

pub mod byte_order;
pub mod fragment;
pub mod metrics;
pub mod packet;

pub use fragment::{
    FragmentHeader,
    FragmentId,
    FragmentManager,
    FragmentOutcome,
    FragmentPlan,
    FragmentationConfig,
    FragmentationError,
    LifecycleError,
    ReassemblySnapshot,
    RejectReason,
};
pub use packet::{BinaryCodec, CodecError, MessageType, Packet, PacketCodec, PeerId};
