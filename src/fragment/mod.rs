//! Fragmentation and reassembly of oversized mesh packets.
//!
//! Packets whose unpadded encoding exceeds the link threshold are split into
//! `FRAGMENT` envelopes, each carrying a 13-byte header and one chunk of the
//! original byte stream. The receiving peer collects chunks per fragment set,
//! rebuilds the packet once the set is complete and evicts sets that stall.
//! Each sub-module focuses on a single concept; [`FragmentManager`] ties them
//! together.

pub mod config;
pub mod error;
pub mod fragmenter;
pub mod header;
pub mod id;
mod maintenance;
pub mod manager;
pub mod payload;
pub mod reassembler;
pub mod snapshot;

pub use config::{
    CLEANUP_INTERVAL,
    ConfigError,
    DEFAULT_LINK_MTU,
    FRAGMENT_SIZE_THRESHOLD,
    FRAGMENT_TIMEOUT,
    FragmentationConfig,
    MAX_FRAGMENT_SIZE,
};
pub use error::{FragmentOutcome, FragmentationError, RejectReason};
pub use fragmenter::{FragmentBatch, FragmentFrame, Fragmenter};
pub use header::FragmentHeader;
pub use id::{FRAGMENT_ID_SIZE, FragmentId};
pub use manager::{FragmentManager, FragmentPlan, LifecycleError};
pub use payload::{FRAGMENT_HEADER_SIZE, decode_fragment_payload, encode_fragment_payload};
pub use reassembler::{ReassembledMessage, Reassembler, ReassemblyStatus};
pub use snapshot::{ReassemblySnapshot, SetProgress};
