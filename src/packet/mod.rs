//! Protocol envelope, its binary codec and size-bucket padding.
//!
//! The fragmentation engine treats everything in this module as a
//! collaborator reached through [`PacketCodec`]; the concrete
//! [`BinaryCodec`] matches the layout used across the mesh.

pub mod codec;
pub mod padding;
mod types;

pub use codec::{BinaryCodec, CodecError, PacketCodec};
pub use padding::PaddingError;
pub use types::{
    HEADER_SIZE,
    MAX_TTL,
    MessageType,
    PEER_ID_SIZE,
    PROTOCOL_VERSION,
    Packet,
    PeerId,
    SIGNATURE_SIZE,
    Signature,
    flags,
};
