//! Envelope types exchanged between mesh peers.

use std::time::{SystemTime, UNIX_EPOCH};

use derive_more::{Display, From, Into};

/// Wire protocol version emitted and accepted by [`BinaryCodec`](super::BinaryCodec).
pub const PROTOCOL_VERSION: u8 = 1;
/// Hop budget assigned to freshly originated packets.
pub const MAX_TTL: u8 = 7;
/// Fixed envelope header: version, type, ttl, timestamp, flags, payload length.
pub const HEADER_SIZE: usize = 14;
/// Width of sender and recipient identifiers.
pub const PEER_ID_SIZE: usize = 8;
/// Width of a detached packet signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Detached signature bytes carried at the end of a signed packet.
pub type Signature = [u8; SIGNATURE_SIZE];

/// Bit flags stored in the envelope header.
pub mod flags {
    /// A recipient identifier follows the sender identifier.
    pub const HAS_RECIPIENT: u8 = 0x01;
    /// A signature trails the payload.
    pub const HAS_SIGNATURE: u8 = 0x02;
    /// The payload is compressed.
    pub const IS_COMPRESSED: u8 = 0x04;
}

/// One-byte message kind tag.
///
/// The set is open: tags this crate does not name are carried through
/// unchanged so fragments of newer message kinds still reassemble.
///
/// # Examples
///
/// ```
/// use meshfrag::packet::MessageType;
///
/// assert_eq!(MessageType::FRAGMENT.get(), 0x20);
/// assert_eq!(MessageType::from(0x02), MessageType::MESSAGE);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{_0:#04x}")]
pub struct MessageType(u8);

impl MessageType {
    pub const ANNOUNCE: Self = Self(0x01);
    pub const MESSAGE: Self = Self(0x02);
    pub const LEAVE: Self = Self(0x03);
    pub const NOISE_HANDSHAKE: Self = Self(0x10);
    pub const NOISE_ENCRYPTED: Self = Self(0x11);
    pub const FRAGMENT: Self = Self(0x20);
    pub const REQUEST_SYNC: Self = Self(0x21);
    pub const FILE_TRANSFER: Self = Self(0x22);

    /// Wrap a raw tag.
    #[must_use]
    pub const fn new(value: u8) -> Self { Self(value) }

    /// Return the raw tag.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }
}

/// Eight-byte peer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Into)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Identifier used for recipient-less broadcast traffic by the sibling
    /// implementation.
    pub const BROADCAST: Self = Self([0xff; PEER_ID_SIZE]);

    #[must_use]
    pub const fn new(bytes: [u8; PEER_ID_SIZE]) -> Self { Self(bytes) }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] { &self.0 }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A protocol packet: the unit the mesh relays hop by hop.
///
/// Header flags are derived from the optional fields when encoding, so a
/// packet can never advertise a recipient or signature it does not carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    version: u8,
    message_type: MessageType,
    ttl: u8,
    timestamp: u64,
    sender_id: PeerId,
    recipient_id: Option<PeerId>,
    payload: Vec<u8>,
    signature: Option<Signature>,
}

impl Packet {
    /// Create a broadcast packet stamped with the current time and the full
    /// hop budget.
    #[must_use]
    pub fn new(message_type: MessageType, sender_id: PeerId, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
            ttl: MAX_TTL,
            timestamp: now_millis(),
            sender_id,
            recipient_id: None,
            payload,
            signature: None,
        }
    }

    /// Address the packet to a single peer.
    #[must_use]
    pub fn with_recipient(mut self, recipient_id: PeerId) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    /// Attach a detached signature.
    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Replace the hop count.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the origin timestamp (milliseconds since the Unix epoch).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Build a fragment envelope inheriting addressing, hop count and
    /// timestamp from `original`. Fragments are never signed.
    #[must_use]
    pub fn fragment_of(original: &Packet, payload: Vec<u8>) -> Self {
        Self {
            version: original.version,
            message_type: MessageType::FRAGMENT,
            ttl: original.ttl,
            timestamp: original.timestamp,
            sender_id: original.sender_id,
            recipient_id: original.recipient_id,
            payload,
            signature: None,
        }
    }

    #[must_use]
    pub const fn version(&self) -> u8 { self.version }

    #[must_use]
    pub const fn message_type(&self) -> MessageType { self.message_type }

    #[must_use]
    pub const fn ttl(&self) -> u8 { self.ttl }

    #[must_use]
    pub const fn timestamp(&self) -> u64 { self.timestamp }

    #[must_use]
    pub const fn sender_id(&self) -> PeerId { self.sender_id }

    #[must_use]
    pub const fn recipient_id(&self) -> Option<PeerId> { self.recipient_id }

    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    #[must_use]
    pub const fn signature(&self) -> Option<&Signature> { self.signature.as_ref() }

    /// Whether the packet has no specific recipient.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none_or(|id| id == PeerId::BROADCAST)
    }

    /// Header flag byte implied by the optional fields.
    #[must_use]
    pub fn flags(&self) -> u8 {
        let mut bits = 0;
        if self.recipient_id.is_some() {
            bits |= flags::HAS_RECIPIENT;
        }
        if self.signature.is_some() {
            bits |= flags::HAS_SIGNATURE;
        }
        bits
    }

    /// Exact unpadded length of the encoded packet.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + PEER_ID_SIZE
            + self.recipient_id.map_or(0, |_| PEER_ID_SIZE)
            + self.payload.len()
            + self.signature.map_or(0, |_| SIGNATURE_SIZE)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}
