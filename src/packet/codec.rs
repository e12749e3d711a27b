//! Binary envelope codec shared with the sibling implementation.
//!
//! [`PacketCodec`] is the seam the fragmentation engine depends on; it must be
//! canonical so that `decode(encode(p)) == p`. [`BinaryCodec`] is the
//! production implementation:
//!
//! ```text
//! version(1) type(1) ttl(1) timestamp(8) flags(1) payload_len(2)
//! sender(8) [recipient(8)] payload(payload_len) [signature(64)] [padding]
//! ```
//!
//! Envelopes flagged as compressed carry `original_len(2) lz4_block` in the
//! payload field. They are inflated on decode; encoding never compresses, so
//! decoded packets re-encode to their canonical uncompressed form.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{
    HEADER_SIZE,
    MessageType,
    PEER_ID_SIZE,
    PROTOCOL_VERSION,
    Packet,
    PeerId,
    SIGNATURE_SIZE,
    flags,
    padding::{self, PaddingError},
};
use crate::byte_order::{
    read_network_u16_at,
    read_network_u64_at,
    write_network_u16,
    write_network_u64,
};

const TYPE_OFFSET: usize = 1;
const TTL_OFFSET: usize = 2;
const TIMESTAMP_OFFSET: usize = 3;
const FLAGS_OFFSET: usize = 11;
const PAYLOAD_LEN_OFFSET: usize = 12;
/// Length prefix inside a compressed payload field.
const ORIGINAL_LEN_SIZE: usize = 2;

/// Errors raised while encoding or decoding envelopes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The payload does not fit the 16-bit length field.
    #[error("payload of {len} bytes exceeds the envelope length field")]
    PayloadTooLarge { len: usize },
    /// Fewer bytes were supplied than the header requires.
    #[error("truncated envelope: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    /// The version byte is not one this codec speaks.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    /// Bytes after the frame are not a valid padding trailer.
    #[error("{count} trailing bytes after frame are not padding")]
    TrailingBytes { count: usize },
    /// The padding trailer could not be removed.
    #[error(transparent)]
    Padding(#[from] PaddingError),
    /// A compressed payload did not inflate to its declared size.
    #[error("compressed payload does not inflate to {original_len} bytes")]
    Decompression { original_len: usize },
}

/// Canonical envelope encoding consumed by the fragmentation engine.
pub trait PacketCodec: Send + Sync {
    /// Encode `packet` into wire bytes, padding included.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the packet cannot be represented on the wire.
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError>;

    /// Decode a packet from padded or unpadded wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes do not form a valid envelope.
    fn decode(&self, bytes: &[u8]) -> Result<Packet, CodecError>;

    /// Return the bare frame inside bytes produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the frame cannot be delimited or a trailer
    /// after it is malformed.
    fn unpad<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8], CodecError>;
}

/// Production envelope codec.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCodec {
    padded: bool,
}

impl Default for BinaryCodec {
    fn default() -> Self { Self { padded: true } }
}

impl BinaryCodec {
    /// Codec that pads encoded envelopes up to the next size bucket.
    #[must_use]
    pub const fn new() -> Self { Self { padded: true } }

    /// Codec that emits bare frames without a padding trailer.
    ///
    /// Only useful where the frame length is not observable, such as tests.
    #[must_use]
    pub const fn unpadded() -> Self { Self { padded: false } }

    fn write_frame(packet: &Packet) -> Result<BytesMut, CodecError> {
        let payload_len = u16::try_from(packet.payload().len()).map_err(|_| {
            CodecError::PayloadTooLarge {
                len: packet.payload().len(),
            }
        })?;

        let mut buf = BytesMut::with_capacity(packet.encoded_len());
        buf.put_u8(packet.version());
        buf.put_u8(packet.message_type().get());
        buf.put_u8(packet.ttl());
        buf.put_slice(&write_network_u64(packet.timestamp()));
        buf.put_u8(packet.flags());
        buf.put_slice(&write_network_u16(payload_len));
        buf.put_slice(packet.sender_id().as_bytes());
        if let Some(recipient) = packet.recipient_id() {
            buf.put_slice(recipient.as_bytes());
        }
        buf.put_slice(packet.payload());
        if let Some(signature) = packet.signature() {
            buf.put_slice(signature);
        }
        Ok(buf)
    }
}

impl PacketCodec for BinaryCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError> {
        let frame = Self::write_frame(packet)?;
        if self.padded {
            Ok(padding::pad(&frame))
        } else {
            Ok(frame.to_vec())
        }
    }

    fn unpad<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8], CodecError> {
        let layout = FrameLayout::parse(bytes)?;
        layout.frame(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Packet, CodecError> {
        let layout = FrameLayout::parse(bytes)?;
        let frame = layout.frame(bytes)?;

        let payload_field = &frame[layout.recipient_end..layout.payload_end];
        let payload = if layout.flags & flags::IS_COMPRESSED == 0 {
            payload_field.to_vec()
        } else {
            inflate(payload_field)?
        };
        let timestamp = read_network_u64_at(frame, TIMESTAMP_OFFSET).ok_or(CodecError::Truncated {
            needed: HEADER_SIZE,
            available: frame.len(),
        })?;

        let mut packet = Packet::new(
            MessageType::new(frame[TYPE_OFFSET]),
            peer_id_at(frame, HEADER_SIZE),
            payload,
        )
        .with_version(frame[0])
        .with_ttl(frame[TTL_OFFSET])
        .with_timestamp(timestamp);
        if layout.flags & flags::HAS_RECIPIENT != 0 {
            packet = packet.with_recipient(peer_id_at(frame, HEADER_SIZE + PEER_ID_SIZE));
        }
        if layout.flags & flags::HAS_SIGNATURE != 0 {
            let mut signature = [0_u8; SIGNATURE_SIZE];
            signature.copy_from_slice(&frame[layout.payload_end..]);
            packet = packet.with_signature(signature);
        }
        Ok(packet)
    }
}

/// Field boundaries declared by an envelope header.
#[derive(Clone, Copy, Debug)]
struct FrameLayout {
    flags: u8,
    recipient_end: usize,
    payload_end: usize,
    frame_len: usize,
}

impl FrameLayout {
    fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let fixed = HEADER_SIZE + PEER_ID_SIZE;
        if bytes.len() < fixed {
            return Err(CodecError::Truncated {
                needed: fixed,
                available: bytes.len(),
            });
        }
        let version = bytes[0];
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let header_flags = bytes[FLAGS_OFFSET];
        let payload_len = read_network_u16_at(bytes, PAYLOAD_LEN_OFFSET).ok_or(
            CodecError::Truncated {
                needed: fixed,
                available: bytes.len(),
            },
        )?;
        let recipient_end = fixed
            + if header_flags & flags::HAS_RECIPIENT == 0 {
                0
            } else {
                PEER_ID_SIZE
            };
        let payload_end = recipient_end + usize::from(payload_len);
        let frame_len = payload_end
            + if header_flags & flags::HAS_SIGNATURE == 0 {
                0
            } else {
                SIGNATURE_SIZE
            };
        Ok(Self {
            flags: header_flags,
            recipient_end,
            payload_end,
            frame_len,
        })
    }

    /// Slice the frame out of `bytes`, validating any trailer after it.
    fn frame<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8], CodecError> {
        if bytes.len() < self.frame_len {
            return Err(CodecError::Truncated {
                needed: self.frame_len,
                available: bytes.len(),
            });
        }
        if bytes.len() > self.frame_len {
            let content = padding::unpad(bytes)?;
            if content.len() != self.frame_len {
                return Err(CodecError::TrailingBytes {
                    count: bytes.len() - self.frame_len,
                });
            }
        }
        Ok(&bytes[..self.frame_len])
    }
}

/// Expand a compressed payload field: the original length as a big-endian
/// `u16`, then a raw LZ4 block.
fn inflate(field: &[u8]) -> Result<Vec<u8>, CodecError> {
    let declared = read_network_u16_at(field, 0).ok_or(CodecError::Truncated {
        needed: ORIGINAL_LEN_SIZE,
        available: field.len(),
    })?;
    let original_len = usize::from(declared);
    match lz4::block::decompress(&field[ORIGINAL_LEN_SIZE..], Some(i32::from(declared))) {
        Ok(inflated) if inflated.len() == original_len => Ok(inflated),
        _ => Err(CodecError::Decompression { original_len }),
    }
}

/// Copy a peer identifier out of an already length-checked buffer.
fn peer_id_at(bytes: &[u8], offset: usize) -> PeerId {
    let mut id = [0_u8; PEER_ID_SIZE];
    id.copy_from_slice(&bytes[offset..offset + PEER_ID_SIZE]);
    PeerId::new(id)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn packet() -> Packet {
        Packet::new(
            MessageType::MESSAGE,
            PeerId::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80]),
            b"hello mesh".to_vec(),
        )
        .with_ttl(5)
        .with_timestamp(0x0102_0304_0506_0708)
    }

    #[rstest]
    fn header_layout_is_big_endian(packet: Packet) {
        let bytes = BinaryCodec::unpadded().encode(&packet).expect("encode");
        assert_eq!(bytes.len(), packet.encoded_len());
        assert_eq!(&bytes[..3], &[PROTOCOL_VERSION, 0x02, 5]);
        assert_eq!(&bytes[3..11], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bytes[11], 0);
        assert_eq!(&bytes[12..14], &[0, 10]);
        assert_eq!(&bytes[22..], b"hello mesh");
    }

    #[rstest]
    #[case::bare(BinaryCodec::unpadded())]
    #[case::padded(BinaryCodec::new())]
    fn decode_reverses_encode(packet: Packet, #[case] codec: BinaryCodec) {
        let addressed = packet
            .with_recipient(PeerId::new([7; 8]))
            .with_signature([0x5a; SIGNATURE_SIZE]);
        let bytes = codec.encode(&addressed).expect("encode");
        assert_eq!(codec.decode(&bytes).expect("decode"), addressed);
    }

    #[rstest]
    fn padded_decoder_accepts_bare_frames(packet: Packet) {
        let bare = BinaryCodec::unpadded().encode(&packet).expect("encode");
        assert_eq!(BinaryCodec::new().decode(&bare).expect("decode"), packet);
    }

    #[rstest]
    fn unpad_recovers_frame_length(packet: Packet) {
        let codec = BinaryCodec::new();
        let padded = codec.encode(&packet).expect("encode");
        assert_eq!(padded.len(), 256);
        let frame = codec.unpad(&padded).expect("unpad");
        assert_eq!(frame.len(), packet.encoded_len());
    }

    #[rstest]
    #[case::first_bucket(256)]
    #[case::full_fragment_envelope(512)]
    #[case::no_bucket_in_reach(600)]
    fn bucket_sized_frames_go_out_unchanged(packet: Packet, #[case] len: usize) {
        // A trailing 0x01 must be read as content, not as a one-byte trailer.
        let mut payload = vec![0x33; len - packet.encoded_len() + packet.payload().len()];
        if let Some(last) = payload.last_mut() {
            *last = 0x01;
        }
        let sized = Packet::new(packet.message_type(), packet.sender_id(), payload);
        assert_eq!(sized.encoded_len(), len);

        let codec = BinaryCodec::new();
        let wire = codec.encode(&sized).expect("encode");
        assert_eq!(wire.len(), len);
        assert_eq!(codec.unpad(&wire).expect("unpad").len(), len);
        assert_eq!(codec.decode(&wire).expect("decode"), sized);
    }

    #[rstest]
    fn unpadded_codec_unpad_returns_bare_frame(packet: Packet) {
        let codec = BinaryCodec::unpadded();
        let bare = codec.encode(&packet).expect("encode");
        assert_eq!(codec.unpad(&bare).expect("unpad"), bare.as_slice());
    }

    #[rstest]
    fn decode_rejects_truncated_input(packet: Packet) {
        let bytes = BinaryCodec::unpadded().encode(&packet).expect("encode");
        let err = BinaryCodec::new()
            .decode(&bytes[..bytes.len() - 1])
            .expect_err("truncated payload must fail");
        assert_eq!(
            err,
            CodecError::Truncated {
                needed: packet.encoded_len(),
                available: packet.encoded_len() - 1,
            }
        );
        assert!(matches!(
            BinaryCodec::new().decode(&bytes[..5]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[rstest]
    fn decode_rejects_garbage_after_frame(packet: Packet) {
        let mut bytes = BinaryCodec::unpadded().encode(&packet).expect("encode");
        bytes.extend_from_slice(&[9, 9, 2]);
        assert!(BinaryCodec::new().decode(&bytes).is_err());
    }

    #[rstest]
    fn decode_rejects_unknown_version(packet: Packet) {
        let codec = BinaryCodec::unpadded();
        let mut bytes = codec.encode(&packet).expect("encode");
        bytes[0] = 2;
        assert_eq!(codec.decode(&bytes), Err(CodecError::UnsupportedVersion(2)));
    }

    /// Envelope whose payload field is `original_len(2) lz4_block`.
    fn compressed_envelope(plain: &Packet) -> Vec<u8> {
        let block = lz4::block::compress(plain.payload(), None, false).expect("compress");
        let original_len = u16::try_from(plain.payload().len()).expect("fits u16");
        let mut field = write_network_u16(original_len).to_vec();
        field.extend_from_slice(&block);

        let carrier = Packet::new(plain.message_type(), plain.sender_id(), field)
            .with_ttl(plain.ttl())
            .with_timestamp(plain.timestamp());
        let mut bytes = BinaryCodec::new().encode(&carrier).expect("encode");
        bytes[FLAGS_OFFSET] |= flags::IS_COMPRESSED;
        bytes
    }

    #[rstest]
    fn decode_inflates_compressed_payload(packet: Packet) {
        let plain = Packet::new(
            packet.message_type(),
            packet.sender_id(),
            b"mesh ".repeat(120),
        )
        .with_ttl(packet.ttl())
        .with_timestamp(packet.timestamp());
        let bytes = compressed_envelope(&plain);
        assert!(bytes.len() < plain.encoded_len());

        let decoded = BinaryCodec::new().decode(&bytes).expect("decode");
        assert_eq!(decoded, plain);
        assert_eq!(decoded.flags() & flags::IS_COMPRESSED, 0);
    }

    #[rstest]
    fn decode_rejects_corrupt_compressed_payload(packet: Packet) {
        let codec = BinaryCodec::unpadded();
        let mut bytes = codec.encode(&packet).expect("encode");
        bytes[FLAGS_OFFSET] |= flags::IS_COMPRESSED;
        // "he" reads as an original length of 0x6865 that the block cannot fill.
        assert_eq!(
            codec.decode(&bytes),
            Err(CodecError::Decompression {
                original_len: 0x6865
            })
        );

        let empty_field = Packet::new(packet.message_type(), packet.sender_id(), vec![7]);
        let mut bytes = codec.encode(&empty_field).expect("encode");
        bytes[FLAGS_OFFSET] |= flags::IS_COMPRESSED;
        assert_eq!(
            codec.decode(&bytes),
            Err(CodecError::Truncated {
                needed: 2,
                available: 1
            })
        );
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let packet = Packet::new(MessageType::FILE_TRANSFER, PeerId::new([1; 8]), vec![
            0;
            usize::from(u16::MAX) + 1
        ]);
        assert_eq!(
            BinaryCodec::new().encode(&packet),
            Err(CodecError::PayloadTooLarge {
                len: usize::from(u16::MAX) + 1
            })
        );
    }
}
