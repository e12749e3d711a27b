//! Encoding helpers for fragment payloads carried inside envelopes.
//!
//! A fragment travels as the payload of an ordinary `FRAGMENT` envelope. The
//! payload starts with a fixed 13-byte header followed by the raw chunk:
//!
//! ```text
//! fragment_id(8) index(2, BE) total(2, BE) original_type(1) chunk(..)
//! ```
//!
//! The layout is shared bit-for-bit with the sibling implementation.

use super::{FRAGMENT_ID_SIZE, FragmentHeader, FragmentId, RejectReason};
use crate::{
    byte_order::{read_network_u16_at, write_network_u16},
    packet::MessageType,
};

/// Fixed bytes preceding the chunk in every fragment payload.
pub const FRAGMENT_HEADER_SIZE: usize = 13;

const INDEX_OFFSET: usize = FRAGMENT_ID_SIZE;
const TOTAL_OFFSET: usize = INDEX_OFFSET + 2;
const TYPE_OFFSET: usize = TOTAL_OFFSET + 2;

/// Encode a fragment by prefixing `chunk` with its header.
#[must_use]
pub fn encode_fragment_payload(header: &FragmentHeader, chunk: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAGMENT_HEADER_SIZE + chunk.len());
    buf.extend_from_slice(header.fragment_id().as_bytes());
    buf.extend_from_slice(&write_network_u16(header.index()));
    buf.extend_from_slice(&write_network_u16(header.total()));
    buf.push(header.original_type().get());
    buf.extend_from_slice(chunk);
    buf
}

/// Split a fragment payload into its validated header and chunk.
///
/// # Errors
///
/// Returns [`RejectReason::TooShort`] when `payload` cannot hold the header,
/// and [`RejectReason::ZeroTotal`] or [`RejectReason::IndexOutOfRange`] when
/// the header is not self-consistent.
pub fn decode_fragment_payload(payload: &[u8]) -> Result<(FragmentHeader, &[u8]), RejectReason> {
    let too_short = || RejectReason::TooShort { len: payload.len() };
    let Some((head, chunk)) = payload.split_at_checked(FRAGMENT_HEADER_SIZE) else {
        return Err(too_short());
    };

    let mut id = [0_u8; FRAGMENT_ID_SIZE];
    id.copy_from_slice(&head[..FRAGMENT_ID_SIZE]);
    let index = read_network_u16_at(head, INDEX_OFFSET).ok_or_else(too_short)?;
    let total = read_network_u16_at(head, TOTAL_OFFSET).ok_or_else(too_short)?;
    let original_type = MessageType::new(head[TYPE_OFFSET]);

    let header = FragmentHeader::new(FragmentId::new(id), index, total, original_type);
    header.validate()?;
    Ok((header, chunk))
}
