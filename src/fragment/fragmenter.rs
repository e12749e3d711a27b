//! Outbound helper that splits encoded packets into fragment chunks.
//!
//! [`Fragmenter`] slices a byte stream into fixed-size chunks and tags each
//! with a [`FragmentHeader`]. It does not decide *whether* to fragment; the
//! [`FragmentManager`](super::FragmentManager) applies the size threshold.

use std::num::NonZeroUsize;

use super::{FragmentHeader, FragmentId, FragmentationError, encode_fragment_payload};
use crate::packet::MessageType;

/// Splits encoded packets into fragment-sized chunks.
#[derive(Clone, Copy, Debug)]
pub struct Fragmenter {
    max_fragment_size: NonZeroUsize,
}

impl Fragmenter {
    /// Create a fragmenter that caps chunks at `max_fragment_size` bytes.
    #[must_use]
    pub const fn new(max_fragment_size: NonZeroUsize) -> Self { Self { max_fragment_size } }

    /// Return the maximum chunk size in bytes.
    #[must_use]
    pub const fn max_fragment_size(&self) -> NonZeroUsize { self.max_fragment_size }

    /// Split `payload` under a freshly drawn [`FragmentId`].
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] if the payload needs
    /// more than `u16::MAX` chunks.
    pub fn fragment_bytes(
        &self,
        original_type: MessageType,
        payload: impl AsRef<[u8]>,
    ) -> Result<FragmentBatch, FragmentationError> {
        self.fragment_with_id(FragmentId::random(), original_type, payload)
    }

    /// Split `payload` into chunks tagged with `fragment_id`.
    ///
    /// An empty payload yields a single empty fragment so the receiver still
    /// observes a complete set.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] if the payload needs
    /// more than `u16::MAX` chunks.
    pub fn fragment_with_id(
        &self,
        fragment_id: FragmentId,
        original_type: MessageType,
        payload: impl AsRef<[u8]>,
    ) -> Result<FragmentBatch, FragmentationError> {
        let payload = payload.as_ref();
        let max = self.max_fragment_size.get();
        let required = payload.len().div_ceil(max).max(1);
        let total = u16::try_from(required)
            .map_err(|_| FragmentationError::TooManyFragments { required })?;

        let fragments = if payload.is_empty() {
            vec![FragmentFrame::new(
                FragmentHeader::new(fragment_id, 0, total, original_type),
                Vec::new(),
            )]
        } else {
            payload
                .chunks(max)
                .zip(0..total)
                .map(|(chunk, index)| {
                    FragmentFrame::new(
                        FragmentHeader::new(fragment_id, index, total, original_type),
                        chunk.to_vec(),
                    )
                })
                .collect()
        };

        Ok(FragmentBatch::new(fragment_id, fragments))
    }
}

/// Header and chunk for a single outbound fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentFrame {
    header: FragmentHeader,
    chunk: Vec<u8>,
}

impl FragmentFrame {
    /// Construct a new fragment frame.
    #[must_use]
    pub fn new(header: FragmentHeader, chunk: Vec<u8>) -> Self { Self { header, chunk } }

    /// Return the fragment header.
    #[must_use]
    pub fn header(&self) -> &FragmentHeader { &self.header }

    /// Return the chunk bytes.
    #[must_use]
    pub fn chunk(&self) -> &[u8] { self.chunk.as_slice() }

    /// Encode the frame as a fragment envelope payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> { encode_fragment_payload(&self.header, &self.chunk) }

    /// Consume the frame, returning its components.
    #[must_use]
    pub fn into_parts(self) -> (FragmentHeader, Vec<u8>) { (self.header, self.chunk) }
}

/// Fragments produced for a single packet, in ascending index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    fragment_id: FragmentId,
    fragments: Vec<FragmentFrame>,
}

impl FragmentBatch {
    fn new(fragment_id: FragmentId, fragments: Vec<FragmentFrame>) -> Self {
        debug_assert!(!fragments.is_empty(), "fragment batches must not be empty");
        Self {
            fragment_id,
            fragments,
        }
    }

    /// Return the [`FragmentId`] shared by all fragments.
    #[must_use]
    pub const fn fragment_id(&self) -> FragmentId { self.fragment_id }

    /// Return the fragments as a slice.
    #[must_use]
    pub fn fragments(&self) -> &[FragmentFrame] { self.fragments.as_slice() }

    /// Number of fragments in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.fragments.len() }
}

impl IntoIterator for FragmentBatch {
    type Item = FragmentFrame;
    type IntoIter = std::vec::IntoIter<FragmentFrame>;

    fn into_iter(self) -> Self::IntoIter { self.fragments.into_iter() }
}
