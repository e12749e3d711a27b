//! Inbound helper that stitches fragment chunks back into packet bytes.
//!
//! [`Reassembler`] keeps two concurrent tables keyed by [`FragmentId`]: the
//! received chunks and per-set metadata (original kind, declared total,
//! first-seen time). Every operation touches one key at a time, so the receive
//! path, the send path and the maintenance sweep can share it behind an `Arc`
//! without an outer lock. Creating a set inserts its metadata before its first
//! chunk; a concurrent [`snapshot`](Reassembler::snapshot) may observe a set
//! with no chunks yet.
//!
//! A set is complete once the number of distinct stored indices equals the
//! declared total of the fragment just received. That count does not prove
//! that exactly `0..total` is present; [`Reassembler::with_strict_completeness`]
//! adds that check.

use std::{collections::HashMap, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;

use super::{FragmentHeader, FragmentId, ReassemblySnapshot, SetProgress};
use crate::packet::MessageType;

#[derive(Clone, Copy, Debug)]
struct SetMetadata {
    original_type: MessageType,
    total: u16,
    first_seen: Instant,
}

/// Joined chunk bytes of a completed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledMessage {
    fragment_id: FragmentId,
    original_type: MessageType,
    payload: Vec<u8>,
}

impl ReassembledMessage {
    #[must_use]
    pub fn new(fragment_id: FragmentId, original_type: MessageType, payload: Vec<u8>) -> Self {
        Self {
            fragment_id,
            original_type,
            payload,
        }
    }

    /// Identifier shared by the fragments that formed this message.
    #[must_use]
    pub const fn fragment_id(&self) -> FragmentId { self.fragment_id }

    /// Message kind recorded when the set was opened.
    #[must_use]
    pub const fn original_type(&self) -> MessageType { self.original_type }

    /// Borrow the joined bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }

    /// Consume the message, returning the owned bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> { self.payload }
}

/// Result of storing one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReassemblyStatus {
    /// More chunks are needed.
    Incomplete { received: usize, total: u16 },
    /// The chunk completed its set, which has been removed from both tables.
    Complete(ReassembledMessage),
}

/// Concurrent fragment re-assembler with timeout-based eviction.
#[derive(Debug)]
pub struct Reassembler {
    timeout: Duration,
    strict_completeness: bool,
    chunks: DashMap<FragmentId, HashMap<u16, Vec<u8>>>,
    metadata: DashMap<FragmentId, SetMetadata>,
}

impl Reassembler {
    /// Create a re-assembler that evicts incomplete sets older than `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            strict_completeness: false,
            chunks: DashMap::new(),
            metadata: DashMap::new(),
        }
    }

    /// Require every index in `0..total` before a set counts as complete.
    #[must_use]
    pub fn with_strict_completeness(mut self, strict: bool) -> Self {
        self.strict_completeness = strict;
        self
    }

    /// Store a chunk using the current time.
    pub fn push(&self, header: FragmentHeader, chunk: impl AsRef<[u8]>) -> ReassemblyStatus {
        self.push_at(header, chunk, Instant::now())
    }

    /// Store a chunk using an explicit clock reading for the first-seen time.
    ///
    /// `header` must already be validated. A chunk at an index that is
    /// already stored replaces the earlier bytes.
    pub fn push_at(
        &self,
        header: FragmentHeader,
        chunk: impl AsRef<[u8]>,
        now: Instant,
    ) -> ReassemblyStatus {
        let id = header.fragment_id();
        let total = header.total();

        self.metadata.entry(id).or_insert_with(|| SetMetadata {
            original_type: header.original_type(),
            total,
            first_seen: now,
        });

        let (received, complete) = {
            let mut set = self.chunks.entry(id).or_default();
            set.insert(header.index(), chunk.as_ref().to_vec());
            let received = set.len();
            let complete = received == usize::from(total)
                && (!self.strict_completeness || (0..total).all(|index| set.contains_key(&index)));
            (received, complete)
        };

        if !complete {
            return ReassemblyStatus::Incomplete { received, total };
        }

        // Only the caller that wins the removal delivers the set.
        let Some((_, mut set)) = self.chunks.remove(&id) else {
            return ReassemblyStatus::Incomplete { received, total };
        };
        let original_type = self
            .metadata
            .remove(&id)
            .map_or(header.original_type(), |(_, meta)| meta.original_type);

        let mut payload = Vec::with_capacity(set.values().map(Vec::len).sum());
        for index in 0..total {
            if let Some(bytes) = set.remove(&index) {
                payload.extend_from_slice(&bytes);
            }
        }
        ReassemblyStatus::Complete(ReassembledMessage::new(id, original_type, payload))
    }

    /// Evict incomplete sets older than the timeout.
    ///
    /// Returns the identifiers of evicted sets.
    pub fn purge_expired(&self) -> Vec<FragmentId> { self.purge_expired_at(Instant::now()) }

    /// Evict incomplete sets older than the timeout relative to `now`.
    ///
    /// Chunk maps left without metadata by a concurrent [`clear`](Self::clear)
    /// are dropped as well. Keys are collected before removal so no iterator
    /// guard is held while entries are removed.
    pub fn purge_expired_at(&self, now: Instant) -> Vec<FragmentId> {
        let timeout = self.timeout;
        let is_expired = |meta: &SetMetadata| now.saturating_duration_since(meta.first_seen) > timeout;

        let candidates: Vec<FragmentId> = self
            .metadata
            .iter()
            .filter(|entry| is_expired(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = Vec::with_capacity(candidates.len());
        for id in candidates {
            if self.metadata.remove_if(&id, |_, meta| is_expired(meta)).is_some() {
                self.drop_orphaned_chunks(&id);
                evicted.push(id);
            }
        }

        let orphans: Vec<FragmentId> = self.chunks.iter().map(|entry| *entry.key()).collect();
        for id in orphans {
            self.drop_orphaned_chunks(&id);
        }

        evicted
    }

    /// Remove the chunk map for `id` unless a set with that id is open.
    ///
    /// A push that lands after the metadata was evicted re-inserts metadata
    /// before touching its chunk map, so the map is kept along with the
    /// chunk that push stored.
    fn drop_orphaned_chunks(&self, id: &FragmentId) -> bool {
        self.chunks
            .remove_if(id, |id, _| !self.metadata.contains_key(id))
            .is_some()
    }

    /// Drop every pending set.
    pub fn clear(&self) {
        self.metadata.clear();
        self.chunks.clear();
    }

    /// Number of sets currently tracked.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.metadata.len() }

    /// Whether a set with `id` is pending.
    #[must_use]
    pub fn contains(&self, id: &FragmentId) -> bool { self.metadata.contains_key(id) }

    /// Capture per-set progress for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> ReassemblySnapshot { self.snapshot_at(Instant::now()) }

    /// Capture per-set progress with ages measured from `now`.
    #[must_use]
    pub fn snapshot_at(&self, now: Instant) -> ReassemblySnapshot {
        let records: Vec<(FragmentId, SetMetadata)> = self
            .metadata
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        let sets = records
            .into_iter()
            .map(|(fragment_id, meta)| SetProgress {
                fragment_id,
                original_type: meta.original_type,
                received: self.chunks.get(&fragment_id).map_or(0, |set| set.len()),
                total: meta.total,
                age: now.saturating_duration_since(meta.first_seen),
            })
            .collect();
        ReassemblySnapshot::new(sets)
    }
}
