//! Read-only view of pending reassembly state.
//!
//! Snapshots exist for operators and tests. They are assembled from two
//! tables without a common lock, so they can be momentarily inconsistent and
//! must not drive protocol decisions.

use std::{fmt, time::Duration};

use super::FragmentId;
use crate::packet::MessageType;

/// Progress of one pending set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetProgress {
    pub fragment_id: FragmentId,
    pub original_type: MessageType,
    pub received: usize,
    pub total: u16,
    pub age: Duration,
}

/// Progress of every pending set, ordered by identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReassemblySnapshot {
    sets: Vec<SetProgress>,
}

impl ReassemblySnapshot {
    pub(crate) fn new(mut sets: Vec<SetProgress>) -> Self {
        sets.sort_by_key(|set| *set.fragment_id.as_bytes());
        Self { sets }
    }

    /// Number of pending sets.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.sets.len() }

    #[must_use]
    pub fn sets(&self) -> &[SetProgress] { &self.sets }

    /// Progress of the set with `id`, if pending.
    #[must_use]
    pub fn get(&self, id: FragmentId) -> Option<&SetProgress> {
        self.sets.iter().find(|set| set.fragment_id == id)
    }
}

impl fmt::Display for ReassemblySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active fragment sets: {}", self.sets.len())?;
        for set in &self.sets {
            writeln!(
                f,
                "  - {}: {}/{} fragments, type: {}, age: {}s",
                set.fragment_id,
                set.received,
                set.total,
                set.original_type,
                set.age.as_secs()
            )?;
        }
        Ok(())
    }
}
