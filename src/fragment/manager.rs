//! Fragmentation engine tying the send path, the receive path and background
//! eviction together.
//!
//! [`FragmentManager`] is shared behind an `Arc` by the transport's send and
//! receive paths. Both paths are synchronous and never wait on I/O; the only
//! task that suspends is the maintenance sweep started by
//! [`FragmentManager::start`].
//!
//! Reassembled packets come back with their TTL forced to zero. The fragments
//! were already relayed hop by hop, so the relay layer must deliver the whole
//! packet locally and never rebroadcast it as a second copy.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError, atomic::Ordering},
};

use thiserror::Error;
use tokio::{runtime::Handle, time::Instant};
use tracing::{debug, error, info, warn};

use super::{
    FragmentId,
    FragmentOutcome,
    FragmentationConfig,
    FragmentationError,
    Fragmenter,
    ReassemblySnapshot,
    ReassemblyStatus,
    Reassembler,
    RejectReason,
    decode_fragment_payload,
    maintenance::{MaintenanceTask, SweepCounter, SweepGate},
};
use crate::{
    metrics,
    packet::{BinaryCodec, MessageType, Packet, PacketCodec},
};

/// Errors raised by lifecycle controls.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Maintenance needs a Tokio runtime to run on.
    #[error("fragment maintenance requires a Tokio runtime")]
    NoRuntime,
}

/// What [`FragmentManager::try_create_fragments`] decided for a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentPlan {
    /// The packet fits the threshold and is sent as is.
    Unfragmented,
    /// The packet was split into fragment envelopes, in index order.
    Fragmented {
        fragment_id: FragmentId,
        fragments: Vec<Packet>,
    },
}

/// Splits oversized packets and reassembles inbound fragments.
#[derive(Debug)]
pub struct FragmentManager<C = BinaryCodec> {
    config: FragmentationConfig,
    codec: C,
    fragmenter: Fragmenter,
    reassembler: Arc<Reassembler>,
    maintenance: Mutex<Option<MaintenanceTask>>,
    sweep_gate: SweepGate,
    sweeps: SweepCounter,
}

impl Default for FragmentManager {
    fn default() -> Self { Self::new(FragmentationConfig::default()) }
}

impl FragmentManager {
    /// Create an inactive manager using the production codec.
    #[must_use]
    pub fn new(config: FragmentationConfig) -> Self { Self::with_codec(config, BinaryCodec::new()) }
}

impl<C: PacketCodec> FragmentManager<C> {
    /// Create an inactive manager using `codec` for envelope encoding.
    #[must_use]
    pub fn with_codec(config: FragmentationConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            fragmenter: Fragmenter::new(config.max_fragment_size),
            reassembler: Arc::new(
                Reassembler::new(config.reassembly_timeout)
                    .with_strict_completeness(config.strict_completeness),
            ),
            maintenance: Mutex::new(None),
            sweep_gate: Arc::new(Mutex::new(())),
            sweeps: SweepCounter::default(),
        }
    }

    /// Return the active configuration.
    #[must_use]
    pub const fn config(&self) -> &FragmentationConfig { &self.config }

    /// Split `packet` into fragment envelopes when it exceeds the threshold.
    ///
    /// Returns `vec![packet]` unchanged for packets at or below the threshold,
    /// and an empty vector if encoding or splitting fails. A partial batch is
    /// never returned.
    #[must_use]
    pub fn create_fragments(&self, packet: Packet) -> Vec<Packet> {
        match self.try_create_fragments(&packet) {
            Ok(FragmentPlan::Unfragmented) => vec![packet],
            Ok(FragmentPlan::Fragmented { fragments, .. }) => fragments,
            Err(err) => {
                error!(
                    message_type = %packet.message_type(),
                    payload_len = packet.payload().len(),
                    error = %err,
                    "fragment creation failed"
                );
                Vec::new()
            }
        }
    }

    /// Decide how `packet` goes on the wire, reporting failures.
    ///
    /// The threshold applies to the bare frame: every fragment is padded
    /// again as its own envelope, so padding bytes never enter a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError`] if the packet cannot be encoded, its
    /// frame cannot be recovered, or it needs more than `u16::MAX` fragments.
    pub fn try_create_fragments(&self, packet: &Packet) -> Result<FragmentPlan, FragmentationError> {
        let encoded = self.codec.encode(packet)?;
        let unpadded = self
            .codec
            .unpad(&encoded)
            .map_err(FragmentationError::Padding)?;
        if unpadded.len() <= self.config.threshold {
            return Ok(FragmentPlan::Unfragmented);
        }

        let batch = self
            .fragmenter
            .fragment_bytes(packet.message_type(), unpadded)?;
        let fragment_id = batch.fragment_id();
        let fragments: Vec<Packet> = batch
            .into_iter()
            .map(|frame| Packet::fragment_of(packet, frame.to_payload()))
            .collect();

        debug!(
            fragment_id = %fragment_id,
            count = fragments.len(),
            unpadded_len = unpadded.len(),
            "split packet into fragments"
        );
        metrics::inc_fragments_created(fragments.len());
        Ok(FragmentPlan::Fragmented {
            fragment_id,
            fragments,
        })
    }

    /// Feed a fragment envelope into reassembly.
    ///
    /// Returns the reassembled packet, TTL zeroed, when `fragment` completes
    /// its set. Returns `None` both while a set is still collecting and when
    /// the fragment is dropped; use [`process_fragment`](Self::process_fragment)
    /// to tell them apart.
    #[must_use]
    pub fn handle_fragment(&self, fragment: &Packet) -> Option<Packet> {
        self.process_fragment(fragment).into_packet()
    }

    /// Feed a fragment envelope into reassembly, reporting the outcome.
    #[must_use]
    pub fn process_fragment(&self, fragment: &Packet) -> FragmentOutcome {
        self.process_fragment_at(fragment, Instant::now())
    }

    /// Feed a fragment using an explicit clock reading for new sets.
    #[must_use]
    pub fn process_fragment_at(&self, fragment: &Packet, now: Instant) -> FragmentOutcome {
        if fragment.message_type() != MessageType::FRAGMENT {
            return reject(RejectReason::NotAFragment(fragment.message_type()));
        }
        let (header, chunk) = match decode_fragment_payload(fragment.payload()) {
            Ok(decoded) => decoded,
            Err(reason) => return reject(reason),
        };
        debug!(
            fragment_id = %header.fragment_id(),
            index = header.index(),
            total = header.total(),
            original_type = %header.original_type(),
            "received fragment"
        );

        let message = match self.reassembler.push_at(header, chunk, now) {
            ReassemblyStatus::Incomplete { received, total } => {
                return FragmentOutcome::Pending {
                    fragment_id: header.fragment_id(),
                    received,
                    total,
                };
            }
            ReassemblyStatus::Complete(message) => message,
        };

        let fragment_id = message.fragment_id();
        match self.codec.decode(message.payload()) {
            Ok(packet) => {
                debug!(
                    fragment_id = %fragment_id,
                    len = message.payload().len(),
                    "reassembled packet; ttl zeroed to suppress relay"
                );
                metrics::inc_reassembled();
                FragmentOutcome::Complete(packet.with_ttl(0))
            }
            Err(source) => {
                error!(
                    fragment_id = %fragment_id,
                    original_type = %message.original_type(),
                    total = header.total(),
                    error = %source,
                    "failed to decode reassembled packet"
                );
                reject(RejectReason::ReassemblyDecode {
                    fragment_id,
                    source,
                })
            }
        }
    }

    /// Run one eviction sweep immediately, returning the evicted sets.
    pub fn purge_expired(&self) -> Vec<FragmentId> { self.purge_expired_at(Instant::now()) }

    /// Run one eviction sweep relative to `now`.
    pub fn purge_expired_at(&self, now: Instant) -> Vec<FragmentId> {
        let _sweep = self.sweep_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = self.reassembler.purge_expired_at(now);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted stale fragment sets");
            metrics::inc_evicted(evicted.len());
        }
        evicted
    }

    /// Start the maintenance sweep on the current Tokio runtime.
    ///
    /// Calling `start` while active cancels the running sweep, waits for any
    /// in-progress pass, and launches a fresh one. Pending sets are kept.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoRuntime`] when called outside a runtime.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let runtime = Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
        self.start_on(&runtime);
        Ok(())
    }

    /// Start the maintenance sweep on `runtime`.
    pub fn start_on(&self, runtime: &Handle) {
        let mut slot = self.lock_maintenance();
        if let Some(previous) = slot.take() {
            previous.cancel(&self.sweep_gate);
        }
        *slot = Some(MaintenanceTask::spawn(
            runtime,
            Arc::clone(&self.reassembler),
            Arc::clone(&self.sweep_gate),
            Arc::clone(&self.sweeps),
            self.config.cleanup_interval,
        ));
        info!(
            interval_ms = self.config.cleanup_interval.as_millis(),
            timeout_ms = self.config.reassembly_timeout.as_millis(),
            "fragment maintenance started"
        );
    }

    /// Relaunch maintenance without discarding pending sets.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoRuntime`] when called outside a runtime.
    pub fn restart(&self) -> Result<(), LifecycleError> { self.start() }

    /// Cancel maintenance and drop all pending sets.
    pub fn stop(&self) {
        if let Some(task) = self.lock_maintenance().take() {
            task.cancel(&self.sweep_gate);
            info!("fragment maintenance stopped");
        }
        self.reassembler.clear();
        metrics::set_in_flight(0);
    }

    /// Drop all pending sets while leaving maintenance running.
    pub fn clear(&self) {
        self.reassembler.clear();
        metrics::set_in_flight(0);
        debug!("cleared pending fragment sets");
    }

    /// Whether a maintenance sweep is scheduled.
    #[must_use]
    pub fn is_active(&self) -> bool { self.lock_maintenance().is_some() }

    /// Number of pending sets.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.reassembler.in_flight() }

    /// Background sweeps run since the manager was created, across restarts.
    ///
    /// Manual [`purge_expired`](Self::purge_expired) calls are not counted.
    #[must_use]
    pub fn maintenance_sweeps(&self) -> u64 { self.sweeps.load(Ordering::Relaxed) }

    /// Per-set progress for diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> ReassemblySnapshot { self.reassembler.snapshot() }

    /// Human-readable dump of configuration and pending sets.
    #[must_use]
    pub fn debug_info(&self) -> String {
        format!(
            "=== Fragment Manager ===\nFragment size threshold: {} bytes\nMax fragment size: {} bytes\n{}",
            self.config.threshold,
            self.max_fragment_size(),
            self.snapshot()
        )
    }

    fn max_fragment_size(&self) -> NonZeroUsize { self.fragmenter.max_fragment_size() }

    fn lock_maintenance(&self) -> MutexGuard<'_, Option<MaintenanceTask>> {
        self.maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn reject(reason: RejectReason) -> FragmentOutcome {
    warn!(reason = reason.label(), detail = %reason, "dropped fragment");
    metrics::inc_rejected(reason.label());
    FragmentOutcome::Rejected(reason)
}
