//! Background sweep that evicts abandoned fragment sets.
//!
//! Each [`MaintenanceTask`] owns a [`CancellationToken`]. Sweeps run while
//! holding a gate shared by every task launched from the same manager, and a
//! task re-checks its token after taking the gate. Cancelling a task and then
//! taking the gate therefore guarantees that any in-progress sweep has
//! finished and that the cancelled loop never sweeps again, so a relaunch
//! cannot overlap an old sweep.

use std::{
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Reassembler;
use crate::metrics;

/// Serialises sweeps across successive maintenance tasks.
pub(crate) type SweepGate = Arc<Mutex<()>>;

/// Sweeps completed by every task launched from the same manager.
pub(crate) type SweepCounter = Arc<AtomicU64>;

/// Handle to a running maintenance loop.
#[derive(Debug)]
pub(crate) struct MaintenanceTask {
    token: CancellationToken,
}

impl MaintenanceTask {
    /// Launch a sweep every `interval` on `runtime`. The first sweep happens
    /// one full interval after launch.
    pub(crate) fn spawn(
        runtime: &Handle,
        reassembler: Arc<Reassembler>,
        gate: SweepGate,
        sweeps: SweepCounter,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        runtime.spawn(run(reassembler, gate, sweeps, interval, token.clone()));
        Self { token }
    }

    /// Cancel the loop and wait out any sweep it is running.
    pub(crate) fn cancel(self, gate: &Mutex<()>) {
        self.token.cancel();
        drop(gate.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) { self.token.cancel(); }
}

async fn run(
    reassembler: Arc<Reassembler>,
    gate: SweepGate,
    sweeps: SweepCounter,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,

            _ = ticker.tick() => {}
        }

        let _sweep = gate.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            break;
        }
        let evicted = reassembler.purge_expired();
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted stale fragment sets");
            metrics::inc_evicted(evicted.len());
        }
        metrics::set_in_flight(reassembler.in_flight());
        sweeps.fetch_add(1, Ordering::Relaxed);
    }
    debug!("fragment maintenance stopped");
}
