//! Metric helpers for `meshfrag`.
//!
//! This module defines metric names and thin wrappers around the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

/// Name of the counter tracking fragments emitted by the send path.
pub const FRAGMENTS_CREATED: &str = "meshfrag_fragments_created_total";
/// Name of the counter tracking packets rebuilt from fragments.
pub const PACKETS_REASSEMBLED: &str = "meshfrag_packets_reassembled_total";
/// Name of the counter tracking dropped inbound fragments, labelled by reason.
pub const FRAGMENTS_REJECTED: &str = "meshfrag_fragments_rejected_total";
/// Name of the counter tracking sets evicted by the maintenance sweep.
pub const SETS_EVICTED: &str = "meshfrag_sets_evicted_total";
/// Name of the gauge tracking pending fragment sets.
pub const SETS_IN_FLIGHT: &str = "meshfrag_sets_in_flight";

/// Record fragments produced for one outbound packet.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "no-op without metrics"))]
pub fn inc_fragments_created(count: usize) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAGMENTS_CREATED).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record a successfully reassembled packet.
pub fn inc_reassembled() {
    #[cfg(feature = "metrics")]
    metrics::counter!(PACKETS_REASSEMBLED).increment(1);
}

/// Record a dropped fragment.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "no-op without metrics"))]
pub fn inc_rejected(reason: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAGMENTS_REJECTED, "reason" => reason).increment(1);
}

/// Record sets removed by a maintenance sweep.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "no-op without metrics"))]
pub fn inc_evicted(count: usize) {
    #[cfg(feature = "metrics")]
    metrics::counter!(SETS_EVICTED).increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Publish the number of pending sets.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "no-op without metrics"))]
pub fn set_in_flight(count: usize) {
    #[cfg(feature = "metrics")]
    {
        #[expect(clippy::cast_precision_loss, reason = "gauge values are f64")]
        let value = count as f64;
        metrics::gauge!(SETS_IN_FLIGHT).set(value);
    }
}
