//! Shared utilities for integration tests.
//!
//! Provides packet fixtures and an engine factory configured with the small
//! sizes used across the fragmentation scenarios.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::time::Duration;

use meshfrag::{FragmentManager, FragmentationConfig, MessageType, Packet, PeerId};
use rstest::fixture;

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Sender used by every generated packet.
pub const SENDER: PeerId = PeerId::new([0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6, 0x07, 0x18]);

/// Fixed-overhead bytes of an unsigned broadcast packet.
pub const BROADCAST_OVERHEAD: usize = 22;

/// Build a broadcast packet whose unpadded encoding is exactly `len` bytes.
pub fn broadcast_packet(len: usize) -> Packet {
    let payload = (0..=u8::MAX).rev().cycle().take(len - BROADCAST_OVERHEAD).collect();
    Packet::new(MessageType::MESSAGE, SENDER, payload).with_timestamp(1_717_171_717_171)
}

/// Threshold 500, chunk 150, protocol timings.
///
/// Panics rather than falling back to the protocol defaults, which would run
/// every scenario against the wrong sizes.
pub fn small_config() -> FragmentationConfig {
    FragmentationConfig::new(500, 150, Duration::from_secs(30), Duration::from_secs(10))
        .expect("valid config")
}

#[fixture]
pub fn engine() -> FragmentManager { FragmentManager::new(small_config()) }

#[fixture]
pub fn default_engine() -> FragmentManager { FragmentManager::default() }
