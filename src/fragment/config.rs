//! Configuration used by fragmentation and reassembly.
//!
//! The defaults are protocol constants shared with the sibling
//! implementation; peers that disagree on them will not interoperate.

use std::{num::NonZeroUsize, time::Duration};

use thiserror::Error;

use super::FRAGMENT_HEADER_SIZE;
use crate::packet::{HEADER_SIZE, PEER_ID_SIZE};

/// Link MTU the protocol constants were derived from.
pub const DEFAULT_LINK_MTU: usize = 512;
/// Packets whose unpadded encoding exceeds this many bytes are fragmented.
pub const FRAGMENT_SIZE_THRESHOLD: usize = 512;
/// Largest chunk carried by one fragment.
pub const MAX_FRAGMENT_SIZE: usize = 469;
/// Incomplete sets older than this are evicted.
pub const FRAGMENT_TIMEOUT: Duration = Duration::from_secs(30);
/// Period of the maintenance sweep.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10);

/// Envelope bytes wrapped around every chunk: the envelope header, sender and
/// recipient identifiers, and the fragment header.
const FRAGMENT_ENVELOPE_OVERHEAD: usize = HEADER_SIZE + 2 * PEER_ID_SIZE + FRAGMENT_HEADER_SIZE;

/// Rejected configuration values.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maximum fragment size must be non-zero")]
    ZeroFragmentSize,
    #[error("reassembly timeout must be non-zero")]
    ZeroTimeout,
    #[error("cleanup interval must be non-zero")]
    ZeroCleanupInterval,
    #[error("link MTU {mtu} cannot carry a fragment (overhead is {overhead} bytes)")]
    MtuTooSmall { mtu: usize, overhead: usize },
}

/// Settings that bound fragment sizes and reassembly resource usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentationConfig {
    /// Unpadded encoded length at or below which packets go out whole.
    pub threshold: usize,
    /// Maximum number of packet bytes carried by a single fragment.
    pub max_fragment_size: NonZeroUsize,
    /// Age after which an incomplete set is evicted.
    pub reassembly_timeout: Duration,
    /// Period of the background eviction sweep.
    pub cleanup_interval: Duration,
    /// Require every index in `0..total` before reassembling, instead of only
    /// counting distinct indices.
    pub strict_completeness: bool,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            threshold: FRAGMENT_SIZE_THRESHOLD,
            max_fragment_size: NonZeroUsize::new(MAX_FRAGMENT_SIZE).unwrap_or(NonZeroUsize::MIN),
            reassembly_timeout: FRAGMENT_TIMEOUT,
            cleanup_interval: CLEANUP_INTERVAL,
            strict_completeness: false,
        }
    }
}

impl FragmentationConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the fragment size, timeout or cleanup
    /// interval is zero.
    pub fn new(
        threshold: usize,
        max_fragment_size: usize,
        reassembly_timeout: Duration,
        cleanup_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let max_fragment_size =
            NonZeroUsize::new(max_fragment_size).ok_or(ConfigError::ZeroFragmentSize)?;
        if reassembly_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroCleanupInterval);
        }
        Ok(Self {
            threshold,
            max_fragment_size,
            reassembly_timeout,
            cleanup_interval,
            strict_completeness: false,
        })
    }

    /// Derive sizes from the link MTU, keeping the default timings.
    ///
    /// Packets that fit the MTU go out whole; each fragment envelope, with its
    /// recipient and fragment headers, fills the MTU exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MtuTooSmall`] when the MTU cannot hold the
    /// envelope overhead plus at least one chunk byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use meshfrag::fragment::{DEFAULT_LINK_MTU, FragmentationConfig};
    ///
    /// let config = FragmentationConfig::for_link_mtu(DEFAULT_LINK_MTU).expect("valid MTU");
    /// assert_eq!(config, FragmentationConfig::default());
    /// ```
    pub fn for_link_mtu(mtu: usize) -> Result<Self, ConfigError> {
        let chunk = mtu
            .checked_sub(FRAGMENT_ENVELOPE_OVERHEAD)
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::MtuTooSmall {
                mtu,
                overhead: FRAGMENT_ENVELOPE_OVERHEAD,
            })?;
        Ok(Self {
            threshold: mtu,
            max_fragment_size: chunk,
            ..Self::default()
        })
    }

    /// Enable or disable the strict index-set completeness check.
    #[must_use]
    pub const fn with_strict_completeness(mut self, strict: bool) -> Self {
        self.strict_completeness = strict;
        self
    }
}
