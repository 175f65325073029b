//! Error types for domain configuration.

use thiserror::Error;

/// Errors returned when building a [`super::ReassemblyDomain`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The bucket count was zero or not a power of two.
    #[error("invalid bucket count {0}; must be a non-zero power of two")]
    InvalidBucketCount(usize),
    /// Fragments were capped at zero per datagram while reassembly is enabled.
    #[error("per-packet fragment limit must be at least 1 when reassembly is enabled")]
    ZeroFragmentsPerPacket,
}
