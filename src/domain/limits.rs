//! Resource caps for a reassembly domain.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::sync::AtomicUsize;

/// Number of buckets a domain uses unless configured otherwise.
pub const DEFAULT_BUCKET_COUNT: usize = 1024;
/// Default cap on fragments queued across a domain.
pub const DEFAULT_MAX_FRAGMENTS: usize = 8192;
/// Default cap on datagrams under reassembly across a domain.
pub const DEFAULT_MAX_PACKETS: usize = 8192;
/// Default cap on fragments queued for one datagram.
pub const DEFAULT_MAX_FRAGMENTS_PER_PACKET: usize = 64;

/// Resource caps enforced on admission and by aging.
///
/// `None` leaves a resource unlimited. Setting `max_packets_global` to
/// `Some(0)` disables reassembly: no queue is created and aging discards any
/// that remain.
///
/// # Examples
///
/// ```
/// use frag6::domain::ReassemblyLimits;
///
/// let limits = ReassemblyLimits {
///     max_packets_global: Some(256),
///     ..ReassemblyLimits::default()
/// }
/// .with_derived_bucket_size(64);
/// assert_eq!(limits.max_bucket_size, Some(8));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyLimits {
    /// Fragments queued across the domain.
    pub max_frags_global: Option<usize>,
    /// Datagrams under reassembly across the domain.
    pub max_packets_global: Option<usize>,
    /// Datagrams under reassembly in a single bucket.
    pub max_bucket_size: Option<usize>,
    /// Fragments queued for a single datagram.
    pub max_frags_per_packet: Option<usize>,
}

impl Default for ReassemblyLimits {
    fn default() -> Self {
        Self {
            max_frags_global: Some(DEFAULT_MAX_FRAGMENTS),
            max_packets_global: Some(DEFAULT_MAX_PACKETS),
            max_bucket_size: None,
            max_frags_per_packet: Some(DEFAULT_MAX_FRAGMENTS_PER_PACKET),
        }
        .with_derived_bucket_size(DEFAULT_BUCKET_COUNT)
    }
}

impl ReassemblyLimits {
    /// Limits that never refuse a fragment.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frags_global: None,
            max_packets_global: None,
            max_bucket_size: None,
            max_frags_per_packet: None,
        }
    }

    /// Spread `max_packets_global` over half of `bucket_count` buckets, with
    /// room for at least one queue per bucket. Leaves the bucket size
    /// unlimited when the packet count is.
    #[must_use]
    pub fn with_derived_bucket_size(mut self, bucket_count: usize) -> Self {
        self.max_bucket_size = self
            .max_packets_global
            .map(|packets| (packets / (bucket_count / 2).max(1)).max(1));
        self
    }

    /// Whether reassembly has been switched off entirely.
    #[must_use]
    pub const fn reassembly_disabled(&self) -> bool {
        matches!(self.max_packets_global, Some(0))
    }
}

/// Whether `count` has reached `limit`.
pub(crate) fn at_limit(count: usize, limit: Option<usize>) -> bool {
    limit.is_some_and(|max| count >= max)
}

/// Whether `count` has gone past `limit`.
pub(crate) fn over_limit(count: usize, limit: Option<usize>) -> bool {
    limit.is_some_and(|max| count > max)
}

const UNLIMITED: usize = usize::MAX;

fn encode(limit: Option<usize>) -> usize { limit.unwrap_or(UNLIMITED) }

fn decode(raw: usize) -> Option<usize> { (raw != UNLIMITED).then_some(raw) }

/// Limits readable without a lock and replaceable at runtime.
///
/// Each field is read independently, so a concurrent [`store`](Self::store)
/// may be observed half applied; the caps are soft regardless.
#[derive(Debug)]
pub(crate) struct SharedLimits {
    frags: AtomicUsize,
    packets: AtomicUsize,
    bucket: AtomicUsize,
    per_packet: AtomicUsize,
}

impl SharedLimits {
    pub(crate) fn new(limits: ReassemblyLimits) -> Self {
        Self {
            frags: AtomicUsize::new(encode(limits.max_frags_global)),
            packets: AtomicUsize::new(encode(limits.max_packets_global)),
            bucket: AtomicUsize::new(encode(limits.max_bucket_size)),
            per_packet: AtomicUsize::new(encode(limits.max_frags_per_packet)),
        }
    }

    pub(crate) fn load(&self) -> ReassemblyLimits {
        ReassemblyLimits {
            max_frags_global: decode(self.frags.load(Ordering::Relaxed)),
            max_packets_global: decode(self.packets.load(Ordering::Relaxed)),
            max_bucket_size: decode(self.bucket.load(Ordering::Relaxed)),
            max_frags_per_packet: decode(self.per_packet.load(Ordering::Relaxed)),
        }
    }

    pub(crate) fn store(&self, limits: ReassemblyLimits) {
        self.frags
            .store(encode(limits.max_frags_global), Ordering::Relaxed);
        self.packets
            .store(encode(limits.max_packets_global), Ordering::Relaxed);
        self.bucket
            .store(encode(limits.max_bucket_size), Ordering::Relaxed);
        self.per_packet
            .store(encode(limits.max_frags_per_packet), Ordering::Relaxed);
    }
}
