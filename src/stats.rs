//! Reassembly statistics.
//!
//! Counters are plain relaxed atomics; a [`StatsSnapshot`] is a consistent
//! view of each counter but not of the set as a whole.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[cfg(feature = "metrics")]
use crate::metrics;

/// Point-in-time copy of a domain's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Fragments handed to the domain, atomic fragments included.
    pub fragments_received: u64,
    /// Datagrams successfully reassembled.
    pub packets_reassembled: u64,
    /// Fragments discarded for any reason other than expiry or overflow.
    pub fragments_dropped: u64,
    /// Fragments released when their datagram expired.
    pub packets_timed_out: u64,
    /// Fragments released by overflow eviction.
    pub packets_overflowed: u64,
    /// Atomic fragments returned without queueing.
    pub atomic_fragments: u64,
    /// Datagrams destroyed because of overlapping fragments.
    pub overlaps: u64,
}

#[derive(Debug)]
pub(crate) struct ReassemblyStats {
    fragments_received: AtomicU64,
    packets_reassembled: AtomicU64,
    fragments_dropped: AtomicU64,
    packets_timed_out: AtomicU64,
    packets_overflowed: AtomicU64,
    atomic_fragments: AtomicU64,
    overlaps: AtomicU64,
}

fn bump(counter: &AtomicU64, n: usize) {
    counter.fetch_add(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Relaxed);
}

impl ReassemblyStats {
    pub(crate) const fn new() -> Self {
        Self {
            fragments_received: AtomicU64::new(0),
            packets_reassembled: AtomicU64::new(0),
            fragments_dropped: AtomicU64::new(0),
            packets_timed_out: AtomicU64::new(0),
            packets_overflowed: AtomicU64::new(0),
            atomic_fragments: AtomicU64::new(0),
            overlaps: AtomicU64::new(0),
        }
    }

    pub(crate) fn received(&self) {
        bump(&self.fragments_received, 1);
        #[cfg(feature = "metrics")]
        metrics::inc_fragments_received();
    }

    pub(crate) fn reassembled(&self) {
        bump(&self.packets_reassembled, 1);
        #[cfg(feature = "metrics")]
        metrics::inc_reassembled();
    }

    pub(crate) fn dropped(&self, fragments: usize) {
        bump(&self.fragments_dropped, fragments);
        #[cfg(feature = "metrics")]
        metrics::inc_dropped(metrics::DropCause::Discarded, fragments);
    }

    pub(crate) fn timed_out(&self, fragments: usize) {
        bump(&self.packets_timed_out, fragments);
        #[cfg(feature = "metrics")]
        metrics::inc_dropped(metrics::DropCause::Expired, fragments);
    }

    pub(crate) fn overflowed(&self, fragments: usize) {
        bump(&self.packets_overflowed, fragments);
        #[cfg(feature = "metrics")]
        metrics::inc_dropped(metrics::DropCause::Overflow, fragments);
    }

    pub(crate) fn atomic(&self) {
        bump(&self.atomic_fragments, 1);
        #[cfg(feature = "metrics")]
        metrics::inc_atomic();
    }

    pub(crate) fn overlap(&self) {
        bump(&self.overlaps, 1);
        #[cfg(feature = "metrics")]
        metrics::inc_overlaps();
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            packets_reassembled: self.packets_reassembled.load(Ordering::Relaxed),
            fragments_dropped: self.fragments_dropped.load(Ordering::Relaxed),
            packets_timed_out: self.packets_timed_out.load(Ordering::Relaxed),
            packets_overflowed: self.packets_overflowed.load(Ordering::Relaxed),
            atomic_fragments: self.atomic_fragments.load(Ordering::Relaxed),
            overlaps: self.overlaps.load(Ordering::Relaxed),
        }
    }
}
