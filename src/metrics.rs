//! Metric helpers for `frag6`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate.

use metrics::{counter, gauge};

/// Name of the counter tracking fragments handed to a domain.
pub const FRAGMENTS_RECEIVED: &str = "frag6_fragments_received_total";
/// Name of the counter tracking reassembled datagrams.
pub const PACKETS_REASSEMBLED: &str = "frag6_packets_reassembled_total";
/// Name of the counter tracking fragments released without reassembly.
pub const FRAGMENTS_DROPPED: &str = "frag6_fragments_dropped_total";
/// Name of the counter tracking atomic fragments.
pub const ATOMIC_FRAGMENTS: &str = "frag6_atomic_fragments_total";
/// Name of the counter tracking datagrams destroyed by overlaps.
pub const OVERLAPS: &str = "frag6_overlaps_total";
/// Name of the gauge tracking datagrams under reassembly.
pub const QUEUES_ACTIVE: &str = "frag6_queues_active";

/// Why fragments were released without reassembly.
#[derive(Clone, Copy, Debug)]
pub enum DropCause {
    /// Rejected on arrival or destroyed with their datagram.
    Discarded,
    /// Their datagram's time to live ran out.
    Expired,
    /// Evicted to bring the domain back under its limits.
    Overflow,
}

impl DropCause {
    fn as_str(self) -> &'static str {
        match self {
            DropCause::Discarded => "discarded",
            DropCause::Expired => "expired",
            DropCause::Overflow => "overflow",
        }
    }
}

/// Record a fragment handed to a domain.
pub fn inc_fragments_received() { counter!(FRAGMENTS_RECEIVED).increment(1); }

/// Record a reassembled datagram.
pub fn inc_reassembled() { counter!(PACKETS_REASSEMBLED).increment(1); }

/// Record `fragments` released for the given cause.
pub fn inc_dropped(cause: DropCause, fragments: usize) {
    counter!(FRAGMENTS_DROPPED, "cause" => cause.as_str())
        .increment(u64::try_from(fragments).unwrap_or(u64::MAX));
}

/// Record an atomic fragment.
pub fn inc_atomic() { counter!(ATOMIC_FRAGMENTS).increment(1); }

/// Record a datagram destroyed by overlapping fragments.
pub fn inc_overlaps() { counter!(OVERLAPS).increment(1); }

/// Increment the active queues gauge.
pub fn inc_queues() { gauge!(QUEUES_ACTIVE).increment(1.0); }

/// Decrement the active queues gauge by `n`.
#[expect(
    clippy::cast_precision_loss,
    reason = "queue counts stay far below 2^52"
)]
pub fn dec_queues(n: usize) { gauge!(QUEUES_ACTIVE).decrement(n as f64); }
