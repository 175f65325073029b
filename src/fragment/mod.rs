//! Per-datagram reassembly state.
//!
//! This module collects the types that describe one original datagram in
//! flight: its [`FragmentKey`], the segments that have arrived so far, and the
//! queue that orders them and decides when the datagram is complete.
//! Sharding, limits and aging live in [`crate::domain`].

mod datagram;
mod ecn;
pub mod error;
mod key;
mod queue;
mod segment;

pub use datagram::ReassembledDatagram;
pub use ecn::Ecn;
pub use error::{FragError, FragResult, FragStatus, MalformedFragment, ResourceLimit};
pub use key::FragmentKey;
pub(crate) use queue::{Insertion, ReassemblyQueue, exceeds_max_packet, extension_len};
pub(crate) use segment::{FragmentSegment, ParsedFragment};

/// Ticks a new queue may live before it is discarded as expired.
pub const INITIAL_TTL: u8 = 60;

#[cfg(test)]
mod tests;
