//! Error and status types surfaced by fragment admission.
//!
//! Everything that can go wrong while admitting a fragment is handled inside
//! the engine; these types only tell the caller what happened to the
//! fragment it handed over.

use std::fmt;

use thiserror::Error;

use super::{Ecn, FragmentKey, ReassembledDatagram};

/// What became of an admitted fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragStatus {
    /// Queued; the datagram still has gaps.
    Consumed,
    /// Byte-identical to a queued fragment and silently discarded.
    Duplicate,
    /// The fragment completed its datagram.
    Reassembled(ReassembledDatagram),
    /// An atomic fragment, returned with its fragment header stripped.
    Atomic(ReassembledDatagram),
}

/// Result of submitting a fragment to a reassembly domain.
pub type FragResult = Result<FragStatus, FragError>;

/// Structural problems with a fragment or the datagram carrying it.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MalformedFragment {
    /// The buffer ends before the headers or advertised payload do.
    #[error("datagram truncated")]
    Truncated,
    /// The version nibble is not 6.
    #[error("unsupported IP version {0}")]
    BadVersion(u8),
    /// No fragment header where one was expected.
    #[error("no fragment header in the extension header chain")]
    NoFragmentHeader,
    /// Jumbo payloads cannot carry a fragment header.
    #[error("jumbo payload carries a fragment header")]
    Jumbogram,
    /// The fragment carries no fragmentable data.
    #[error("fragment carries no payload")]
    ZeroLength,
    /// A non-final fragment whose length is not a multiple of 8 octets.
    #[error("non-final fragment length {0} is not a multiple of 8")]
    UnalignedLength(u32),
    /// Reassembly would exceed the largest representable datagram.
    #[error("reassembled datagram would reach {attempted} bytes")]
    Oversized {
        /// Size the datagram would have reached.
        attempted: u32,
    },
}

/// Resource cap that caused a fragment to be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceLimit {
    /// Fragments queued across the domain.
    GlobalFragments,
    /// Datagrams under reassembly across the domain.
    GlobalPackets,
    /// Datagrams under reassembly in one bucket.
    BucketQueues,
    /// Fragments queued for one datagram.
    FragmentsPerPacket,
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GlobalFragments => "global fragment limit",
            Self::GlobalPackets => "global packet limit",
            Self::BucketQueues => "bucket queue limit",
            Self::FragmentsPerPacket => "per-packet fragment limit",
        })
    }
}

/// Reasons a fragment was not accepted.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FragError {
    /// The fragment or its datagram is malformed.
    #[error("malformed fragment: {0}")]
    Malformed(#[from] MalformedFragment),
    /// The fragment intersects queued data; the whole datagram was dropped.
    #[error("fragment at offset {offset} overlaps queued data for {key}")]
    OverlapViolation {
        /// Datagram whose queue was destroyed.
        key: FragmentKey,
        /// Offset carried by the offending fragment.
        offset: u32,
    },
    /// The fragment disagrees with the queued final fragment; the whole
    /// datagram was dropped.
    #[error("fragment length disagrees with the final fragment for {key}")]
    InconsistentLength {
        /// Datagram whose queue was destroyed.
        key: FragmentKey,
    },
    /// The fragment's ECN codepoint cannot be merged with the queue's.
    #[error("ECN codepoint {arriving:?} cannot join {queued:?} for {key}")]
    InconsistentEcn {
        /// Datagram the fragment belonged to.
        key: FragmentKey,
        /// Codepoint accumulated by the queue.
        queued: Ecn,
        /// Codepoint carried by the fragment.
        arriving: Ecn,
    },
    /// A resource cap refused the fragment.
    #[error("reassembly resources exhausted: {0}")]
    ResourceExhausted(ResourceLimit),
}
