//! Ordered accumulation of the fragments of one datagram.
//!
//! `ReassemblyQueue` keeps its segments sorted by offset and enforces the
//! overlap policy of RFC 8200 §4.5: an exact duplicate is ignored, any other
//! intersection poisons the whole datagram. The queue itself knows nothing
//! about locks or global limits; [`crate::domain`] owns those.

use bytes::{Bytes, BytesMut};

use super::{Ecn, FragmentKey, FragmentSegment, INITIAL_TTL, ReassembledDatagram};
use crate::wire::{self, IPV6_HEADER_LEN, IPV6_MAXPACKET};

const FIXED_HEADER_LEN: u32 = 40;

/// Whether a fragment ending at `end` would push the payload length of the
/// reassembled datagram past [`IPV6_MAXPACKET`]. `unfrag_len` counts the
/// fixed header, which the payload length does not.
pub(crate) fn exceeds_max_packet(unfrag_len: Option<u32>, end: u32) -> bool {
    extension_len(unfrag_len) + end > IPV6_MAXPACKET
}

/// Length of the unfragmentable extension headers alone.
pub(crate) fn extension_len(unfrag_len: Option<u32>) -> u32 {
    unfrag_len.map_or(0, |len| len.saturating_sub(FIXED_HEADER_LEN))
}

/// Facts trusted from the first offset-zero fragment that was accepted.
#[derive(Clone, Debug)]
pub(crate) struct FirstFragment {
    pub(crate) unfrag_len: u32,
    pub(crate) next_header: u8,
    pub(crate) next_header_field: usize,
    pub(crate) unfragmentable: Bytes,
}

/// Outcome of offering a segment to a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Insertion {
    Inserted,
    /// Byte-identical to a queued segment; nothing changed.
    Duplicate,
    /// Intersects queued data without being an exact duplicate.
    Overlap,
    /// Extends past, or disagrees with, an already queued final fragment.
    InconsistentLength,
}

#[derive(Debug)]
pub(crate) struct ReassemblyQueue {
    key: FragmentKey,
    ttl: u8,
    ecn: Ecn,
    first: Option<FirstFragment>,
    segments: Vec<FragmentSegment>,
    touched: u64,
}

impl ReassemblyQueue {
    pub(crate) fn new(key: FragmentKey, ecn: Ecn, touched: u64) -> Self {
        Self {
            key,
            ttl: INITIAL_TTL,
            ecn,
            first: None,
            segments: Vec::new(),
            touched,
        }
    }

    pub(crate) const fn key(&self) -> FragmentKey { self.key }

    pub(crate) const fn ecn(&self) -> Ecn { self.ecn }

    pub(crate) fn set_ecn(&mut self, ecn: Ecn) { self.ecn = ecn; }

    #[cfg(test)]
    pub(crate) const fn ttl(&self) -> u8 { self.ttl }

    pub(crate) const fn touched(&self) -> u64 { self.touched }

    pub(crate) fn touch(&mut self, stamp: u64) { self.touched = stamp; }

    pub(crate) fn nfrag(&self) -> usize { self.segments.len() }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[FragmentSegment] { &self.segments }

    pub(crate) fn unfrag_len(&self) -> Option<u32> {
        self.first.as_ref().map(|first| first.unfrag_len)
    }

    #[cfg(test)]
    pub(crate) fn next_header(&self) -> Option<u8> {
        self.first.as_ref().map(|first| first.next_header)
    }

    /// Record the offset-zero bookkeeping unless an earlier fragment already
    /// did, then evict queued segments that the now-known unfragmentable
    /// length pushes past [`IPV6_MAXPACKET`].
    pub(crate) fn record_first(&mut self, first: FirstFragment) -> Vec<FragmentSegment> {
        if self.first.is_some() {
            return Vec::new();
        }
        let unfrag_len = first.unfrag_len;
        self.first = Some(first);

        let (oversized, kept): (Vec<_>, Vec<_>) = self
            .segments
            .drain(..)
            .partition(|segment| exceeds_max_packet(Some(unfrag_len), segment.end()));
        self.segments = kept;
        oversized
    }

    /// Offer `segment`, keeping the list sorted by offset.
    pub(crate) fn insert(&mut self, segment: FragmentSegment) -> Insertion {
        let index = self
            .segments
            .partition_point(|queued| queued.offset() <= segment.offset());

        if let Some(prev) = index.checked_sub(1).and_then(|i| self.segments.get(i)) {
            if prev.is_duplicate_of(&segment) {
                return Insertion::Duplicate;
            }
            if prev.end() > segment.offset() {
                return Insertion::Overlap;
            }
        }
        if let Some(next) = self.segments.get(index)
            && segment.end() > next.offset()
        {
            return Insertion::Overlap;
        }

        if let Some(last) = self.segments.last() {
            let final_end = (!last.more_fragments()).then(|| last.end());
            let past_final = final_end.is_some_and(|end| segment.end() > end);
            let second_final = !segment.more_fragments()
                && (final_end.is_some() || last.end() > segment.end());
            if past_final || second_final {
                return Insertion::InconsistentLength;
            }
        }

        self.segments.insert(index, segment);
        Insertion::Inserted
    }

    /// Return the offset-zero bookkeeping when the segments run contiguously
    /// from zero and end in a fragment with the M flag clear.
    pub(crate) fn completion(&self) -> Option<&FirstFragment> {
        let first = self.first.as_ref()?;
        let mut expected = 0;
        for segment in &self.segments {
            if segment.offset() != expected {
                return None;
            }
            expected = segment.end();
        }
        let last = self.segments.last()?;
        (!last.more_fragments()).then_some(first)
    }

    /// Concatenate the unfragmentable headers and every payload into one
    /// datagram. Returns the queue unchanged if it is not complete.
    pub(crate) fn assemble(self) -> Result<ReassembledDatagram, Self> {
        let Some(first) = self.completion() else {
            return Err(self);
        };
        let FirstFragment {
            unfrag_len,
            next_header,
            next_header_field,
            ref unfragmentable,
        } = *first;

        let plen: usize = self.segments.iter().map(|s| s.payload().len()).sum();
        let mut buf = BytesMut::with_capacity(unfragmentable.len() + plen);
        buf.extend_from_slice(unfragmentable);
        for segment in &self.segments {
            buf.extend_from_slice(segment.payload());
        }

        let payload_len = buf.len() - IPV6_HEADER_LEN;
        wire::set_payload_length(&mut buf, u16::try_from(payload_len).unwrap_or(u16::MAX));
        wire::set_next_header(&mut buf, next_header_field, next_header);
        if self.ecn == Ecn::Ce {
            wire::set_ecn_ce(&mut buf);
        }

        Ok(ReassembledDatagram::new(
            buf.freeze(),
            unfrag_len as usize,
            plen,
            next_header,
        ))
    }

    /// Age the queue by one tick, reporting whether it has expired.
    pub(crate) fn tick(&mut self) -> bool {
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl == 0
    }

    /// The offset-zero segment, which is the one quoted in ICMP errors.
    pub(crate) fn first_segment(&self) -> Option<&FragmentSegment> {
        self.segments.first().filter(|segment| segment.offset() == 0)
    }
}
