//! Arrived fragments, before and after admission to a queue.

use bytes::{Bytes, BytesMut};

use super::{Ecn, FragmentKey, MalformedFragment, ReassembledDatagram, queue::FirstFragment};
use crate::wire::{
    self,
    ChainPosition,
    FRAGMENT_HEADER_LEN,
    FragmentHeader,
    IPV6_HEADER_LEN,
    Ipv6Header,
};

/// One fragment held by a reassembly queue.
///
/// `payload` is a zero-copy slice of `datagram`; the full datagram is kept so
/// an ICMP error can quote the fragment that triggered it.
#[derive(Clone, Debug)]
pub(crate) struct FragmentSegment {
    offset: u32,
    length: u32,
    more_fragments: bool,
    header_offset: u32,
    payload: Bytes,
    datagram: Bytes,
}

impl FragmentSegment {
    /// Byte offset within the fragmentable part. Always a multiple of 8.
    pub(crate) const fn offset(&self) -> u32 { self.offset }

    /// First byte offset past this segment.
    pub(crate) const fn end(&self) -> u32 { self.offset + self.length }

    pub(crate) const fn more_fragments(&self) -> bool { self.more_fragments }

    /// Offset of the fragment header within [`datagram`](Self::datagram).
    pub(crate) const fn header_offset(&self) -> u32 { self.header_offset }

    pub(crate) fn payload(&self) -> &Bytes { &self.payload }

    /// The datagram this fragment arrived in.
    pub(crate) fn datagram(&self) -> &Bytes { &self.datagram }

    /// Same range, same M flag and byte-identical payload.
    pub(crate) fn is_duplicate_of(&self, other: &Self) -> bool {
        self.offset == other.offset
            && self.length == other.length
            && self.more_fragments == other.more_fragments
            && self.payload == other.payload
    }
}

/// A datagram whose fragment header has been located and decoded but which
/// has not been admitted to a queue yet.
#[derive(Debug)]
pub(crate) struct ParsedFragment {
    key: FragmentKey,
    ecn: Ecn,
    header: FragmentHeader,
    position: ChainPosition,
    header_offset: u32,
    datagram: Bytes,
    payload: Bytes,
}

impl ParsedFragment {
    /// Decode `datagram`, whose fragment header starts at `header_offset`.
    ///
    /// Trailing bytes beyond the advertised payload length are discarded.
    pub(crate) fn parse(datagram: &Bytes, header_offset: usize) -> Result<Self, MalformedFragment> {
        let fixed = Ipv6Header::parse(datagram)?;
        let position = wire::fragment_header_at(datagram, header_offset)?;
        if fixed.payload_len() == 0 {
            return Err(MalformedFragment::Jumbogram);
        }

        let total = IPV6_HEADER_LEN + usize::from(fixed.payload_len());
        let payload_start = header_offset + FRAGMENT_HEADER_LEN;
        if datagram.len() < total || payload_start > total {
            return Err(MalformedFragment::Truncated);
        }
        let header = FragmentHeader::parse(
            datagram
                .get(header_offset..)
                .ok_or(MalformedFragment::Truncated)?,
        )?;
        let datagram = datagram.slice(..total);
        let payload = datagram.slice(payload_start..);

        Ok(Self {
            key: FragmentKey::new(fixed.src(), fixed.dst(), header.ident()),
            ecn: Ecn::from_traffic_class(fixed.traffic_class()),
            header,
            position,
            header_offset: u32::try_from(header_offset).map_err(|_| MalformedFragment::Truncated)?,
            datagram,
            payload,
        })
    }

    pub(crate) const fn key(&self) -> FragmentKey { self.key }

    pub(crate) const fn ecn(&self) -> Ecn { self.ecn }

    pub(crate) const fn offset(&self) -> u32 { self.header.offset() }

    pub(crate) const fn more_fragments(&self) -> bool { self.header.more_fragments() }

    pub(crate) const fn header_offset(&self) -> u32 { self.header_offset }

    pub(crate) const fn is_atomic(&self) -> bool { self.header.is_atomic() }

    pub(crate) fn datagram(&self) -> &Bytes { &self.datagram }

    pub(crate) fn length(&self) -> u32 {
        // Bounded by the 16-bit payload length field.
        u32::try_from(self.payload.len()).unwrap_or(u32::MAX)
    }

    /// Reject empty fragments and non-final fragments whose length is not a
    /// multiple of 8 octets.
    pub(crate) fn check_length(&self) -> Result<(), MalformedFragment> {
        let length = self.length();
        if length == 0 {
            return Err(MalformedFragment::ZeroLength);
        }
        if self.more_fragments() && length % 8 != 0 {
            return Err(MalformedFragment::UnalignedLength(length));
        }
        Ok(())
    }

    /// Bookkeeping recorded by a queue when this is its offset-zero fragment.
    pub(crate) fn first_fragment(&self) -> FirstFragment {
        FirstFragment {
            unfrag_len: self.header_offset,
            next_header: self.header.next_header(),
            next_header_field: self.position.next_header_field,
            unfragmentable: self.datagram.slice(..self.position.header_offset),
        }
    }

    /// Strip the fragment header from an atomic fragment.
    pub(crate) fn into_atomic(self) -> ReassembledDatagram {
        let header_offset = self.position.header_offset;
        let mut buf = BytesMut::with_capacity(self.datagram.len() - FRAGMENT_HEADER_LEN);
        buf.extend_from_slice(&self.datagram[..header_offset]);
        buf.extend_from_slice(&self.payload);
        let payload_len = buf.len() - IPV6_HEADER_LEN;
        wire::set_payload_length(&mut buf, u16::try_from(payload_len).unwrap_or(u16::MAX));
        wire::set_next_header(
            &mut buf,
            self.position.next_header_field,
            self.header.next_header(),
        );
        ReassembledDatagram::new(
            buf.freeze(),
            header_offset,
            self.payload.len(),
            self.header.next_header(),
        )
    }

    pub(crate) fn into_segment(self) -> FragmentSegment {
        FragmentSegment {
            offset: self.header.offset(),
            length: self.length(),
            more_fragments: self.header.more_fragments(),
            header_offset: self.header_offset,
            payload: self.payload,
            datagram: self.datagram,
        }
    }
}
