//! IPv6 header chain parsing and patching.
//!
//! The reassembly engine needs only a handful of fields from each datagram:
//! the addresses and traffic class from the fixed header, the position of the
//! fragment header within the extension header chain, and the fragment header
//! itself. Everything is read in network byte order through [`bytes::Buf`],
//! after the caller-visible length checks have been made.

use std::net::Ipv6Addr;

use bytes::{Buf, BufMut, BytesMut};

use crate::fragment::MalformedFragment;


/// Length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;
/// Length of the fragment extension header.
pub const FRAGMENT_HEADER_LEN: usize = 8;
/// Largest payload length, fixed header excluded, that reassembly may produce.
pub const IPV6_MAXPACKET: u32 = 65_535;

/// Hop-by-hop options header.
pub const NEXT_HEADER_HOP_BY_HOP: u8 = 0;
/// Routing header.
pub const NEXT_HEADER_ROUTING: u8 = 43;
/// Fragment header.
pub const NEXT_HEADER_FRAGMENT: u8 = 44;
/// Authentication header.
pub const NEXT_HEADER_AUTH: u8 = 51;
/// Destination options header.
pub const NEXT_HEADER_DEST_OPTS: u8 = 60;

/// Offset of the payload length field within the fixed header.
pub const PAYLOAD_LENGTH_FIELD: usize = 4;
/// Offset of the next header field within the fixed header.
pub const NEXT_HEADER_FIELD: usize = 6;
/// Offset of the offset/flags word within the fragment header.
pub const FRAGMENT_OFFSET_FIELD: usize = 2;

const VERSION: u8 = 6;
const FRAGMENT_OFFSET_MASK: u16 = 0xfff8;
const MORE_FRAGMENTS: u16 = 0x0001;
const ECN_CE: u8 = 0x30;

/// Decoded view of the fixed IPv6 header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6Header {
    traffic_class: u8,
    flow_label: u32,
    payload_len: u16,
    next_header: u8,
    hop_limit: u8,
    src: Ipv6Addr,
    dst: Ipv6Addr,
}

impl Ipv6Header {
    /// Construct a header with a zero traffic class and flow label.
    #[must_use]
    pub const fn new(
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
        payload_len: u16,
        hop_limit: u8,
    ) -> Self {
        Self {
            traffic_class: 0,
            flow_label: 0,
            payload_len,
            next_header,
            hop_limit,
            src,
            dst,
        }
    }

    /// Replace the traffic class octet.
    #[must_use]
    pub const fn with_traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Decode the fixed header at the start of `datagram`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFragment::Truncated`] when fewer than
    /// [`IPV6_HEADER_LEN`] bytes are available and
    /// [`MalformedFragment::BadVersion`] when the version nibble is not 6.
    pub fn parse(datagram: &[u8]) -> Result<Self, MalformedFragment> {
        let Some(mut fixed) = datagram.get(..IPV6_HEADER_LEN) else {
            return Err(MalformedFragment::Truncated);
        };
        let word = fixed.get_u32();
        let version = (word >> 28) as u8;
        if version != VERSION {
            return Err(MalformedFragment::BadVersion(version));
        }
        Ok(Self {
            traffic_class: ((word >> 20) & 0xff) as u8,
            flow_label: word & 0x000f_ffff,
            payload_len: fixed.get_u16(),
            next_header: fixed.get_u8(),
            hop_limit: fixed.get_u8(),
            src: Ipv6Addr::from(fixed.get_u128()),
            dst: Ipv6Addr::from(fixed.get_u128()),
        })
    }

    /// Append the encoded header to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32(
            (u32::from(VERSION) << 28) | (u32::from(self.traffic_class) << 20) | self.flow_label,
        );
        buf.put_u16(self.payload_len);
        buf.put_u8(self.next_header);
        buf.put_u8(self.hop_limit);
        buf.put_u128(self.src.into());
        buf.put_u128(self.dst.into());
    }

    #[must_use]
    pub const fn traffic_class(&self) -> u8 { self.traffic_class }

    #[must_use]
    pub const fn payload_len(&self) -> u16 { self.payload_len }

    #[must_use]
    pub const fn next_header(&self) -> u8 { self.next_header }

    #[must_use]
    pub const fn hop_limit(&self) -> u8 { self.hop_limit }

    #[must_use]
    pub const fn src(&self) -> Ipv6Addr { self.src }

    #[must_use]
    pub const fn dst(&self) -> Ipv6Addr { self.dst }
}

//    0               1               2               3
//    +---------------+---------------+-------------------------+-+-+
//  0 |  Next Header  |   Reserved    |      Fragment Offset    |Res|M|
//    +---------------+---------------+-------------------------+-+-+
//  4 |                        Identification                       |
//    +-------------------------------------------------------------+

/// Decoded fragment extension header.
///
/// # Examples
///
/// ```
/// use frag6::wire::FragmentHeader;
///
/// let header = FragmentHeader::new(17, 1232, true, 0xdead_beef);
/// let decoded = FragmentHeader::parse(&header.encode()).expect("valid header");
/// assert_eq!(decoded.offset(), 1232);
/// assert!(decoded.more_fragments());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    next_header: u8,
    offset: u16,
    more_fragments: bool,
    ident: u32,
}

impl FragmentHeader {
    /// Create a header. `offset` is in bytes; its low three bits are dropped.
    #[must_use]
    pub const fn new(next_header: u8, offset: u16, more_fragments: bool, ident: u32) -> Self {
        Self {
            next_header,
            offset: offset & FRAGMENT_OFFSET_MASK,
            more_fragments,
            ident,
        }
    }

    /// Decode the first [`FRAGMENT_HEADER_LEN`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFragment::Truncated`] when the header is incomplete.
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedFragment> {
        let Some(mut raw) = bytes.get(..FRAGMENT_HEADER_LEN) else {
            return Err(MalformedFragment::Truncated);
        };
        let next_header = raw.get_u8();
        raw.advance(1);
        let offlg = raw.get_u16();
        Ok(Self {
            next_header,
            offset: offlg & FRAGMENT_OFFSET_MASK,
            more_fragments: offlg & MORE_FRAGMENTS != 0,
            ident: raw.get_u32(),
        })
    }

    /// Encode the header in network byte order.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAGMENT_HEADER_LEN] {
        let mut raw = [0_u8; FRAGMENT_HEADER_LEN];
        let mut cursor = &mut raw[..];
        cursor.put_u8(self.next_header);
        cursor.put_u8(0);
        cursor.put_u16(self.offset | u16::from(self.more_fragments));
        cursor.put_u32(self.ident);
        raw
    }

    /// Protocol of the fragmentable part, as carried by this fragment.
    #[must_use]
    pub const fn next_header(&self) -> u8 { self.next_header }

    /// Byte offset of this fragment within the fragmentable part.
    #[must_use]
    pub const fn offset(&self) -> u32 { self.offset as u32 }

    #[must_use]
    pub const fn more_fragments(&self) -> bool { self.more_fragments }

    #[must_use]
    pub const fn ident(&self) -> u32 { self.ident }

    /// Offset zero with the M flag clear: a complete datagram that merely
    /// carries a fragment header.
    #[must_use]
    pub const fn is_atomic(&self) -> bool { self.offset == 0 && !self.more_fragments }
}

/// Location of a header within the extension header chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainPosition {
    /// Offset of the header from the start of the datagram.
    pub header_offset: usize,
    /// Offset of the next-header byte that announces this header.
    pub next_header_field: usize,
}

/// Walk the extension header chain of `datagram` to its fragment header.
///
/// # Errors
///
/// Returns [`MalformedFragment::NoFragmentHeader`] when the chain reaches an
/// upper-layer protocol first and [`MalformedFragment::Truncated`] when it
/// runs past the end of the buffer.
pub fn find_fragment_header(datagram: &[u8]) -> Result<ChainPosition, MalformedFragment> {
    walk_chain(datagram, None)
}

/// Confirm that a fragment header sits at `header_offset` and return the
/// position of the next-header byte that announces it.
///
/// # Errors
///
/// Returns [`MalformedFragment::NoFragmentHeader`] when `header_offset` does
/// not land on a fragment header and [`MalformedFragment::Truncated`] when the
/// chain runs past the end of the buffer.
pub fn fragment_header_at(
    datagram: &[u8],
    header_offset: usize,
) -> Result<ChainPosition, MalformedFragment> {
    walk_chain(datagram, Some(header_offset))
}

fn walk_chain(datagram: &[u8], target: Option<usize>) -> Result<ChainPosition, MalformedFragment> {
    let mut next_header = *datagram
        .get(NEXT_HEADER_FIELD)
        .ok_or(MalformedFragment::Truncated)?;
    let mut position = ChainPosition {
        header_offset: IPV6_HEADER_LEN,
        next_header_field: NEXT_HEADER_FIELD,
    };

    loop {
        let reached = match target {
            Some(offset) => position.header_offset >= offset,
            None => next_header == NEXT_HEADER_FRAGMENT,
        };
        if reached {
            let on_target = target.is_none_or(|offset| offset == position.header_offset);
            if next_header != NEXT_HEADER_FRAGMENT || !on_target {
                return Err(MalformedFragment::NoFragmentHeader);
            }
            return Ok(position);
        }

        if !matches!(
            next_header,
            NEXT_HEADER_HOP_BY_HOP | NEXT_HEADER_ROUTING | NEXT_HEADER_DEST_OPTS | NEXT_HEADER_AUTH
        ) {
            return Err(MalformedFragment::NoFragmentHeader);
        }
        let header = datagram
            .get(position.header_offset..position.header_offset + 2)
            .ok_or(MalformedFragment::Truncated)?;
        let len = if next_header == NEXT_HEADER_AUTH {
            (usize::from(header[1]) + 2) * 4
        } else {
            (usize::from(header[1]) + 1) * 8
        };
        next_header = header[0];
        position = ChainPosition {
            header_offset: position.header_offset + len,
            next_header_field: position.header_offset,
        };
    }
}

/// Overwrite the payload length field of the fixed header in `datagram`.
pub(crate) fn set_payload_length(datagram: &mut [u8], payload_len: u16) {
    if let Some(mut field) = datagram.get_mut(PAYLOAD_LENGTH_FIELD..PAYLOAD_LENGTH_FIELD + 2) {
        field.put_u16(payload_len);
    }
}

/// Overwrite the next-header byte at `field`.
pub(crate) fn set_next_header(datagram: &mut [u8], field: usize, next_header: u8) {
    if let Some(byte) = datagram.get_mut(field) {
        *byte = next_header;
    }
}

/// Mark the datagram as having experienced congestion.
pub(crate) fn set_ecn_ce(datagram: &mut [u8]) {
    if let Some(byte) = datagram.get_mut(1) {
        *byte |= ECN_CE;
    }
}
