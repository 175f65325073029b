//! Datagram builders shared by the unit tests.
//!
//! Integration tests use `frag6_testing`, which cannot be linked into the
//! crate's own unit tests without duplicating its types.

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::wire::{
    FragmentHeader,
    IPV6_HEADER_LEN,
    Ipv6Header,
    NEXT_HEADER_FRAGMENT,
    NEXT_HEADER_HOP_BY_HOP,
};

pub(crate) const SRC: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
pub(crate) const DST: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
pub(crate) const UDP: u8 = 17;

/// Offset of the fragment header when no extension header precedes it.
pub(crate) const HEADER_OFFSET: usize = IPV6_HEADER_LEN;

/// Fragment datagram with an optional hop-by-hop header ahead of the
/// fragment header.
#[derive(Clone, Debug)]
pub(crate) struct TestFragment {
    pub(crate) ident: u32,
    pub(crate) offset: u16,
    pub(crate) more: bool,
    pub(crate) traffic_class: u8,
    pub(crate) hop_by_hop: usize,
    pub(crate) payload: Vec<u8>,
}

impl TestFragment {
    pub(crate) fn new(ident: u32, offset: u16, more: bool, payload: Vec<u8>) -> Self {
        Self {
            ident,
            offset,
            more,
            traffic_class: 0,
            hop_by_hop: 0,
            payload,
        }
    }

    pub(crate) fn traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Insert a hop-by-hop header of `len` bytes, a multiple of 8.
    pub(crate) fn hop_by_hop(mut self, len: usize) -> Self {
        self.hop_by_hop = len;
        self
    }

    pub(crate) fn header_offset(&self) -> usize { IPV6_HEADER_LEN + self.hop_by_hop }

    pub(crate) fn build(&self) -> Bytes {
        let plen = u16::try_from(self.hop_by_hop + 8 + self.payload.len()).expect("payload fits");
        let first = if self.hop_by_hop == 0 {
            NEXT_HEADER_FRAGMENT
        } else {
            NEXT_HEADER_HOP_BY_HOP
        };
        let mut buf = BytesMut::new();
        Ipv6Header::new(SRC, DST, first, plen, 64)
            .with_traffic_class(self.traffic_class)
            .write_to(&mut buf);
        if self.hop_by_hop > 0 {
            buf.put_u8(NEXT_HEADER_FRAGMENT);
            buf.put_u8(u8::try_from(self.hop_by_hop / 8 - 1).expect("extension length"));
            buf.put_bytes(0, self.hop_by_hop - 2);
        }
        buf.put_slice(&FragmentHeader::new(UDP, self.offset, self.more, self.ident).encode());
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Deterministic filler so reassembled payloads can be compared byte for byte.
pub(crate) fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add(u8::try_from(i % 251).expect("below 251")))
        .collect()
}
