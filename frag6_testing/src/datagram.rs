//! Builders for fragmented IPv6 datagrams.

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use frag6::{
    FragmentKey,
    wire::{
        FragmentHeader,
        IPV6_HEADER_LEN,
        Ipv6Header,
        NEXT_HEADER_FRAGMENT,
        NEXT_HEADER_HOP_BY_HOP,
    },
};

/// Default source address.
pub const SRC: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
/// Default destination address.
pub const DST: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
/// Default upper-layer protocol.
pub const UDP: u8 = 17;

const HOP_LIMIT: u8 = 64;

/// An original datagram and the fragments a sender would cut it into.
///
/// Fragments carry the fixed header, an optional hop-by-hop header and the
/// fragment header, followed by a slice of the payload.
#[derive(Clone, Debug)]
pub struct Datagram {
    src: Ipv6Addr,
    dst: Ipv6Addr,
    ident: u32,
    next_header: u8,
    traffic_class: u8,
    hop_by_hop: usize,
    payload: Vec<u8>,
}

impl Datagram {
    /// A UDP datagram from [`SRC`] to [`DST`].
    pub fn new(ident: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            src: SRC,
            dst: DST,
            ident,
            next_header: UDP,
            traffic_class: 0,
            hop_by_hop: 0,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn addresses(mut self, src: Ipv6Addr, dst: Ipv6Addr) -> Self {
        self.src = src;
        self.dst = dst;
        self
    }

    #[must_use]
    pub fn next_header(mut self, next_header: u8) -> Self {
        self.next_header = next_header;
        self
    }

    #[must_use]
    pub fn traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Carry a hop-by-hop header of `len` bytes, a non-zero multiple of 8,
    /// ahead of the fragment header.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero or not a multiple of 8.
    #[must_use]
    pub fn hop_by_hop(mut self, len: usize) -> Self {
        assert!(len > 0 && len % 8 == 0, "hop-by-hop length must be a multiple of 8");
        self.hop_by_hop = len;
        self
    }

    pub fn key(&self) -> FragmentKey { FragmentKey::new(self.src, self.dst, self.ident) }

    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Offset of the fragment header in every fragment.
    pub fn header_offset(&self) -> usize { IPV6_HEADER_LEN + self.hop_by_hop }

    /// Fragment carrying `payload[offset..offset + len]`.
    pub fn fragment(&self, offset: usize, len: usize, more: bool) -> Bytes {
        self.fragment_with(offset, &self.payload[offset..offset + len], more)
    }

    /// Fragment at `offset` carrying arbitrary `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` or the resulting payload length does not fit in 16
    /// bits.
    pub fn fragment_with(&self, offset: usize, bytes: &[u8], more: bool) -> Bytes {
        let offset = u16::try_from(offset).expect("fragment offset fits the header");
        let mut buf = self.headers(NEXT_HEADER_FRAGMENT, 8 + bytes.len());
        buf.put_slice(&FragmentHeader::new(self.next_header, offset, more, self.ident).encode());
        buf.put_slice(bytes);
        buf.freeze()
    }

    /// Cut the payload into fragments of `chunk` bytes, rounded down to a
    /// multiple of 8; the final fragment carries the remainder.
    pub fn split(&self, chunk: usize) -> Vec<Bytes> {
        let step = (chunk / 8).max(1) * 8;
        let boundaries: Vec<usize> = (1..)
            .map(|i| i * step)
            .take_while(|&boundary| boundary < self.payload.len())
            .collect();
        self.split_at(&boundaries)
    }

    /// Cut the payload at the given ascending, 8-aligned `boundaries`.
    pub fn split_at(&self, boundaries: &[usize]) -> Vec<Bytes> {
        let mut starts = vec![0];
        starts.extend_from_slice(boundaries);
        let mut ends = boundaries.to_vec();
        ends.push(self.payload.len());
        starts
            .iter()
            .zip(&ends)
            .map(|(&start, &end)| self.fragment(start, end - start, end < self.payload.len()))
            .collect()
    }

    /// The datagram as it should look once reassembled: no fragment header,
    /// the upper-layer protocol announced by the last unfragmentable header.
    pub fn reassembled(&self) -> Bytes {
        let mut buf = self.headers(self.next_header, self.payload.len());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Fixed header and hop-by-hop header announcing `next` after them and
    /// `rest` further bytes of payload.
    fn headers(&self, next: u8, rest: usize) -> BytesMut {
        let plen = u16::try_from(self.hop_by_hop + rest).expect("payload length fits");
        let first = if self.hop_by_hop == 0 {
            next
        } else {
            NEXT_HEADER_HOP_BY_HOP
        };
        let mut buf = BytesMut::with_capacity(IPV6_HEADER_LEN + usize::from(plen));
        Ipv6Header::new(self.src, self.dst, first, plen, HOP_LIMIT)
            .with_traffic_class(self.traffic_class)
            .write_to(&mut buf);
        if self.hop_by_hop > 0 {
            buf.put_u8(next);
            buf.put_u8(u8::try_from(self.hop_by_hop / 8 - 1).expect("hop-by-hop length fits"));
            buf.put_bytes(0, self.hop_by_hop - 2);
        }
        buf
    }
}
