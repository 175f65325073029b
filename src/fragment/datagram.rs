use bytes::Bytes;

/// A complete datagram handed back to the IP input path.
///
/// `datagram` holds the unfragmentable headers of the first fragment followed
/// by the fragmentable part; the payload length and the next-header byte that
/// used to announce the fragment header have already been patched, so the
/// caller continues upper-layer dispatch at [`offset`](Self::offset) using
/// [`next_header`](Self::next_header).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledDatagram {
    datagram: Bytes,
    offset: usize,
    payload_len: usize,
    next_header: u8,
}

impl ReassembledDatagram {
    pub(crate) fn new(datagram: Bytes, offset: usize, payload_len: usize, next_header: u8) -> Self {
        Self {
            datagram,
            offset,
            payload_len,
            next_header,
        }
    }

    /// Borrow the whole reconstructed datagram, fixed header included.
    #[must_use]
    pub fn datagram(&self) -> &Bytes { &self.datagram }

    /// Borrow the fragmentable part that follows the unfragmentable headers.
    #[must_use]
    pub fn payload(&self) -> &[u8] { self.datagram.get(self.offset..).unwrap_or_default() }

    /// Offset of the upper-layer header within [`datagram`](Self::datagram).
    #[must_use]
    pub const fn offset(&self) -> usize { self.offset }

    /// Length of the fragmentable part.
    #[must_use]
    pub const fn payload_len(&self) -> usize { self.payload_len }

    /// Protocol of the fragmentable part, taken from the offset-zero fragment.
    #[must_use]
    pub const fn next_header(&self) -> u8 { self.next_header }

    /// Consume the value, returning the owned datagram bytes.
    #[must_use]
    pub fn into_datagram(self) -> Bytes { self.datagram }
}
