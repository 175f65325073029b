use std::{fmt, net::Ipv6Addr};

/// Identity of one original datagram: fragments belong together iff their
/// keys are equal.
///
/// # Examples
///
/// ```
/// use std::net::Ipv6Addr;
///
/// use frag6::fragment::FragmentKey;
///
/// let key = FragmentKey::new(Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST, 7);
/// assert_eq!(key.ident(), 7);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    src: Ipv6Addr,
    dst: Ipv6Addr,
    ident: u32,
}

impl FragmentKey {
    #[must_use]
    pub const fn new(src: Ipv6Addr, dst: Ipv6Addr, ident: u32) -> Self { Self { src, dst, ident } }

    #[must_use]
    pub const fn src(&self) -> Ipv6Addr { self.src }

    #[must_use]
    pub const fn dst(&self) -> Ipv6Addr { self.dst }

    #[must_use]
    pub const fn ident(&self) -> u32 { self.ident }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}#{:#010x}", self.src, self.dst, self.ident)
    }
}
