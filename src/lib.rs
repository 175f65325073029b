//! IPv6 fragment reassembly.
//!
//! This crate collects inbound IPv6 fragments (RFC 8200 §4.5) into complete
//! datagrams under bounded memory. A [`ReassemblyDomain`] holds the state of
//! one stack instance: fragments are submitted to it as they arrive, a
//! periodic [`age_tick`](ReassemblyDomain::age_tick) expires stale datagrams,
//! and ICMPv6 errors are handed to an [`IcmpReporter`] of the caller's
//! choosing.
//!
//! ```
//! use bytes::{BufMut, BytesMut};
//! use frag6::{
//!     ReassemblyDomain,
//!     ReassemblyLimits,
//!     fragment::FragStatus,
//!     wire::{FragmentHeader, Ipv6Header, NEXT_HEADER_FRAGMENT},
//! };
//!
//! let domain = ReassemblyDomain::new(ReassemblyLimits::default()).expect("valid limits");
//! let src = "2001:db8::1".parse().expect("address");
//! let dst = "2001:db8::2".parse().expect("address");
//!
//! let fragment = |offset: u16, more: bool, payload: &[u8]| {
//!     let plen = u16::try_from(8 + payload.len()).expect("small payload");
//!     let mut buf = BytesMut::new();
//!     Ipv6Header::new(src, dst, NEXT_HEADER_FRAGMENT, plen, 64).write_to(&mut buf);
//!     buf.put_slice(&FragmentHeader::new(17, offset, more, 7).encode());
//!     buf.put_slice(payload);
//!     buf.freeze()
//! };
//!
//! let first = domain.submit_datagram(fragment(0, true, &[1; 16])).expect("queued");
//! assert_eq!(first, FragStatus::Consumed);
//! let last = domain.submit_datagram(fragment(16, false, &[2; 5])).expect("complete");
//! let FragStatus::Reassembled(datagram) = last else {
//!     panic!("datagram should be complete");
//! };
//! assert_eq!(datagram.payload_len(), 21);
//! assert_eq!(datagram.next_header(), 17);
//! ```

pub mod domain;
pub mod fragment;
pub mod icmp;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod stats;
mod sync;
#[cfg(test)]
mod test_helpers;
#[cfg(not(loom))]
pub mod timer;
pub mod wire;

pub use domain::{ConfigError, ReassemblyDomain, ReassemblyDomainBuilder, ReassemblyLimits};
pub use fragment::{FragError, FragResult, FragStatus, FragmentKey, ReassembledDatagram};
pub use icmp::{DiscardReports, IcmpErrorKind, IcmpReport, IcmpReporter, RateLimitedReporter};
pub use stats::StatsSnapshot;
