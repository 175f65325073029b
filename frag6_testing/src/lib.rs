//! Test support for `frag6`.
//!
//! Builders that cut a payload into IPv6 fragment datagrams, a reporter that
//! records ICMP errors, and fixtures for capturing logs and metrics.
//!
//! ```rust
//! use frag6::{FragStatus, ReassemblyDomain, ReassemblyLimits};
//! use frag6_testing::Datagram;
//!
//! let original = Datagram::new(7, vec![0xab; 100]);
//! let domain = ReassemblyDomain::new(ReassemblyLimits::default()).unwrap();
//! let mut last = None;
//! for fragment in original.split(48) {
//!     last = Some(domain.submit_datagram(fragment).unwrap());
//! }
//! assert!(matches!(last, Some(FragStatus::Reassembled(_))));
//! ```

pub mod datagram;
pub mod logging;
pub mod metrics;
pub mod reporter;

pub use datagram::{DST, Datagram, SRC, UDP};
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup, gauge_value};
pub use reporter::RecordingReporter;
