//! ICMPv6 error reporting collaborator.
//!
//! The engine never transmits anything itself. Whenever RFC 8200 calls for an
//! ICMPv6 error it builds an [`IcmpReport`] quoting the offending datagram and
//! hands it to the [`IcmpReporter`] installed on the domain, always after the
//! bucket lock has been released.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use leaky_bucket::RateLimiter;
use tracing::trace;

/// Which ICMPv6 error should be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IcmpErrorKind {
    /// Time Exceeded, code 1: fragment reassembly time exceeded.
    TimeExceeded,
    /// Parameter Problem, code 0: erroneous header field.
    ParamProblem {
        /// Byte offset of the offending field within the quoted datagram.
        pointer: u32,
    },
}

/// An ICMPv6 error the caller should transmit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IcmpReport {
    kind: IcmpErrorKind,
    datagram: Bytes,
}

impl IcmpReport {
    /// Create a report quoting `datagram`.
    #[must_use]
    pub fn new(kind: IcmpErrorKind, datagram: Bytes) -> Self { Self { kind, datagram } }

    #[must_use]
    pub const fn kind(&self) -> IcmpErrorKind { self.kind }

    /// The datagram to quote in the error message.
    #[must_use]
    pub fn datagram(&self) -> &Bytes { &self.datagram }

    #[must_use]
    pub fn into_datagram(self) -> Bytes { self.datagram }
}

/// Receives the ICMPv6 errors produced by reassembly.
///
/// Implementations must not call back into the domain that produced the
/// report.
pub trait IcmpReporter: Send + Sync {
    /// Deliver one report.
    fn report(&self, report: IcmpReport);
}

impl<R: IcmpReporter + ?Sized> IcmpReporter for Arc<R> {
    fn report(&self, report: IcmpReport) { (**self).report(report); }
}

impl<R: IcmpReporter + ?Sized> IcmpReporter for Box<R> {
    fn report(&self, report: IcmpReport) { (**self).report(report); }
}

/// Reporter that drops every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardReports;

impl IcmpReporter for DiscardReports {
    fn report(&self, _report: IcmpReport) {}
}

/// Decorator that forwards at most a fixed number of reports per second.
///
/// Reports beyond the budget are dropped and counted; the budget refills
/// continuously, so bursts are bounded by the per-second rate.
pub struct RateLimitedReporter<R> {
    inner: R,
    limiter: RateLimiter,
    suppressed: AtomicU64,
}

impl<R: IcmpReporter> RateLimitedReporter<R> {
    /// Wrap `inner`, allowing `per_second` reports each second.
    #[must_use]
    pub fn new(inner: R, per_second: NonZeroUsize) -> Self {
        let rate = per_second.get();
        Self {
            inner,
            limiter: RateLimiter::builder()
                .initial(rate)
                .refill(rate)
                .interval(Duration::from_secs(1))
                .max(rate)
                .build(),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Number of reports dropped because the budget was exhausted.
    #[must_use]
    pub fn suppressed(&self) -> u64 { self.suppressed.load(Ordering::Relaxed) }

    #[must_use]
    pub fn inner(&self) -> &R { &self.inner }
}

impl<R: IcmpReporter> IcmpReporter for RateLimitedReporter<R> {
    fn report(&self, report: IcmpReport) {
        if self.limiter.try_acquire(1) {
            self.inner.report(report);
        } else {
            let suppressed = self.suppressed.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(kind = ?report.kind(), suppressed, "ICMP report rate limited");
        }
    }
}

impl<R> std::fmt::Debug for RateLimitedReporter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedReporter")
            .field("suppressed", &self.suppressed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<IcmpReport>>);

    impl IcmpReporter for Collect {
        fn report(&self, report: IcmpReport) {
            self.0.lock().expect("collector lock").push(report);
        }
    }

    fn report() -> IcmpReport {
        IcmpReport::new(IcmpErrorKind::TimeExceeded, Bytes::from_static(&[0x60; 48]))
    }

    #[test]
    fn shared_reporter_forwards_through_arc() {
        let collect = Arc::new(Collect::default());
        let shared: Arc<dyn IcmpReporter> = collect.clone();
        shared.report(report());
        assert_eq!(collect.0.lock().expect("collector lock").len(), 1);
    }

    #[test]
    fn rate_limit_drops_reports_beyond_budget() {
        let limited = RateLimitedReporter::new(
            Collect::default(),
            NonZeroUsize::new(2).expect("non-zero"),
        );
        for _ in 0..5 {
            limited.report(report());
        }
        assert_eq!(limited.inner().0.lock().expect("collector lock").len(), 2);
        assert_eq!(limited.suppressed(), 3);
    }
}
