//! Sharded reassembly state with bounded resources.
//!
//! A [`ReassemblyDomain`] owns every datagram under reassembly for one stack
//! instance. Queues are spread over a power-of-two number of buckets by a
//! keyed hash whose seed is drawn at construction, so a remote sender cannot
//! aim its fragments at one bucket. Each bucket has its own mutex and no
//! operation ever holds two of them. The global fragment and packet counters
//! are atomics updated alongside the bucket work, which makes the global caps
//! soft: concurrent admissions may overshoot them by a few entries.
//!
//! ICMP errors gathered while a bucket is locked are handed to the
//! [`IcmpReporter`] only after the lock has been released.

mod bucket;
mod builder;
mod errors;
mod limits;

use std::{
    fmt,
    hash::BuildHasher,
    sync::{PoisonError, atomic::Ordering},
};

use bytes::Bytes;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, trace, warn};

use self::{
    bucket::Bucket,
    limits::{SharedLimits, at_limit, over_limit},
};
pub use self::{
    builder::ReassemblyDomainBuilder,
    errors::ConfigError,
    limits::{
        DEFAULT_BUCKET_COUNT,
        DEFAULT_MAX_FRAGMENTS,
        DEFAULT_MAX_FRAGMENTS_PER_PACKET,
        DEFAULT_MAX_PACKETS,
        ReassemblyLimits,
    },
};
#[cfg(feature = "metrics")]
use crate::metrics;
use crate::{
    fragment::{
        FragError,
        FragResult,
        FragStatus,
        FragmentKey,
        Insertion,
        MalformedFragment,
        ParsedFragment,
        ReassemblyQueue,
        ResourceLimit,
        exceeds_max_packet,
        extension_len,
    },
    icmp::{IcmpErrorKind, IcmpReport, IcmpReporter},
    stats::{ReassemblyStats, StatsSnapshot},
    sync::{AtomicUsize, Mutex, MutexGuard},
    wire,
};

/// Pointer to the payload length field of the fixed header.
const PAYLOAD_LENGTH_POINTER: u32 = 4;
/// Distance from the fragment header to its offset field.
const FRAGMENT_OFFSET_POINTER: u32 = 2;

/// Why a queue was destroyed without completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EvictionReason {
    /// Its time to live ran out.
    Expired,
    /// Aging brought the domain back under its limits.
    Overflow,
    /// The domain was drained.
    Drain,
}

impl EvictionReason {
    const fn reports_icmp(self) -> bool { matches!(self, Self::Expired | Self::Overflow) }
}

pub(crate) fn validate(limits: &ReassemblyLimits) -> Result<(), ConfigError> {
    if limits.max_frags_per_packet == Some(0) && !limits.reassembly_disabled() {
        return Err(ConfigError::ZeroFragmentsPerPacket);
    }
    Ok(())
}

/// IPv6 fragment reassembly state for one stack instance.
///
/// The domain is `Send + Sync`; share it behind an [`Arc`](std::sync::Arc)
/// between the threads that deliver fragments and the one that calls
/// [`age_tick`](Self::age_tick). Dropping the domain drains it.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use frag6::domain::{ReassemblyDomain, ReassemblyLimits};
///
/// let domain = ReassemblyDomain::new(ReassemblyLimits::default()).expect("valid limits");
/// // A datagram that is not IPv6 is refused without touching any queue.
/// let result = domain.submit_datagram(Bytes::from_static(&[0x45; 40]));
/// assert!(result.is_err());
/// assert_eq!(domain.queue_count(), 0);
/// ```
pub struct ReassemblyDomain {
    buckets: Box<[Mutex<Bucket>]>,
    hasher: ahash::RandomState,
    limits: SharedLimits,
    frags: AtomicUsize,
    packets: AtomicUsize,
    sweep_cursor: AtomicUsize,
    stats: ReassemblyStats,
    reporter: Box<dyn IcmpReporter>,
}

impl ReassemblyDomain {
    /// Create a domain with [`DEFAULT_BUCKET_COUNT`] buckets, a random hash
    /// seed and no ICMP reporting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `limits` are inconsistent.
    pub fn new(limits: ReassemblyLimits) -> Result<Self, ConfigError> {
        Self::builder().limits(limits).build()
    }

    /// Start configuring a domain.
    #[must_use]
    pub fn builder() -> ReassemblyDomainBuilder { ReassemblyDomainBuilder::default() }

    fn from_parts(
        limits: ReassemblyLimits,
        bucket_count: usize,
        hasher: ahash::RandomState,
        reporter: Box<dyn IcmpReporter>,
    ) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| Mutex::new(Bucket::new())).collect(),
            hasher,
            limits: SharedLimits::new(limits),
            frags: AtomicUsize::new(0),
            packets: AtomicUsize::new(0),
            sweep_cursor: AtomicUsize::new(0),
            stats: ReassemblyStats::new(),
            reporter,
        }
    }

    /// Admit a datagram whose fragment header is located by walking its
    /// extension header chain.
    ///
    /// # Errors
    ///
    /// See [`submit_fragment`](Self::submit_fragment).
    pub fn submit_datagram(&self, datagram: Bytes) -> FragResult {
        match wire::find_fragment_header(&datagram) {
            Ok(position) => self.submit_fragment(datagram, position.header_offset),
            Err(err) => {
                self.stats.received();
                self.stats.dropped(1);
                debug!(error = %err, "datagram without a usable fragment header dropped");
                Err(err.into())
            }
        }
    }

    /// Admit one fragment whose fragment header starts at `header_offset`.
    ///
    /// Returns [`FragStatus::Reassembled`] when the fragment completes its
    /// datagram, [`FragStatus::Atomic`] for a fragment that was never split,
    /// and [`FragStatus::Consumed`] or [`FragStatus::Duplicate`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FragError`] when the fragment was discarded. Overlap and
    /// length violations also destroy every fragment already queued for the
    /// same datagram.
    pub fn submit_fragment(&self, datagram: Bytes, header_offset: usize) -> FragResult {
        self.stats.received();
        let fragment = match ParsedFragment::parse(&datagram, header_offset) {
            Ok(fragment) => fragment,
            Err(err) => {
                self.stats.dropped(1);
                debug!(error = %err, header_offset, "malformed fragment dropped");
                if err == MalformedFragment::Jumbogram
                    && let Ok(pointer) = u32::try_from(header_offset)
                {
                    self.emit(vec![param_problem(pointer, datagram)]);
                }
                return Err(err.into());
            }
        };

        if fragment.is_atomic() {
            self.stats.atomic();
            trace!(key = %fragment.key(), "atomic fragment passed through");
            return Ok(FragStatus::Atomic(fragment.into_atomic()));
        }

        if let Err(err) = fragment.check_length() {
            self.stats.dropped(1);
            debug!(key = %fragment.key(), error = %err, "malformed fragment dropped");
            self.emit(vec![param_problem(
                PAYLOAD_LENGTH_POINTER,
                fragment.datagram().clone(),
            )]);
            return Err(err.into());
        }

        let limits = self.limits.load();
        if at_limit(self.frags.load(Ordering::Relaxed), limits.max_frags_global) {
            self.stats.dropped(1);
            debug!(key = %fragment.key(), "global fragment limit reached");
            return Err(FragError::ResourceExhausted(ResourceLimit::GlobalFragments));
        }

        let mut reports = Vec::new();
        let result = self.admit(fragment, &limits, &mut reports);
        self.emit(reports);
        result
    }

    /// Queue `fragment` under its bucket lock.
    fn admit(
        &self,
        fragment: ParsedFragment,
        limits: &ReassemblyLimits,
        reports: &mut Vec<IcmpReport>,
    ) -> FragResult {
        let key = fragment.key();
        let mut bucket = self.lock(self.bucket_index(&key));
        let stamp = bucket.stamp();

        let (index, created) = if let Some(index) = bucket.position(&key) {
            (index, false)
        } else {
            let refused = if at_limit(self.packets.load(Ordering::Relaxed), limits.max_packets_global)
            {
                Some(ResourceLimit::GlobalPackets)
            } else if at_limit(bucket.len(), limits.max_bucket_size) {
                Some(ResourceLimit::BucketQueues)
            } else {
                None
            };
            if let Some(limit) = refused {
                self.stats.dropped(1);
                debug!(%key, %limit, "no room for a new reassembly queue");
                return Err(FragError::ResourceExhausted(limit));
            }
            self.packets.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::inc_queues();
            trace!(%key, "reassembly queue created");
            (
                bucket.push(ReassemblyQueue::new(key, fragment.ecn(), stamp)),
                true,
            )
        };

        let queue = bucket.queue_mut(index);
        let offset = fragment.offset();
        let end = offset + fragment.length();
        let unfrag_len = queue
            .unfrag_len()
            .or((offset == 0).then_some(fragment.header_offset()));
        if exceeds_max_packet(unfrag_len, end) {
            let attempted = extension_len(unfrag_len) + end;
            self.stats.dropped(1);
            debug!(%key, offset, attempted, "fragment exceeds the maximum datagram size");
            reports.push(param_problem(
                fragment.header_offset() + FRAGMENT_OFFSET_POINTER,
                fragment.datagram().clone(),
            ));
            if created {
                let queue = bucket.remove(index);
                self.forget(&queue);
            }
            return Err(MalformedFragment::Oversized { attempted }.into());
        }

        let queued = queue.ecn();
        let Some(ecn) = queued.merge(fragment.ecn()) else {
            let arriving = fragment.ecn();
            self.stats.dropped(1);
            debug!(%key, ?queued, ?arriving, "fragment with inconsistent ECN dropped");
            return Err(FragError::InconsistentEcn {
                key,
                queued,
                arriving,
            });
        };

        if offset == 0 {
            let evicted = queue.record_first(fragment.first_fragment());
            if !evicted.is_empty() {
                self.frags.fetch_sub(evicted.len(), Ordering::Relaxed);
                self.stats.dropped(evicted.len());
                debug!(%key, evicted = evicted.len(), "queued fragments exceed the maximum datagram size");
                reports.extend(evicted.into_iter().map(|segment| {
                    param_problem(
                        segment.header_offset() + FRAGMENT_OFFSET_POINTER,
                        segment.datagram().clone(),
                    )
                }));
            }
        }

        match queue.insert(fragment.into_segment()) {
            Insertion::Inserted => {}
            Insertion::Duplicate => {
                self.stats.dropped(1);
                trace!(%key, offset, "duplicate fragment ignored");
                return Ok(FragStatus::Duplicate);
            }
            Insertion::Overlap => {
                let queue = bucket.remove(index);
                self.stats.overlap();
                self.stats.dropped(queue.nfrag() + 1);
                warn!(%key, offset, nfrag = queue.nfrag(), "overlapping fragment; datagram discarded");
                if let Some(first) = queue.first_segment() {
                    reports.push(param_problem(
                        first.header_offset() + FRAGMENT_OFFSET_POINTER,
                        first.datagram().clone(),
                    ));
                }
                self.forget(&queue);
                return Err(FragError::OverlapViolation { key, offset });
            }
            Insertion::InconsistentLength => {
                let queue = bucket.remove(index);
                self.stats.dropped(queue.nfrag() + 1);
                debug!(%key, offset, "fragment disagrees with the final fragment; datagram discarded");
                self.forget(&queue);
                return Err(FragError::InconsistentLength { key });
            }
        }

        self.frags.fetch_add(1, Ordering::Relaxed);
        queue.set_ecn(ecn);
        queue.touch(stamp);

        if over_limit(queue.nfrag(), limits.max_frags_per_packet) {
            let queue = bucket.remove(index);
            self.stats.dropped(queue.nfrag());
            debug!(%key, nfrag = queue.nfrag(), "per-packet fragment limit exceeded; datagram discarded");
            self.forget(&queue);
            return Err(FragError::ResourceExhausted(
                ResourceLimit::FragmentsPerPacket,
            ));
        }

        if queue.completion().is_none() {
            trace!(%key, offset, nfrag = queue.nfrag(), "fragment queued");
            return Ok(FragStatus::Consumed);
        }

        let queue = bucket.remove(index);
        let nfrag = queue.nfrag();
        match queue.assemble() {
            Ok(datagram) => {
                self.forget_counts(nfrag);
                self.stats.reassembled();
                trace!(%key, nfrag, payload_len = datagram.payload_len(), "datagram reassembled");
                Ok(FragStatus::Reassembled(datagram))
            }
            Err(queue) => {
                bucket.push(queue);
                Ok(FragStatus::Consumed)
            }
        }
    }

    /// Advance every queue by one tick and enforce the current limits.
    ///
    /// Buckets are visited one at a time. Expired queues are destroyed first,
    /// then least recently touched queues are evicted from any bucket holding
    /// more than `max_bucket_size`, and finally from buckets taken round-robin
    /// while the domain holds more than `max_packets_global`. Every destroyed
    /// queue that holds its offset-zero fragment produces one ICMP Time
    /// Exceeded report.
    pub fn age_tick(&self) {
        let limits = self.limits.load();
        for index in 0..self.buckets.len() {
            let mut reports = Vec::new();
            {
                let mut bucket = self.lock(index);
                for queue in bucket.expire() {
                    self.destroy(&queue, EvictionReason::Expired, &mut reports);
                }
                while bucket.len() > 0
                    && (limits.reassembly_disabled() || over_limit(bucket.len(), limits.max_bucket_size))
                {
                    let Some(queue) = bucket.evict_lru() else { break };
                    self.destroy(&queue, EvictionReason::Overflow, &mut reports);
                }
            }
            self.emit(reports);
        }

        let mut idle = 0;
        while idle < self.buckets.len()
            && over_limit(self.packets.load(Ordering::Relaxed), limits.max_packets_global)
        {
            let index = self.sweep_cursor.fetch_add(1, Ordering::Relaxed) & (self.buckets.len() - 1);
            let mut reports = Vec::new();
            let evicted = self.lock(index).evict_lru();
            match evicted {
                Some(queue) => {
                    idle = 0;
                    self.destroy(&queue, EvictionReason::Overflow, &mut reports);
                }
                None => idle += 1,
            }
            self.emit(reports);
        }
    }

    /// Destroy every queue without reporting anything.
    pub fn drain(&self) {
        let mut reports = Vec::new();
        for index in 0..self.buckets.len() {
            let queues = self.lock(index).take_all();
            for queue in &queues {
                self.destroy(queue, EvictionReason::Drain, &mut reports);
            }
        }
        debug_assert!(reports.is_empty(), "drain never reports");
    }

    /// Replace the limits. Caps that were lowered are enforced on admission
    /// right away and on queues already held by the next [`age_tick`].
    ///
    /// [`age_tick`]: Self::age_tick
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `limits` are inconsistent; the current
    /// limits are kept.
    pub fn set_limits(&self, limits: ReassemblyLimits) -> Result<(), ConfigError> {
        validate(&limits)?;
        self.limits.store(limits);
        debug!(?limits, "reassembly limits replaced");
        Ok(())
    }

    /// The limits currently enforced.
    #[must_use]
    pub fn limits(&self) -> ReassemblyLimits { self.limits.load() }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot { self.stats.snapshot() }

    /// Datagrams under reassembly.
    #[must_use]
    pub fn queue_count(&self) -> usize { self.packets.load(Ordering::Relaxed) }

    /// Fragments queued across all datagrams.
    #[must_use]
    pub fn fragment_count(&self) -> usize { self.frags.load(Ordering::Relaxed) }

    #[must_use]
    pub fn bucket_count(&self) -> usize { self.buckets.len() }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "only the low bits select a bucket"
    )]
    fn bucket_index(&self, key: &FragmentKey) -> usize {
        self.hasher.hash_one(key) as usize & (self.buckets.len() - 1)
    }

    fn lock(&self, index: usize) -> MutexGuard<'_, Bucket> {
        self.buckets[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the counters held by a queue removed from its bucket.
    fn forget(&self, queue: &ReassemblyQueue) { self.forget_counts(queue.nfrag()); }

    fn forget_counts(&self, nfrag: usize) {
        self.frags.fetch_sub(nfrag, Ordering::Relaxed);
        self.packets.fetch_sub(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::dec_queues(1);
    }

    fn destroy(
        &self,
        queue: &ReassemblyQueue,
        reason: EvictionReason,
        reports: &mut Vec<IcmpReport>,
    ) {
        let nfrag = queue.nfrag();
        self.forget(queue);
        match reason {
            EvictionReason::Expired => self.stats.timed_out(nfrag),
            EvictionReason::Overflow => self.stats.overflowed(nfrag),
            EvictionReason::Drain => self.stats.dropped(nfrag),
        }
        if reason.reports_icmp()
            && let Some(first) = queue.first_segment()
        {
            reports.push(IcmpReport::new(
                IcmpErrorKind::TimeExceeded,
                first.datagram().clone(),
            ));
        }
        debug!(key = %queue.key(), ?reason, nfrag, "reassembly queue destroyed");
    }

    fn emit(&self, reports: Vec<IcmpReport>) {
        for report in reports {
            self.reporter.report(report);
        }
    }
}

/// Keys for the bucket hash: expanded from `seed` when one is fixed, drawn
/// from the thread RNG otherwise.
fn bucket_hasher(seed: Option<u64>) -> ahash::RandomState {
    let [k0, k1, k2, k3]: [u64; 4] = match seed {
        Some(seed) => StdRng::seed_from_u64(seed).r#gen(),
        None => rand::random(),
    };
    ahash::RandomState::with_seeds(k0, k1, k2, k3)
}

fn param_problem(pointer: u32, datagram: Bytes) -> IcmpReport {
    IcmpReport::new(IcmpErrorKind::ParamProblem { pointer }, datagram)
}

impl Drop for ReassemblyDomain {
    fn drop(&mut self) { self.drain(); }
}

impl fmt::Debug for ReassemblyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReassemblyDomain")
            .field("buckets", &self.buckets.len())
            .field("limits", &self.limits.load())
            .field("queues", &self.queue_count())
            .field("fragments", &self.fragment_count())
            .finish_non_exhaustive()
    }
}
