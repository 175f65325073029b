//! Builder for configuring a reassembly domain.

use super::{ConfigError, DEFAULT_BUCKET_COUNT, ReassemblyDomain, ReassemblyLimits};
use crate::icmp::{DiscardReports, IcmpReporter};

/// Builder for [`ReassemblyDomain`].
///
/// Defaults: [`DEFAULT_BUCKET_COUNT`] buckets, [`ReassemblyLimits::default`]
/// with the bucket size derived from the configured bucket count, a fresh
/// random hash seed and a reporter that discards every ICMP error.
///
/// # Examples
///
/// ```
/// use frag6::{
///     domain::{ReassemblyDomain, ReassemblyLimits},
///     icmp::DiscardReports,
/// };
///
/// let domain = ReassemblyDomain::builder()
///     .bucket_count(64)
///     .limits(ReassemblyLimits::default().with_derived_bucket_size(64))
///     .reporter(DiscardReports)
///     .build()
///     .expect("valid configuration");
/// assert_eq!(domain.queue_count(), 0);
/// ```
pub struct ReassemblyDomainBuilder {
    limits: Option<ReassemblyLimits>,
    bucket_count: usize,
    hash_seed: Option<u64>,
    reporter: Box<dyn IcmpReporter>,
}

impl Default for ReassemblyDomainBuilder {
    fn default() -> Self {
        Self {
            limits: None,
            bucket_count: DEFAULT_BUCKET_COUNT,
            hash_seed: None,
            reporter: Box::new(DiscardReports),
        }
    }
}

impl ReassemblyDomainBuilder {
    /// Set the resource caps.
    #[must_use]
    pub fn limits(mut self, limits: ReassemblyLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Set the number of buckets, which must be a power of two.
    #[must_use]
    pub fn bucket_count(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Fix the bucket hash seed instead of drawing a random one.
    ///
    /// A predictable seed lets a remote sender aim every fragment at one
    /// bucket; use this only in tests.
    #[must_use]
    pub fn hash_seed(mut self, seed: u64) -> Self {
        self.hash_seed = Some(seed);
        self
    }

    /// Install the collaborator that receives ICMP errors.
    #[must_use]
    pub fn reporter(mut self, reporter: impl IcmpReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Build the configured [`ReassemblyDomain`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBucketCount`] if the bucket count is zero
    /// or not a power of two and [`ConfigError::ZeroFragmentsPerPacket`] if
    /// the limits allow reassembly but no fragments per datagram.
    pub fn build(self) -> Result<ReassemblyDomain, ConfigError> {
        let Self {
            limits,
            bucket_count,
            hash_seed,
            reporter,
        } = self;
        if !bucket_count.is_power_of_two() {
            return Err(ConfigError::InvalidBucketCount(bucket_count));
        }
        let limits = limits
            .unwrap_or_else(|| ReassemblyLimits::default().with_derived_bucket_size(bucket_count));
        super::validate(&limits)?;
        let hasher = super::bucket_hasher(hash_seed);
        Ok(ReassemblyDomain::from_parts(
            limits,
            bucket_count,
            hasher,
            reporter,
        ))
    }
}

impl std::fmt::Debug for ReassemblyDomainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReassemblyDomainBuilder")
            .field("limits", &self.limits)
            .field("bucket_count", &self.bucket_count)
            .field("hash_seed", &self.hash_seed.map(|_| "<fixed>"))
            .finish_non_exhaustive()
    }
}
