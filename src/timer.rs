//! Tokio driver for periodic aging.
//!
//! The domain itself has no notion of time; this task calls
//! [`ReassemblyDomain::age_tick`] once per period until it is cancelled.

use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::ReassemblyDomain;

/// Tick period giving a new queue roughly a minute to complete.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Spawn a task that ages `domain` every `period` until `shutdown` is
/// cancelled.
///
/// The first tick fires one full period after the call. Ticks missed while
/// the runtime was busy are not replayed in a burst.
///
/// # Panics
///
/// Panics if `period` is zero or if called outside a tokio runtime.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use frag6::{
///     domain::{ReassemblyDomain, ReassemblyLimits},
///     timer,
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let domain = Arc::new(ReassemblyDomain::new(ReassemblyLimits::default()).expect("limits"));
/// let shutdown = CancellationToken::new();
/// let task = timer::spawn_aging(domain, Duration::from_millis(500), shutdown.clone());
/// shutdown.cancel();
/// task.await.expect("aging task");
/// # }
/// ```
#[must_use = "dropping the handle detaches the aging task"]
pub fn spawn_aging(
    domain: Arc<ReassemblyDomain>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::spawn(async move {
        loop {
            select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => domain.age_tick(),
            }
        }
        debug!(queues = domain.queue_count(), "aging task stopped");
    })
}
