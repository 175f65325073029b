#![cfg(not(loom))]
//! Tests for the tokio aging task.
//!
//! Time is paused so a minute of ticks elapses instantly.

use std::{sync::Arc, time::Duration};

use frag6::{ReassemblyDomain, ReassemblyLimits, fragment::INITIAL_TTL, timer};
use frag6_testing::{Datagram, RecordingReporter};
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

const PERIOD: Duration = Duration::from_secs(1);

#[fixture]
fn reporter() -> RecordingReporter { RecordingReporter::new() }

fn domain(reporter: &RecordingReporter) -> Arc<ReassemblyDomain> {
    let domain = ReassemblyDomain::builder()
        .bucket_count(4)
        .limits(ReassemblyLimits::default())
        .reporter(reporter.clone())
        .build()
        .expect("valid configuration");
    Arc::new(domain)
}

/// Let the aging task run every tick due within `duration`.
async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn queue_expires_after_a_minute_of_ticks(reporter: RecordingReporter) {
    let domain = domain(&reporter);
    domain
        .submit_datagram(Datagram::new(1, vec![0; 64]).fragment(0, 32, true))
        .expect("accepted");
    let shutdown = CancellationToken::new();
    let task = timer::spawn_aging(Arc::clone(&domain), PERIOD, shutdown.clone());

    for _ in 1..INITIAL_TTL {
        advance(PERIOD).await;
    }
    assert_eq!(domain.queue_count(), 1);

    advance(PERIOD).await;
    assert_eq!(domain.queue_count(), 0);
    assert_eq!(reporter.len(), 1);

    shutdown.cancel();
    task.await.expect("aging task panicked");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelled_task_stops_aging(reporter: RecordingReporter) {
    let domain = domain(&reporter);
    let shutdown = CancellationToken::new();
    let task = timer::spawn_aging(Arc::clone(&domain), PERIOD, shutdown.clone());

    shutdown.cancel();
    task.await.expect("aging task panicked");

    domain
        .submit_datagram(Datagram::new(2, vec![0; 64]).fragment(0, 32, true))
        .expect("accepted");
    advance(PERIOD * u32::from(INITIAL_TTL) * 2).await;
    assert_eq!(domain.queue_count(), 1);
    assert!(reporter.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn task_holds_the_domain_until_cancelled(reporter: RecordingReporter) {
    let domain = domain(&reporter);
    let shutdown = CancellationToken::new();
    let task = timer::spawn_aging(Arc::clone(&domain), PERIOD, shutdown.clone());
    assert_eq!(Arc::strong_count(&domain), 2);

    shutdown.cancel();
    task.await.expect("aging task panicked");
    assert_eq!(Arc::strong_count(&domain), 1);
}
