#![cfg(not(loom))]
//! Expiry, eviction and draining of incomplete datagrams.

use frag6::{
    FragStatus,
    IcmpErrorKind,
    ReassemblyDomain,
    ReassemblyLimits,
    fragment::INITIAL_TTL,
};
use frag6_testing::{Datagram, RecordingReporter};
use rstest::rstest;

fn domain(limits: ReassemblyLimits, reporter: &RecordingReporter) -> ReassemblyDomain {
    ReassemblyDomain::builder()
        .bucket_count(8)
        .hash_seed(7)
        .limits(limits)
        .reporter(reporter.clone())
        .build()
        .expect("valid configuration")
}

fn age(domain: &ReassemblyDomain, ticks: u8) {
    for _ in 0..ticks {
        domain.age_tick();
    }
}

#[rstest]
#[case::with_first_fragment(0, 1)]
#[case::without_first_fragment(32, 0)]
fn expiry_reports_only_when_first_fragment_held(#[case] offset: usize, #[case] reports: usize) {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::default(), &reporter);
    let original = Datagram::new(1, vec![7; 64]);
    domain
        .submit_datagram(original.fragment(offset, 32, offset == 0))
        .expect("accepted");

    age(&domain, INITIAL_TTL - 1);
    assert_eq!(domain.queue_count(), 1);
    assert!(reporter.is_empty());

    domain.age_tick();
    assert_eq!(domain.queue_count(), 0);
    assert_eq!(domain.fragment_count(), 0);
    assert_eq!(reporter.len(), reports);
    assert!(
        reporter
            .kinds()
            .iter()
            .all(|kind| *kind == IcmpErrorKind::TimeExceeded)
    );
    assert_eq!(domain.stats().packets_timed_out, 1);
}

#[test]
fn expiry_quotes_the_first_fragment() {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::default(), &reporter);
    let original = Datagram::new(2, vec![3; 96]);
    let first = original.fragment(0, 32, true);
    domain.submit_datagram(first.clone()).expect("accepted");
    domain
        .submit_datagram(original.fragment(64, 32, false))
        .expect("accepted");

    age(&domain, INITIAL_TTL);

    let reports = reporter.take();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].datagram(), &first);
}

#[test]
fn late_fragment_restarts_reassembly_after_expiry() {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::default(), &reporter);
    let original = Datagram::new(3, vec![9; 64]);
    let fragments = original.split(32);

    domain.submit_datagram(fragments[0].clone()).expect("accepted");
    age(&domain, INITIAL_TTL);
    assert!(matches!(
        domain.submit_datagram(fragments[1].clone()),
        Ok(FragStatus::Consumed)
    ));
    assert!(matches!(
        domain.submit_datagram(fragments[0].clone()),
        Ok(FragStatus::Reassembled(_))
    ));
}

#[test]
fn lowering_global_cap_evicts_on_next_tick() {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::unlimited(), &reporter);
    for ident in 0..6 {
        domain
            .submit_datagram(Datagram::new(ident, vec![1; 64]).fragment(0, 32, true))
            .expect("accepted");
    }
    assert_eq!(domain.queue_count(), 6);

    domain
        .set_limits(ReassemblyLimits {
            max_packets_global: Some(2),
            ..ReassemblyLimits::unlimited()
        })
        .expect("valid limits");
    assert_eq!(domain.queue_count(), 6);

    domain.age_tick();
    assert_eq!(domain.queue_count(), 2);
    assert_eq!(domain.fragment_count(), 2);
    assert_eq!(reporter.len(), 4);
    assert_eq!(domain.stats().packets_overflowed, 4);
}

#[test]
fn disabling_reassembly_empties_the_domain() {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::unlimited(), &reporter);
    for ident in 0..3 {
        domain
            .submit_datagram(Datagram::new(ident, vec![1; 64]).fragment(32, 32, false))
            .expect("accepted");
    }

    domain
        .set_limits(ReassemblyLimits {
            max_packets_global: Some(0),
            ..ReassemblyLimits::unlimited()
        })
        .expect("valid limits");
    assert!(
        domain
            .submit_datagram(Datagram::new(9, vec![1; 64]).fragment(0, 32, true))
            .is_err()
    );

    domain.age_tick();
    assert_eq!(domain.queue_count(), 0);
    assert_eq!(domain.fragment_count(), 0);
    // None of the evicted queues held a first fragment.
    assert!(reporter.is_empty());
}

#[test]
fn drain_is_silent() {
    let reporter = RecordingReporter::new();
    let domain = domain(ReassemblyLimits::default(), &reporter);
    for ident in 0..4 {
        domain
            .submit_datagram(Datagram::new(ident, vec![1; 64]).fragment(0, 32, true))
            .expect("accepted");
    }

    domain.drain();

    assert_eq!(domain.queue_count(), 0);
    assert_eq!(domain.fragment_count(), 0);
    assert!(reporter.is_empty());
    assert_eq!(domain.stats().fragments_dropped, 4);
}
