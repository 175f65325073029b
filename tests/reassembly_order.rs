#![cfg(not(loom))]
//! Property tests: arrival order and duplication never change the result.

use frag6::{FragStatus, ReassemblyDomain, ReassemblyLimits};
use frag6_testing::Datagram;
use proptest::prelude::*;

/// Payload length, fragment size and an arrival order of the fragments.
fn plan() -> impl Strategy<Value = (Vec<u8>, usize, Vec<usize>)> {
    (1_usize..4000, 8_usize..1500)
        .prop_flat_map(|(len, chunk)| {
            let step = chunk / 8 * 8;
            let count = (len - 1) / step + 1;
            (
                proptest::collection::vec(any::<u8>(), len),
                Just(chunk),
                Just((0..count).collect::<Vec<_>>()).prop_shuffle(),
            )
        })
}

fn domain() -> ReassemblyDomain {
    ReassemblyDomain::builder()
        .bucket_count(16)
        .limits(ReassemblyLimits::unlimited())
        .build()
        .expect("valid configuration")
}

proptest! {
    #[test]
    fn any_arrival_order_reassembles((payload, chunk, order) in plan()) {
        let domain = domain();
        let original = Datagram::new(0x600d, payload);
        let fragments = original.split(chunk);
        prop_assert_eq!(fragments.len(), order.len());

        let (last, rest) = order.split_last().expect("at least one fragment");
        for &index in rest {
            let status = domain.submit_datagram(fragments[index].clone());
            prop_assert!(matches!(status, Ok(FragStatus::Consumed)));
        }
        let status = domain.submit_datagram(fragments[*last].clone());
        let datagram = match status {
            Ok(FragStatus::Reassembled(datagram)) => datagram.into_datagram(),
            Ok(FragStatus::Atomic(datagram)) if fragments.len() == 1 => datagram.into_datagram(),
            other => return Err(TestCaseError::fail(format!("unexpected status {other:?}"))),
        };
        prop_assert_eq!(datagram, original.reassembled());
        prop_assert_eq!(domain.queue_count(), 0);
        prop_assert_eq!(domain.fragment_count(), 0);
    }

    #[test]
    fn duplicates_are_idempotent((payload, chunk, order) in plan(), repeat in 0_usize..64) {
        let domain = domain();
        let original = Datagram::new(0xd0d0, payload);
        let fragments = original.split(chunk);
        prop_assume!(fragments.len() > 1);

        let (last, rest) = order.split_last().expect("at least one fragment");
        for &index in rest {
            domain.submit_datagram(fragments[index].clone()).expect("accepted");
        }
        let resent = rest[repeat % rest.len()];
        let status = domain.submit_datagram(fragments[resent].clone());
        prop_assert!(matches!(status, Ok(FragStatus::Duplicate)));
        prop_assert_eq!(domain.fragment_count(), rest.len());

        let status = domain.submit_datagram(fragments[*last].clone());
        prop_assert!(matches!(status, Ok(FragStatus::Reassembled(_))));
    }
}
