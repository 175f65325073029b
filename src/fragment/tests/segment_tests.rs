//! Tests for decoding arrived fragments.

use bytes::{Bytes, BytesMut};
use rstest::rstest;

use crate::{
    fragment::{Ecn, FragmentKey, MalformedFragment, ParsedFragment},
    test_helpers::{DST, HEADER_OFFSET, SRC, TestFragment, UDP, pattern},
    wire::{self, IPV6_HEADER_LEN, Ipv6Header, NEXT_HEADER_FRAGMENT},
};

fn parse(datagram: &Bytes) -> Result<ParsedFragment, MalformedFragment> {
    ParsedFragment::parse(datagram, HEADER_OFFSET)
}

#[test]
fn parse_extracts_key_and_fragment_fields() {
    let datagram = TestFragment::new(0xabcd, 1232, true, pattern(64, 1))
        .traffic_class(0x02)
        .build();
    let parsed = parse(&datagram).expect("fragment parses");

    assert_eq!(parsed.key(), FragmentKey::new(SRC, DST, 0xabcd));
    assert_eq!(parsed.offset(), 1232);
    assert!(parsed.more_fragments());
    assert_eq!(parsed.length(), 64);
    assert_eq!(parsed.ecn(), Ecn::Ect0);
    assert_eq!(parsed.header_offset(), 40);
    assert!(!parsed.is_atomic());
}

#[test]
fn parse_trims_link_layer_padding() {
    let mut padded = BytesMut::from(&TestFragment::new(1, 0, true, pattern(16, 0)).build()[..]);
    padded.extend_from_slice(&[0xee; 6]);
    let parsed = parse(&padded.freeze()).expect("fragment parses");

    assert_eq!(parsed.length(), 16);
    assert_eq!(parsed.datagram().len(), IPV6_HEADER_LEN + 8 + 16);
}

#[test]
fn parse_rejects_datagram_shorter_than_payload_length() {
    let datagram = TestFragment::new(1, 0, true, pattern(16, 0)).build();
    let short = datagram.slice(..datagram.len() - 1);
    assert_eq!(parse(&short).err(), Some(MalformedFragment::Truncated));
}

#[test]
fn parse_rejects_jumbo_payloads() {
    let mut datagram = BytesMut::from(&TestFragment::new(1, 0, true, pattern(16, 0)).build()[..]);
    wire::set_payload_length(&mut datagram, 0);
    assert_eq!(
        parse(&datagram.freeze()).err(),
        Some(MalformedFragment::Jumbogram)
    );
}

#[rstest]
#[case::empty(true, 0, Err(MalformedFragment::ZeroLength))]
#[case::empty_final(false, 0, Err(MalformedFragment::ZeroLength))]
#[case::unaligned_middle(true, 13, Err(MalformedFragment::UnalignedLength(13)))]
#[case::unaligned_final(false, 13, Ok(()))]
#[case::aligned_middle(true, 24, Ok(()))]
fn check_length_enforces_alignment(
    #[case] more: bool,
    #[case] len: usize,
    #[case] expected: Result<(), MalformedFragment>,
) {
    let datagram = TestFragment::new(1, 8, more, pattern(len, 0)).build();
    let parsed = parse(&datagram).expect("fragment parses");
    assert_eq!(parsed.check_length(), expected);
}

#[test]
fn atomic_fragment_loses_its_header() {
    let payload = pattern(20, 9);
    let datagram = TestFragment::new(5, 0, false, payload.clone()).build();
    let parsed = parse(&datagram).expect("fragment parses");
    assert!(parsed.is_atomic());

    let atomic = parsed.into_atomic();
    assert_eq!(atomic.offset(), IPV6_HEADER_LEN);
    assert_eq!(atomic.payload(), &payload[..]);
    assert_eq!(atomic.payload_len(), payload.len());
    assert_eq!(atomic.next_header(), UDP);

    let header = Ipv6Header::parse(atomic.datagram()).expect("header parses");
    assert_eq!(header.next_header(), UDP);
    assert_eq!(usize::from(header.payload_len()), payload.len());
}

#[test]
fn first_fragment_captures_unfragmentable_part() {
    let datagram = TestFragment::new(5, 0, true, pattern(8, 0)).build();
    let parsed = parse(&datagram).expect("fragment parses");
    let first = parsed.first_fragment();

    assert_eq!(first.unfrag_len, 40);
    assert_eq!(first.next_header, UDP);
    assert_eq!(first.next_header_field, wire::NEXT_HEADER_FIELD);
    assert_eq!(first.unfragmentable.len(), IPV6_HEADER_LEN);
    assert_eq!(first.unfragmentable[wire::NEXT_HEADER_FIELD], NEXT_HEADER_FRAGMENT);
}

#[test]
fn segment_payload_slices_the_original_datagram() {
    let payload = pattern(32, 3);
    let datagram = TestFragment::new(5, 64, true, payload.clone()).build();
    let segment = parse(&datagram).expect("fragment parses").into_segment();

    assert_eq!(segment.offset(), 64);
    assert_eq!(segment.end(), 96);
    assert_eq!(&segment.payload()[..], &payload[..]);
    assert_eq!(segment.datagram(), &datagram);
}
