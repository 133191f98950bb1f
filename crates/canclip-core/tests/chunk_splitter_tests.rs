//! Tests deterministic payload splitting and in-order reassembly.

use canclip_core::{ChunkRange, chunk_count, split_payload};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

#[test]
fn chunk_splitter_tests_matches_reference_example() {
    let payload: Vec<u8> = (0..1_200_000_u32).map(|value| (value % 251) as u8).collect();
    let plan = split_payload(&payload, 500_000).expect("plan should build");

    assert_eq!(plan.chunk_count(), 3);
    assert_eq!(
        plan.ranges(),
        &[
            ChunkRange { index: 0, start: 0, end: 500_000 },
            ChunkRange { index: 1, start: 500_000, end: 1_000_000 },
            ChunkRange { index: 2, start: 1_000_000, end: 1_200_000 },
        ]
    );

    let mut rebuilt = Vec::with_capacity(payload.len());
    for index in 0..plan.chunk_count() {
        rebuilt.extend_from_slice(plan.chunk(&payload, index).expect("chunk should slice"));
    }
    assert_eq!(rebuilt, payload);
}

#[test]
fn chunk_splitter_tests_round_trips_random_payloads() {
    let mut rng = StdRng::seed_from_u64(0x0c1a_c11b);

    for _ in 0..64 {
        let len = rng.random_range(0..20_000);
        let chunk_size = rng.random_range(1..4_096);
        let mut payload = vec![0_u8; len];
        rng.fill_bytes(&mut payload);

        let plan = split_payload(&payload, chunk_size).expect("plan should build");
        assert_eq!(plan.chunk_count(), chunk_count(len, chunk_size).unwrap());
        assert_eq!(plan.chunk_count() as usize, len.div_ceil(chunk_size));

        let rebuilt: Vec<u8> = plan
            .ranges()
            .iter()
            .flat_map(|range| payload[range.as_range()].iter().copied())
            .collect();
        assert_eq!(rebuilt, payload);
    }
}

#[test]
fn chunk_splitter_tests_is_deterministic() {
    let payload = vec![3_u8; 10_001];
    let first = split_payload(&payload, 1_000).expect("plan should build");
    let second = split_payload(&payload, 1_000).expect("plan should build");

    assert_eq!(first, second);
    assert_eq!(first.ranges().last().map(ChunkRange::len), Some(1));
}

#[test]
fn chunk_splitter_tests_rejects_out_of_range_index() {
    let payload = vec![0_u8; 10];
    let plan = split_payload(&payload, 4).expect("plan should build");
    assert!(plan.chunk(&payload, 3).is_err());
    assert!(plan.chunk(&payload[..9], 0).is_err());
}
