//! Property-based coverage of the parity codec's reconstruction
//! contract, grounded on the `proptest!` usage pattern in
//! `zerovisor-core/tests/property_vm.rs`.

use proptest::prelude::*;

use draid_parity::ParityEngine;

const COLUMN_LEN: usize = 32;

fn build_stripe(engine: &ParityEngine, ndata: usize, nparity: usize, data: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut parity = vec![vec![0u8; COLUMN_LEN]; nparity];
    {
        let data_refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
        let mut parity_refs: Vec<&mut [u8]> = parity.iter_mut().map(Vec::as_mut_slice).collect();
        engine.generate(ndata, nparity, &data_refs, &mut parity_refs).unwrap();
    }
    let mut stripe = parity;
    stripe.extend(data.iter().cloned());
    stripe
}

/// A small, seed-driven Fisher-Yates shuffle, used only to pick which
/// columns a test case erases; this crate carries no RNG dependency of
/// its own, so the seed comes straight out of the proptest strategy.
fn shuffled_indices(total: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..total).collect();
    let mut state = seed | 1;
    for i in (1..indices.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        indices.swap(i, j);
    }
    indices
}

proptest! {
    #[test]
    fn reconstruct_of_the_empty_missing_set_is_identity(
        nparity in 1usize..=3,
        ndata in 1usize..=8,
        data in prop::collection::vec(prop::collection::vec(any::<u8>(), COLUMN_LEN), 8),
    ) {
        let data = &data[..ndata];
        let engine = ParityEngine::new();
        let original = build_stripe(&engine, ndata, nparity, data);

        let mut stripe = original.clone();
        {
            let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
            engine.reconstruct(ndata, nparity, &mut refs, &[]).unwrap();
        }
        prop_assert_eq!(stripe, original);
    }

    #[test]
    fn reconstruct_recovers_any_erased_subset_up_to_nparity(
        nparity in 1usize..=3,
        ndata in 1usize..=8,
        data in prop::collection::vec(prop::collection::vec(any::<u8>(), COLUMN_LEN), 8),
        missing_count in 0usize..=3,
        shuffle_seed in any::<u64>(),
    ) {
        let data = &data[..ndata];
        let missing_count = missing_count.min(nparity);
        let total = ndata + nparity;

        let engine = ParityEngine::new();
        let original = build_stripe(&engine, ndata, nparity, data);

        let mut missing: Vec<usize> = shuffled_indices(total, shuffle_seed)[..missing_count].to_vec();
        missing.sort_unstable();

        let mut stripe = original.clone();
        for &m in &missing {
            stripe[m].fill(0xAA);
        }
        {
            let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
            engine.reconstruct(ndata, nparity, &mut refs, &missing).unwrap();
        }
        prop_assert_eq!(stripe, original);
    }
}
