//! Property-based coverage of the geometry invariants: permutation
//! rows, column disjointness, the `psize`/`asize` round trip, alignment
//! and group non-spanning. Grounded on the `proptest!` usage pattern in
//! `zerovisor-core/tests/property_vm.rs`.

use std::collections::HashSet;

use proptest::prelude::*;

use draid_core::{Config, Mapper, PermMap};
use draid_types::Ashift;

/// A geometry picked so `Config::configure` always accepts it: with
/// `ngroups` fixed at 1, its divisibility constraint reduces to
/// `groupwidth == ndisks`, which holds by construction when `children`
/// is derived as `ndata + nparity + nspares`.
fn valid_geometry() -> impl Strategy<Value = (u16, u8, u16, u16)> {
    (1u8..=3, 0u16..4, 1u16..12).prop_map(|(nparity, nspares, ndata)| {
        let children = ndata + u16::from(nparity) + nspares;
        (children, nparity, nspares, ndata)
    })
}

fn build(children: u16, nparity: u8, nspares: u16, ndata: u16) -> (Config, PermMap) {
    let cfg = Config::configure(children, nparity, nspares, ndata, 1, Ashift(12)).unwrap();
    let perm = PermMap::from_table(cfg.children()).unwrap();
    (cfg, perm)
}

proptest! {
    /// Invariant 1: every row the table-driven generator produces is a
    /// permutation of `[0, children)`.
    #[test]
    fn every_row_of_a_table_entry_is_a_permutation(children in 2u16..=255) {
        let map = PermMap::from_table(children).unwrap();
        for r in 0..u64::from(map.nperms()) {
            let row = map.row(r);
            let mut seen = vec![false; usize::from(children)];
            for idx in row {
                prop_assert!(!seen[usize::from(idx)]);
                seen[usize::from(idx)] = true;
            }
        }
    }

    /// Invariant 2: a group's `groupwidth` physical children are
    /// pairwise distinct and never equal a spare column of the
    /// permutation row(s) they are drawn from.
    #[test]
    fn group_columns_are_disjoint_from_each_other_and_from_spares(
        (children, nparity, nspares, ndata) in valid_geometry(),
        group_index in 0u64..4,
    ) {
        let (cfg, perm) = build(children, nparity, nspares, ndata);
        let mapper = Mapper::new(&cfg, &perm);
        let logical = mapper.group_to_offset(group_index);
        let placement = mapper.placement(logical);

        let mut seen = HashSet::new();
        for col in 0..cfg.groupwidth() {
            let (child, _) = mapper.column_location(logical, col);
            prop_assert!(seen.insert(child), "duplicate child {child} in one group");

            let absolute_col = placement.group_start_col + col;
            let row = if absolute_col >= cfg.ndisks() { placement.row_in_perm + 1 } else { placement.row_in_perm };
            let row_entries = perm.row(row);
            let spare_slice = &row_entries[usize::from(cfg.ndisks())..];
            prop_assert!(!spare_slice.contains(&child), "group touched a spare column");
        }
    }

    /// Invariant 3: `psize(asize(x)) == x` for any `x` that is a whole
    /// number of data-column rows.
    #[test]
    fn psize_and_asize_round_trip_on_aligned_sizes(
        (children, nparity, nspares, ndata) in valid_geometry(),
        rows in 0u64..6,
    ) {
        let (cfg, _perm) = build(children, nparity, nspares, ndata);
        let data_chunk = u64::from(cfg.ndata()) << cfg.ashift().0;
        let x = rows * data_chunk;
        let asize = cfg.asize(x);
        prop_assert_eq!(cfg.psize(asize).unwrap(), x);
    }

    /// Invariant 4: `astart(L) >= L` and `astart(L)` lands on the
    /// configured alignment.
    #[test]
    fn astart_is_never_earlier_and_always_aligned(
        (children, nparity, nspares, ndata) in valid_geometry(),
        logical in 0u64..(1u64 << 30),
    ) {
        let (cfg, _perm) = build(children, nparity, nspares, ndata);
        let align = u64::from(cfg.groupwidth()) << cfg.ashift().0;
        let start = cfg.astart(logical);
        prop_assert!(start >= logical);
        prop_assert_eq!(start % align, 0);
    }

    /// Invariant 5: any allowed I/O (starting at a group boundary, no
    /// larger than one group) never spans two groups.
    #[test]
    fn group_aligned_io_never_spans_two_groups(
        (children, nparity, nspares, ndata) in valid_geometry(),
        group_index in 0u64..4,
        size in 1u64..(1u64 << 20),
    ) {
        let (cfg, perm) = build(children, nparity, nspares, ndata);
        let mapper = Mapper::new(&cfg, &perm);
        let size = size.min(cfg.groupsz());
        let logical = mapper.group_to_offset(group_index);
        prop_assert_eq!(mapper.offset_to_group(logical), mapper.offset_to_group(logical + size - 1));
    }
}
