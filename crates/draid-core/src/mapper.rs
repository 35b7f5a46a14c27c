//! Logical-to-physical address translation (spec component "Mapper").
//!
//! Grounded on `Config`'s derived-quantity fields and the permutation
//! matrix produced by [`crate::perm_map::PermMap`]; the arithmetic below
//! is a direct, non-branching translation of the offset math rather than
//! a port of any specific teacher file, since no example crate in the
//! pack has an analogous address-space-folding component.

use crate::config::{Config, ROWSIZE};
use crate::perm_map::PermMap;

/// Physical placement of one logical group: the permutation row each
/// column's physical offset is drawn from, and the starting column
/// within that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPlacement {
    pub group: u64,
    pub perm_index: u64,
    pub group_start_col: u16,
    pub row_in_perm: u64,
    pub row_offset: u64,
}

/// Translates logical offsets to physical placement using a [`Config`]
/// and its [`PermMap`].
pub struct Mapper<'a> {
    cfg: &'a Config,
    perm: &'a PermMap,
}

impl<'a> Mapper<'a> {
    #[must_use]
    pub const fn new(cfg: &'a Config, perm: &'a PermMap) -> Self {
        Self { cfg, perm }
    }

    #[must_use]
    pub const fn offset_to_group(&self, logical: u64) -> u64 {
        logical / self.cfg.groupsz()
    }

    #[must_use]
    pub const fn group_to_offset(&self, group: u64) -> u64 {
        group * self.cfg.groupsz()
    }

    /// Computes the full placement of the group containing `logical`.
    #[must_use]
    pub fn placement(&self, logical: u64) -> GroupPlacement {
        let group = self.offset_to_group(logical);
        let groupwidth = u64::from(self.cfg.groupwidth());
        let ndisks = u64::from(self.cfg.ndisks());
        let ngroups = self.cfg.ngroups();

        let group_start_col = ((group * groupwidth) % ndisks) as u16;
        let perm_index = group / ngroups;
        let rows_per_perm = (groupwidth * ngroups) / ndisks;
        let row_in_perm = perm_index * rows_per_perm + ((group % ngroups) * groupwidth) / ndisks;
        let row_offset = (logical % self.cfg.groupsz()) / groupwidth;

        GroupPlacement { group, perm_index, group_start_col, row_in_perm, row_offset }
    }

    /// Returns the physical `(child_index, phys_offset)` for column
    /// `col` (`0..groupwidth`) of the group at `logical`, wrapping onto
    /// the next permutation row if the group's starting column plus
    /// `col` exceeds `ndisks`.
    ///
    /// The child is drawn by folding `placement.perm_index` through the
    /// permutation table's `(base, iter)` rotation rather than indexing
    /// the table directly by `row_in_perm`: `row_in_perm` grows without
    /// bound as groups advance, while the table only ever holds
    /// `nperms` rows, so a direct index panics once `row_in_perm`
    /// reaches it.
    #[must_use]
    pub fn column_location(&self, logical: u64, col: u16) -> (u16, u64) {
        let placement = self.placement(logical);
        let ndisks = self.cfg.ndisks();
        let groupwidth = self.cfg.groupwidth();
        let wrap = if placement.group_start_col + groupwidth > ndisks {
            ndisks - placement.group_start_col
        } else {
            groupwidth
        };
        let absolute_col = (placement.group_start_col + col) % ndisks;
        let (base, iter) = self.perm.get_perm(placement.perm_index);
        let child = self.perm.permute_id(base, iter, absolute_col);
        let row = if col >= wrap { placement.row_in_perm + 1 } else { placement.row_in_perm };
        let phys_offset = row * ROWSIZE + placement.row_offset;
        (child, phys_offset)
    }

    /// `true` if the group at `logical` wraps across the row boundary,
    /// i.e. its columns are not all drawn from the same permutation row.
    #[must_use]
    pub fn wraps(&self, logical: u64) -> bool {
        let placement = self.placement(logical);
        placement.group_start_col + self.cfg.groupwidth() > self.cfg.ndisks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draid_types::Ashift;

    fn fixture() -> (Config, PermMap) {
        let cfg = Config::configure(11, 1, 2, 8, 1, Ashift(12)).unwrap();
        let perm = PermMap::from_table(cfg.children()).unwrap();
        (cfg, perm)
    }

    #[test]
    fn first_group_starts_at_row_zero_column_zero() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let placement = mapper.placement(0);
        assert_eq!(placement.group, 0);
        assert_eq!(placement.group_start_col, 0);
        assert_eq!(placement.row_in_perm, 0);
    }

    #[test]
    fn columns_of_one_group_map_to_distinct_children() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        for logical in [0u64, cfg.groupsz(), cfg.groupsz() * 3] {
            let mut seen = std::collections::HashSet::new();
            for col in 0..cfg.groupwidth() {
                let (child, _) = mapper.column_location(logical, col);
                assert!(seen.insert(child), "duplicate child in group at {logical}");
            }
        }
    }

    #[test]
    fn offset_to_group_and_group_to_offset_are_inverse_at_boundaries() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        for g in 0..5u64 {
            let offset = mapper.group_to_offset(g);
            assert_eq!(mapper.offset_to_group(offset), g);
        }
    }

    #[test]
    fn group_non_spanning_holds_within_one_group() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let logical = cfg.groupsz() * 2;
        let size = cfg.groupsz() - 1;
        assert_eq!(mapper.offset_to_group(logical), mapper.offset_to_group(logical + size - 1));
    }

    #[test]
    fn column_location_does_not_panic_once_group_index_exceeds_table_rows() {
        // E1 geometry: rows_per_perm == 1, so row_in_perm == group, and
        // this config's table has only 256 rows (perm_table.rs). A group
        // far past 256 must still resolve instead of indexing the table
        // out of bounds.
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let nperms = u64::from(perm.nperms());
        for group in [nperms - 1, nperms, nperms + 1, nperms * 5 + 3] {
            let logical = mapper.group_to_offset(group);
            let mut seen = std::collections::HashSet::new();
            for col in 0..cfg.groupwidth() {
                let (child, _) = mapper.column_location(logical, col);
                assert!(seen.insert(child), "duplicate child in group {group}");
            }
        }
    }
}
