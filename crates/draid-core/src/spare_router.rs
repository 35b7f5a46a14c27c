//! Distributed-spare virtual-child resolution (spec component
//! "SpareRouter") and the in-memory label synthesis described in
//! SPEC_FULL.md §10.7.
//!
//! Grounded on invariant 3 of the data model: the spares of permutation
//! `P` are the last `nspares` entries of the table row/rotation that
//! `get_perm(P)` folds `P` onto. Nested spare-of-spare resolution (a distributed
//! spare whose resolved leaf is itself another dRAID's spare) is not
//! modeled — this engine represents one flat array of children per
//! device, and the original's recursive case exists only for nested vdev
//! topologies outside this core's Data Model (see DESIGN.md).

use hashbrown::HashMap;
use parking_lot::Mutex;

use draid_error::{DraidError, DraidResult};
use draid_types::{ChildIndex, IoFlags};

use crate::config::Config;
use crate::perm_map::PermMap;

/// Reserved head-of-device label region size.
pub const LABEL_HEAD_SIZE: u64 = 256 * 1024;
/// Reserved tail-of-device label region size.
pub const LABEL_TAIL_SIZE: u64 = 256 * 1024;

/// Which top-level vdev operator currently parents a spare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentOperator {
    Spare,
    Replacing,
    Draid,
    Other,
}

/// A minimal in-memory label synthesized for a probe read, per §4.7's
/// "Label I/O" bullet: no on-disk nvlist is ever parsed or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyntheticLabel {
    pub pool_state: u64,
    pub txg: u64,
    pub version: u64,
    pub vdev_guid: u64,
    pub spare_active: bool,
}

/// Resolves distributed-spare virtual children to physical leaves.
///
/// `(spare_id, perm_index)` resolutions are cached: the same spare slot
/// is re-resolved on every I/O that lands in its slice, and the
/// permutation entry it maps to never changes for the lifetime of the
/// device, so repeat lookups are served from the cache instead of
/// recomputing `rows_per_perm`/`entry` each time.
pub struct SpareRouter<'a> {
    cfg: &'a Config,
    perm: &'a PermMap,
    resolved: Mutex<HashMap<(u16, u64), ChildIndex>>,
}

impl<'a> SpareRouter<'a> {
    #[must_use]
    pub fn new(cfg: &'a Config, perm: &'a PermMap) -> Self {
        Self { cfg, perm, resolved: Mutex::new(HashMap::new()) }
    }

    /// Resolves the physical child backing distributed spare `spare_id`
    /// at `phys_offset`.
    ///
    /// Returns `None` when `phys_offset` falls outside the addressable
    /// range (beyond `child_capacity` less the reserved label regions).
    ///
    /// `perm_index` grows without bound as `phys_offset` advances, so
    /// the child is drawn via [`PermMap::get_perm`]'s `(base, iter)`
    /// fold rather than indexing the table directly by `perm_index`.
    #[must_use]
    pub fn get_child(&self, spare_id: u16, phys_offset: u64, child_capacity: u64) -> Option<ChildIndex> {
        if phys_offset >= child_capacity.saturating_sub(LABEL_HEAD_SIZE + LABEL_TAIL_SIZE) {
            return None;
        }
        let perm_index = phys_offset / self.cfg.devslicesz();
        let key = (spare_id, perm_index);
        if let Some(child) = self.resolved.lock().get(&key) {
            return Some(*child);
        }
        let (base, iter) = self.perm.get_perm(perm_index);
        let col = self.cfg.children() - 1 - spare_id;
        let child = ChildIndex(self.perm.permute_id(base, iter, col));
        self.resolved.lock().insert(key, child);
        Some(child)
    }

    /// A spare is active iff its parent vdev currently uses one of the
    /// spare/replacing/draid operators.
    #[must_use]
    pub const fn is_active(parent: ParentOperator) -> bool {
        !matches!(parent, ParentOperator::Other)
    }

    /// Synthesizes a label for a probe read landing in the head or tail
    /// reserved region of a child slice, or `None` outside those ranges.
    #[must_use]
    pub fn label_probe(
        &self,
        phys_offset: u64,
        child_capacity: u64,
        txg: u64,
        vdev_guid: u64,
        spare_active: bool,
    ) -> Option<SyntheticLabel> {
        if Self::in_label_region(phys_offset, child_capacity) {
            Some(SyntheticLabel { pool_state: 0, txg, version: 1, vdev_guid, spare_active })
        } else {
            None
        }
    }

    /// A write into a label region silently succeeds when the
    /// submission carries `CONFIG_WRITER` or `PROBE`, and fails
    /// [`DraidError::Eio`] otherwise.
    ///
    /// # Errors
    /// [`DraidError::Eio`] if neither flag is set for a label-region
    /// write.
    pub fn label_write(phys_offset: u64, child_capacity: u64, flags: IoFlags) -> DraidResult<()> {
        if !Self::in_label_region(phys_offset, child_capacity) {
            return Ok(());
        }
        if flags.intersects(IoFlags::CONFIG_WRITER | IoFlags::PROBE) {
            Ok(())
        } else {
            Err(DraidError::eio("label region write requires CONFIG_WRITER or PROBE"))
        }
    }

    fn in_label_region(phys_offset: u64, child_capacity: u64) -> bool {
        phys_offset < LABEL_HEAD_SIZE || phys_offset >= child_capacity.saturating_sub(LABEL_TAIL_SIZE)
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
    fn spare_columns_are_the_last_nspares_entries_of_their_perm_row() {
        let (cfg, perm) = fixture();
        let router = SpareRouter::new(&cfg, &perm);
        let capacity = 64 * 1024 * 1024;
        let s0 = router.get_child(0, 0, capacity).unwrap();
        let s1 = router.get_child(1, 0, capacity).unwrap();
        let row0 = perm.row(0);
        assert_eq!(s0.0, row0[usize::from(cfg.children()) - 1]);
        assert_eq!(s1.0, row0[usize::from(cfg.children()) - 2]);
    }

    #[test]
    fn get_child_does_not_panic_once_perm_index_exceeds_table_rows() {
        let (cfg, perm) = fixture();
        let router = SpareRouter::new(&cfg, &perm);
        let nperms = u64::from(perm.nperms());
        let devslicesz = cfg.devslicesz();
        let capacity = devslicesz * (nperms * 5 + 10);
        for perm_index in [nperms - 1, nperms, nperms + 1, nperms * 5 + 3] {
            let phys_offset = perm_index * devslicesz;
            assert!(router.get_child(0, phys_offset, capacity).is_some());
        }
    }

    #[test]
    fn get_child_returns_none_past_capacity() {
        let (cfg, perm) = fixture();
        let router = SpareRouter::new(&cfg, &perm);
        assert!(router.get_child(0, 1_000_000_000, 1_000_000).is_none());
    }

    #[test]
    fn active_operator_detection() {
        assert!(SpareRouter::is_active(ParentOperator::Spare));
        assert!(SpareRouter::is_active(ParentOperator::Draid));
        assert!(!SpareRouter::is_active(ParentOperator::Other));
    }

    #[test]
    fn label_probe_only_matches_head_and_tail_regions() {
        let (cfg, perm) = fixture();
        let router = SpareRouter::new(&cfg, &perm);
        let capacity = 10 * 1024 * 1024;
        assert!(router.label_probe(0, capacity, 1, 1, false).is_some());
        assert!(router.label_probe(capacity - 1, capacity, 1, 1, false).is_some());
        assert!(router.label_probe(capacity / 2, capacity, 1, 1, false).is_none());
    }

    #[test]
    fn label_write_requires_config_writer_or_probe_flag() {
        let capacity = 10 * 1024 * 1024;
        assert!(SpareRouter::label_write(0, capacity, IoFlags::CONFIG_WRITER).is_ok());
        assert!(SpareRouter::label_write(0, capacity, IoFlags::empty()).is_err());
        assert!(SpareRouter::label_write(capacity / 2, capacity, IoFlags::empty()).is_ok());
    }
}
