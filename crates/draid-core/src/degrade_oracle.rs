//! Group-degradation and resilver-necessity queries (spec component
//! "DegradeOracle").
//!
//! The sequential-vs-healing resilver split is ported from
//! `vdev_draid_missing`'s two call sites (no `phys_birth` vs. a known
//! one checked against the child's dirty-time log), per SPEC_FULL.md
//! §10.7: two explicit methods rather than one with an `Option`.

use draid_types::ChildIndex;
use draid_vfs::{ChildIo, DtlKind};

use crate::mapper::Mapper;

/// Answers whether the group at a logical offset is degraded, and
/// whether a block within it needs resilvering.
pub struct DegradeOracle<'a> {
    mapper: &'a Mapper<'a>,
    groupwidth: u16,
}

impl<'a> DegradeOracle<'a> {
    #[must_use]
    pub const fn new(mapper: &'a Mapper<'a>, groupwidth: u16) -> Self {
        Self { mapper, groupwidth }
    }

    fn group_children(&self, logical: u64) -> impl Iterator<Item = ChildIndex> + '_ {
        (0..self.groupwidth).map(move |col| ChildIndex(self.mapper.column_location(logical, col).0))
    }

    /// True if any child the group at `logical` maps to is currently
    /// faulted (its parent uses a replacing or sparing operator).
    #[must_use]
    pub fn group_degraded(&self, io: &dyn ChildIo, logical: u64) -> bool {
        self.group_children(logical).any(|child| io.child_is_faulted(child))
    }

    /// Sequential resilver: no known birth transaction group, so the
    /// oracle's group-degraded answer is authoritative.
    #[must_use]
    pub fn needs_sequential_resilver(&self, io: &dyn ChildIo, logical: u64) -> bool {
        self.group_degraded(io, logical)
    }

    /// Healing resilver: a known `phys_birth` is checked against each
    /// mapped child's dirty-time log; a degraded-but-clean child does
    /// not need this particular block rewritten.
    #[must_use]
    pub fn needs_healing_resilver(&self, io: &dyn ChildIo, logical: u64, phys_birth: u64, size: u64) -> bool {
        if !self.group_degraded(io, logical) {
            return false;
        }
        self.group_children(logical).any(|child| io.child_dtl_contains(child, DtlKind::Partial, phys_birth, size))
    }
}
