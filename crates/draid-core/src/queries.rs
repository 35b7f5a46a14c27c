//! Address-range translation for scrub/initialize/trim boundary
//! alignment (spec component "Queries").
//!
//! Thin composition over [`Config`] and [`Mapper`]; grounded on the
//! teacher's `PageSize`-alignment helpers in `fsqlite-types`, which
//! similarly expose small round-up/round-down queries rather than
//! owning any state of their own.

use crate::config::Config;
use crate::mapper::Mapper;

fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

fn round_down(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value - value % align
}

/// Range and alignment queries used by scrub, initialize, and trim
/// callers to pick I/O boundaries that respect group geometry.
pub struct Queries<'a> {
    cfg: &'a Config,
    mapper: &'a Mapper<'a>,
}

impl<'a> Queries<'a> {
    #[must_use]
    pub const fn new(cfg: &'a Config, mapper: &'a Mapper<'a>) -> Self {
        Self { cfg, mapper }
    }

    #[must_use]
    pub const fn astart(&self, logical: u64) -> u64 {
        self.cfg.astart(logical)
    }

    #[must_use]
    pub const fn offset_to_group(&self, logical: u64) -> u64 {
        self.mapper.offset_to_group(logical)
    }

    #[must_use]
    pub const fn group_to_offset(&self, group: u64) -> u64 {
        self.mapper.group_to_offset(group)
    }

    /// Smallest `[start, end)` range covering `[start, end)` that is
    /// aligned to full groups, suitable for a scrub/initialize/trim pass
    /// that must never touch a partial group.
    #[must_use]
    pub fn align_group_range(&self, start: u64, end: u64) -> (u64, u64) {
        let group_bytes = self.cfg.groupsz();
        let aligned_start = round_down(start, group_bytes);
        let aligned_end = round_up(end, group_bytes);
        (aligned_start, aligned_end)
    }

    /// `true` if `offset` is a whole number of sectors, per the child's
    /// `ashift` block-size policy.
    #[must_use]
    pub const fn sector_aligned(&self, offset: u64) -> bool {
        offset % (1u64 << self.cfg.ashift().0) == 0
    }
}
