//! Immutable dRAID geometry (spec component "Config").
//!
//! Grounded on the teacher's `PageSize`/`PageNumber` newtype-plus-validator
//! pattern in `fsqlite-types`: a small set of fields validated once at
//! construction, with derived quantities computed eagerly so hot paths
//! never recompute them.

use draid_error::{DraidError, DraidResult};
use draid_types::Ashift;

/// Fixed per-child, per-row chunk size (`VDEV_DRAID_ROWSHIFT` upstream).
pub const ROWSHIFT: u32 = 24;
/// `2^ROWSHIFT` bytes, 16 MiB.
pub const ROWSIZE: u64 = 1 << ROWSHIFT;

/// Immutable geometry of one dRAID instance.
///
/// Constructed once via [`Config::configure`] and never mutated; every
/// derived quantity used by [`crate::mapper::Mapper`] and
/// [`crate::stripe_builder::StripeBuilder`] is computed up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    children: u16,
    nparity: u8,
    nspares: u16,
    ndata: u16,
    ngroups: u64,
    ashift: Ashift,
    groupwidth: u16,
    ndisks: u16,
    groupsz: u64,
    devslicesz: u64,
}

impl Config {
    /// Validates and constructs a dRAID geometry.
    ///
    /// # Errors
    /// Returns [`DraidError::Einval`] when `children` is outside
    /// `2..=255`, `nparity` exceeds 3, the group width does not fit in
    /// the disks available after spares, `(groupwidth * ngroups) %
    /// ndisks != 0`, or `nspares >= children`.
    pub fn configure(
        children: u16,
        nparity: u8,
        nspares: u16,
        ndata: u16,
        ngroups: u64,
        ashift: Ashift,
    ) -> DraidResult<Self> {
        if !(2..=255).contains(&children) {
            return Err(DraidError::einval(format!("children {children} out of range 2..=255")));
        }
        if nparity == 0 || nparity > 3 {
            return Err(DraidError::einval(format!("nparity {nparity} out of range 1..=3")));
        }
        if nspares >= children {
            return Err(DraidError::einval(format!("nspares {nspares} must be less than children {children}")));
        }
        if ndata == 0 {
            return Err(DraidError::einval("ndata must be at least 1"));
        }
        let ndisks = children - nspares;
        let groupwidth = ndata
            .checked_add(u16::from(nparity))
            .ok_or_else(|| DraidError::einval("ndata + nparity overflows u16"))?;
        if groupwidth > ndisks {
            return Err(DraidError::einval(format!("groupwidth {groupwidth} exceeds usable disks {ndisks}")));
        }
        if ngroups == 0 {
            return Err(DraidError::einval("ngroups must be at least 1"));
        }
        let product = u64::from(groupwidth) * ngroups;
        if product % u64::from(ndisks) != 0 {
            return Err(DraidError::einval(format!(
                "groupwidth*ngroups ({product}) must be divisible by ndisks ({ndisks})"
            )));
        }

        let groupsz = u64::from(groupwidth) * ROWSIZE;
        let devslicesz = (groupsz * ngroups) / u64::from(ndisks);

        Ok(Self { children, nparity, nspares, ndata, ngroups, ashift, groupwidth, ndisks, groupsz, devslicesz })
    }

    #[must_use]
    pub const fn children(&self) -> u16 {
        self.children
    }

    #[must_use]
    pub const fn nparity(&self) -> u8 {
        self.nparity
    }

    #[must_use]
    pub const fn nspares(&self) -> u16 {
        self.nspares
    }

    #[must_use]
    pub const fn ndata(&self) -> u16 {
        self.ndata
    }

    #[must_use]
    pub const fn ngroups(&self) -> u64 {
        self.ngroups
    }

    #[must_use]
    pub const fn ashift(&self) -> Ashift {
        self.ashift
    }

    #[must_use]
    pub const fn groupwidth(&self) -> u16 {
        self.groupwidth
    }

    #[must_use]
    pub const fn ndisks(&self) -> u16 {
        self.ndisks
    }

    #[must_use]
    pub const fn groupsz(&self) -> u64 {
        self.groupsz
    }

    #[must_use]
    pub const fn devslicesz(&self) -> u64 {
        self.devslicesz
    }

    /// Rounds `logical` up to the group/sector alignment boundary.
    #[must_use]
    pub const fn astart(&self, logical: u64) -> u64 {
        let align = (self.groupwidth as u64) << self.ashift.0;
        round_up(logical, align)
    }

    /// Expands a logical payload size to the allocated stripe size.
    #[must_use]
    pub const fn asize(&self, psize: u64) -> u64 {
        let data_chunk = (self.ndata as u64) << self.ashift.0;
        let rows = round_up(psize, data_chunk) / data_chunk;
        rows * data_chunk * (self.groupwidth as u64) / (self.ndata as u64)
    }

    /// Inverse of [`Config::asize`].
    ///
    /// # Errors
    /// Returns [`DraidError::Einval`] if `asize` is not a multiple of
    /// `groupwidth`.
    pub fn psize(&self, asize: u64) -> DraidResult<u64> {
        if asize % u64::from(self.groupwidth) != 0 {
            return Err(DraidError::einval(format!("asize {asize} is not a multiple of groupwidth {}", self.groupwidth)));
        }
        Ok(asize / u64::from(self.groupwidth) * u64::from(self.ndata))
    }

    /// Largest allocatable extent whose `psize` satisfies
    /// `psize <= max_segment` and is a whole number of data-column rows.
    #[must_use]
    pub const fn max_rebuildable_asize(&self, max_segment: u64) -> u64 {
        let data_chunk = (self.ndata as u64) << self.ashift.0;
        let rows = max_segment / data_chunk;
        rows * data_chunk
    }
}

const fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config::configure(11, 1, 2, 8, 1, Ashift(12)).unwrap()
    }

    #[test]
    fn derives_groupwidth_and_ndisks() {
        let cfg = sample();
        assert_eq!(cfg.groupwidth(), 9);
        assert_eq!(cfg.ndisks(), 9);
    }

    #[test]
    fn rejects_children_out_of_range() {
        assert!(Config::configure(1, 1, 0, 1, 1, Ashift(9)).is_err());
        assert!(Config::configure(256, 1, 0, 1, 1, Ashift(9)).is_err());
    }

    #[test]
    fn rejects_nparity_above_three() {
        assert!(Config::configure(10, 4, 0, 5, 1, Ashift(9)).is_err());
    }

    #[test]
    fn rejects_groupwidth_wider_than_usable_disks() {
        assert!(Config::configure(10, 1, 8, 5, 1, Ashift(9)).is_err());
    }

    #[test]
    fn rejects_non_divisible_group_layout() {
        assert!(Config::configure(10, 1, 0, 4, 3, Ashift(9)).is_err());
    }

    #[test]
    fn astart_rounds_up_to_group_alignment() {
        let cfg = sample();
        let align = 9u64 << 12;
        assert_eq!(cfg.astart(0), 0);
        assert_eq!(cfg.astart(1), align);
        assert_eq!(cfg.astart(align), align);
    }

    #[test]
    fn psize_and_asize_round_trip() {
        let cfg = sample();
        let data_chunk = 8u64 << 12;
        for rows in 1..5u64 {
            let psize = rows * data_chunk;
            let asize = cfg.asize(psize);
            assert_eq!(cfg.psize(asize).unwrap(), psize);
        }
    }

    #[test]
    fn psize_rejects_misaligned_asize() {
        let cfg = sample();
        assert!(cfg.psize(1).is_err());
    }
}
