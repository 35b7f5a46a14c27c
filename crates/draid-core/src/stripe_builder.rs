//! Per-I/O stripe map construction (spec component "StripeBuilder").
//!
//! Grounded on the buffer-view taxonomy in `draid-types::stripe` and the
//! three read/write/scrub-resilver variants named in §4.4; the skip
//! sector and gang-view handling mirrors the teacher's page-cache
//! "short read pads with zero" pattern (`pager.rs::read_page_copy`)
//! generalized to column-major stripe layout.

use draid_types::{BufferView, Column, ChildIndex, StripeMap};

use crate::config::Config;
use crate::mapper::Mapper;

fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}

/// Computes the equal per-column byte size every column of a write (or
/// scrub/resilver) stripe shares, given the logical payload size.
fn colsize(cfg: &Config, psize: u64) -> u64 {
    let sector = 1u64 << cfg.ashift().0;
    let share = psize.div_ceil(u64::from(cfg.ndata()));
    round_up(share, sector).max(sector)
}

/// Builds the stripe maps for one logical I/O over the group(s) it
/// touches. Most I/Os touch exactly one group; callers iterate
/// [`StripeBuilder::groups_touched`] and build one [`StripeMap`] per
/// group.
pub struct StripeBuilder<'a> {
    cfg: &'a Config,
    mapper: &'a Mapper<'a>,
}

impl<'a> StripeBuilder<'a> {
    #[must_use]
    pub const fn new(cfg: &'a Config, mapper: &'a Mapper<'a>) -> Self {
        Self { cfg, mapper }
    }

    /// Builds a full-stripe write map for the group starting at
    /// `group_logical_offset`, covering up to `psize` bytes of payload
    /// belonging to this group (the caller pre-splits multi-group I/Os).
    #[must_use]
    pub fn build_write(&self, group_logical_offset: u64, psize: u64) -> StripeMap {
        let size = colsize(self.cfg, psize);
        let nparity = u64::from(self.cfg.nparity());
        let groupwidth = self.cfg.groupwidth();

        let mut stripe = StripeMap::with_capacity(usize::from(groupwidth));
        for col in 0..groupwidth {
            let (child, phys_offset) = self.mapper.column_location(group_logical_offset, col);
            let view = if u64::from(col) < nparity {
                BufferView::Zero { len: size }
            } else {
                let data_idx = u64::from(col) - nparity;
                let payload_offset = data_idx * size;
                let remaining = psize.saturating_sub(payload_offset);
                if remaining >= size {
                    BufferView::Payload { offset: payload_offset, len: size }
                } else if remaining > 0 {
                    BufferView::Gang { data_offset: payload_offset, data_len: remaining, skip_len: size - remaining }
                } else {
                    BufferView::Zero { len: size }
                }
            };
            stripe.push(Column::new(ChildIndex(child), phys_offset, size, view));
        }
        stripe
    }

    /// Builds a scrub/resilver read map for the group at
    /// `group_logical_offset`: identical column layout to a write, but
    /// skip sectors are backed by the shared auxiliary skip buffer
    /// rather than a synthetic zero view, since they are read back and
    /// verified rather than only written.
    #[must_use]
    pub fn build_scrub(&self, group_logical_offset: u64, psize: u64) -> StripeMap {
        let mut stripe = self.build_write(group_logical_offset, psize);
        for col in &mut stripe {
            if let BufferView::Zero { len } = col.buffer_view {
                col.buffer_view = BufferView::AuxSkip { len };
            }
        }
        stripe
    }

    /// Builds a normal read map: only data columns are scheduled.
    /// Parity columns are appended with `skipped = true` and must be
    /// activated (via [`StripeBuilder::expand_for_reconstruction`]) if
    /// the read's checksum fails to verify.
    #[must_use]
    pub fn build_read(&self, group_logical_offset: u64, psize: u64) -> StripeMap {
        let mut stripe = self.build_write(group_logical_offset, psize);
        for (i, col) in stripe.iter_mut().enumerate() {
            if i < usize::from(self.cfg.nparity()) {
                col.skipped = true;
            }
        }
        stripe
    }

    /// Marks every skipped column as active again, attaching an
    /// auxiliary skip buffer to any skip-sector column so reconstruction
    /// has real storage to write into.
    pub fn expand_for_reconstruction(&self, stripe: &mut StripeMap) {
        for col in stripe.iter_mut() {
            if col.skipped {
                col.skipped = false;
                if let BufferView::Zero { len } = col.buffer_view {
                    col.buffer_view = BufferView::AuxSkip { len };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draid_types::Ashift;

    fn fixture() -> (Config, crate::perm_map::PermMap) {
        let cfg = Config::configure(11, 1, 2, 8, 1, Ashift(12)).unwrap();
        let perm = crate::perm_map::PermMap::from_table(cfg.children()).unwrap();
        (cfg, perm)
    }

    #[test]
    fn full_stripe_write_has_groupwidth_columns_of_equal_size() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let builder = StripeBuilder::new(&cfg, &mapper);
        let stripe = builder.build_write(0, 32 * 1024);
        assert_eq!(stripe.len(), usize::from(cfg.groupwidth()));
        let size = stripe[0].size;
        assert!(stripe.iter().all(|c| c.size == size));
    }

    #[test]
    fn short_payload_produces_gang_and_zero_columns() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let builder = StripeBuilder::new(&cfg, &mapper);
        // 1 sector of payload, ndata=8: column 0 gets a gang (partial),
        // columns 1..8 get a pure zero skip sector.
        let sector = 1u64 << cfg.ashift().0;
        let stripe = builder.build_write(0, sector);
        let nparity = usize::from(cfg.nparity());
        assert!(matches!(stripe[nparity].buffer_view, BufferView::Gang { .. } | BufferView::Payload { .. }));
        assert!(matches!(stripe[nparity + 1].buffer_view, BufferView::Zero { .. }));
    }

    #[test]
    fn normal_read_skips_parity_columns() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let builder = StripeBuilder::new(&cfg, &mapper);
        let stripe = builder.build_read(0, 32 * 1024);
        for (i, col) in stripe.iter().enumerate() {
            assert_eq!(col.skipped, i < usize::from(cfg.nparity()));
        }
    }

    #[test]
    fn expand_for_reconstruction_clears_skipped_and_attaches_aux_buffer() {
        let (cfg, perm) = fixture();
        let mapper = Mapper::new(&cfg, &perm);
        let builder = StripeBuilder::new(&cfg, &mapper);
        let mut stripe = builder.build_read(0, 32 * 1024);
        builder.expand_for_reconstruction(&mut stripe);
        assert!(stripe.iter().all(|c| !c.skipped));
        assert!(matches!(stripe[0].buffer_view, BufferView::AuxSkip { .. }));
    }
}
