//! Top-level dRAID device: wires [`Config`], [`PermMap`], [`Mapper`],
//! [`StripeBuilder`], [`Dispatcher`] and [`SpareRouter`] behind one
//! submission entrypoint (spec §6 "External interfaces"). Callers that
//! need `draid_core::Queries` or `draid_core::DegradeOracle` compose
//! them over [`DraidDevice::mapper`] directly.
//!
//! Grounded on the teacher's top-level `Pager` (`fsqlite-pager::pager`):
//! a thin struct owning the geometry-free state plus one generic child
//! transport, exposing synchronous `Result`-returning methods rather
//! than its own event loop.

use tracing::{debug, warn};

use draid_core::{Config, Dispatcher, Mapper, PermMap, SpareRouter, StripeBuilder};
use draid_core::config::ROWSIZE;
use draid_error::{DraidError, DraidResult};
use draid_parity::ParityEngine;
use draid_types::{CompletionReport, IoFlags, IoOp, SubmissionRequest};
use draid_vfs::ChildIo;

/// A fully configured dRAID instance bound to one child transport.
///
/// Owns the immutable [`Config`] and [`PermMap`] and constructs the
/// per-call helper views ([`Mapper`], [`StripeBuilder`], [`Dispatcher`])
/// on demand; none of them carry state across calls, so there is
/// nothing to cache beyond [`SpareRouter`]'s own internal resolution
/// cache.
pub struct DraidDevice<IO: ChildIo> {
    cfg: Config,
    perm: PermMap,
    parity: ParityEngine,
    child_capacity: u64,
    vdev_guid: u64,
    io: IO,
}

impl<IO: ChildIo> DraidDevice<IO> {
    /// Opens a dRAID device: validates `cfg` (already validated by
    /// [`Config::configure`]) and loads the permutation map for its
    /// child count from the built-in table.
    ///
    /// # Errors
    /// Returns [`DraidError::Enoent`] if no permutation-map entry
    /// exists for `cfg.children()`.
    pub fn open(cfg: Config, child_capacity: u64, vdev_guid: u64, io: IO) -> DraidResult<Self> {
        let perm = PermMap::from_table(cfg.children())?;
        Ok(Self { cfg, perm, parity: ParityEngine::new(), child_capacity, vdev_guid, io })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    #[must_use]
    pub const fn perm_map(&self) -> &PermMap {
        &self.perm
    }

    /// A [`Mapper`] over this device's geometry. Cheap and stateless;
    /// callers compose [`Queries`] and [`DegradeOracle`] over it
    /// themselves, since both borrow a `Mapper` rather than own one.
    #[must_use]
    pub fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.cfg, &self.perm)
    }

    /// A [`SpareRouter`] view over the current permutation map.
    #[must_use]
    pub fn spare_router(&self) -> SpareRouter<'_> {
        SpareRouter::new(&self.cfg, &self.perm)
    }

    /// The underlying child transport, for callers that need to drive
    /// or inspect it directly (fault injection in tests, snapshotting a
    /// [`draid_vfs::MemoryChildIo`] double).
    #[must_use]
    pub const fn io(&self) -> &IO {
        &self.io
    }

    /// Submits one logical I/O, dispatching it to the child transport
    /// and returning its completion report.
    ///
    /// `payload` is the caller-owned buffer: for [`IoOp::Write`] and
    /// [`IoOp::LabelProbe`]-with-`CONFIG_WRITER`, bytes are read from
    /// it; for [`IoOp::Read`] and a plain [`IoOp::LabelProbe`], bytes
    /// are written into it.
    ///
    /// # Errors
    /// [`DraidError::Einval`] if `req.offset` is not group-aligned or
    /// `req.size` spans more than one group; [`DraidError::Enxio`] if
    /// too many children fail for the requested redundancy to cover;
    /// [`DraidError::Enotsup`] for [`IoOp::Trim`], which this engine
    /// instance does not forward to a trim-capable transport.
    pub fn submit(&self, req: SubmissionRequest, payload: &mut [u8]) -> DraidResult<CompletionReport> {
        // `LabelProbe` addresses a physical per-child offset, not a
        // logical group-aligned one; it skips the geometry checks below.
        if req.op == IoOp::LabelProbe {
            return self.label_probe(req, payload);
        }

        debug!(op = ?req.op, offset = req.offset, size = req.size, "submitting dRAID I/O");

        if req.offset != self.cfg.astart(req.offset) {
            return Err(DraidError::einval(format!("offset {} is not group-aligned", req.offset)));
        }
        let max_group_psize = u64::from(self.cfg.ndata()) * ROWSIZE;
        if req.size > max_group_psize {
            return Err(DraidError::einval(format!(
                "size {} exceeds one group's data capacity {max_group_psize}",
                req.size
            )));
        }

        let mapper = self.mapper();
        let builder = StripeBuilder::new(&self.cfg, &mapper);
        let dispatcher = Dispatcher::new(&self.cfg, &self.parity);

        let result = match req.op {
            IoOp::Write => {
                let mut stripe = builder.build_write(req.offset, req.size);
                dispatcher.dispatch_write(&self.io, &mut stripe, payload)
            }
            IoOp::Read => {
                let mut stripe = builder.build_read(req.offset, req.size);
                dispatcher.dispatch_read(&self.io, &builder, &mut stripe, payload, req.expected_checksum)
            }
            IoOp::Scrub | IoOp::Resilver => {
                let mut stripe = builder.build_scrub(req.offset, req.size);
                dispatcher.dispatch_scrub(&self.io, &mut stripe)
            }
            IoOp::Trim => Err(DraidError::enotsup("trim is not forwarded by this engine instance")),
            IoOp::Flush => Ok(CompletionReport::clean()),
            IoOp::LabelProbe => unreachable!("handled above"),
        };
        if let Err(ref e) = result {
            warn!(offset = req.offset, error = %e, "dRAID submission failed");
        }
        result
    }

    /// Handles [`IoOp::LabelProbe`]: synthesizes a label for an offset
    /// landing in a reserved head/tail region and serializes it into
    /// `payload`, or rejects offsets outside those regions.
    fn label_probe(&self, req: SubmissionRequest, payload: &mut [u8]) -> DraidResult<CompletionReport> {
        let router = self.spare_router();
        let spare_active = req.flags.contains(IoFlags::RESILVER);
        let Some(label) = router.label_probe(req.offset, self.child_capacity, req.birth_txg.unwrap_or(0), self.vdev_guid, spare_active)
        else {
            return Err(DraidError::enxio(format!("offset {} is not within a label region", req.offset)));
        };
        let encoded = serde_json::to_vec(&label).map_err(|e| DraidError::eio(e.to_string()))?;
        if encoded.len() > payload.len() {
            return Err(DraidError::einval("label probe buffer too small for synthesized label"));
        }
        payload[..encoded.len()].copy_from_slice(&encoded);
        payload[encoded.len()..].fill(0);
        Ok(CompletionReport::clean())
    }
}
