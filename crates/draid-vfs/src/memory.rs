//! In-memory [`ChildIo`] double used by the engine's own test suites.
//!
//! Grounded on the `MemoryVfs` test double used throughout the teacher
//! pager's unit tests: a `Mutex`-guarded vector of growable byte
//! buffers, plus a handful of fault-injection switches a test can flip
//! before submitting an I/O.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

use draid_error::{DraidError, DraidResult};
use draid_types::ChildIndex;

use crate::{ChildIo, ChildOp, DtlKind};

#[derive(Default)]
struct Inner {
    children: Vec<Vec<u8>>,
    unreadable: HashSet<u16>,
    unwritable: HashSet<u16>,
    faulted: HashSet<u16>,
    dtl_missing: HashSet<u16>,
    dtl_partial: HashSet<u16>,
}

/// An in-memory stand-in for a set of child devices.
pub struct MemoryChildIo {
    inner: Mutex<Inner>,
}

impl MemoryChildIo {
    /// Creates a double with `count` children, each an empty backing buffer.
    #[must_use]
    pub fn new(count: u16) -> Self {
        let children = (0..count).map(|_| Vec::new()).collect();
        Self { inner: Mutex::new(Inner { children, ..Inner::default() }) }
    }

    /// Marks a child as failing every subsequent read.
    pub fn set_unreadable(&self, child_idx: ChildIndex, unreadable: bool) {
        let mut inner = self.inner.lock();
        if unreadable {
            inner.unreadable.insert(child_idx.0);
        } else {
            inner.unreadable.remove(&child_idx.0);
        }
    }

    /// Marks a child as failing every subsequent write.
    pub fn set_unwritable(&self, child_idx: ChildIndex, unwritable: bool) {
        let mut inner = self.inner.lock();
        if unwritable {
            inner.unwritable.insert(child_idx.0);
        } else {
            inner.unwritable.remove(&child_idx.0);
        }
    }

    /// Marks a child as faulted (parent uses a replacing/sparing operator).
    pub fn set_faulted(&self, child_idx: ChildIndex, faulted: bool) {
        let mut inner = self.inner.lock();
        if faulted {
            inner.faulted.insert(child_idx.0);
        } else {
            inner.faulted.remove(&child_idx.0);
        }
    }

    /// Marks a child as carrying a dirty-time-log entry of the given kind.
    pub fn set_dtl(&self, child_idx: ChildIndex, kind: DtlKind, present: bool) {
        let mut inner = self.inner.lock();
        let set = match kind {
            DtlKind::Missing => &mut inner.dtl_missing,
            DtlKind::Partial => &mut inner.dtl_partial,
        };
        if present {
            set.insert(child_idx.0);
        } else {
            set.remove(&child_idx.0);
        }
    }

    /// Flips every bit of `len` bytes at `phys_offset` on a child,
    /// simulating silent on-disk corruption that a plain read reports
    /// no error for.
    pub fn corrupt(&self, child_idx: ChildIndex, phys_offset: u64, len: usize) {
        let mut inner = self.inner.lock();
        let start = phys_offset as usize;
        let end = start + len;
        let dev = &mut inner.children[child_idx.as_usize()];
        if dev.len() < end {
            dev.resize(end, 0);
        }
        for b in &mut dev[start..end] {
            *b ^= 0xFF;
        }
    }

    /// Reads back the raw bytes currently stored for a child, for
    /// assertions in tests.
    #[must_use]
    pub fn snapshot(&self, child_idx: ChildIndex, phys_offset: u64, len: usize) -> Vec<u8> {
        let inner = self.inner.lock();
        let buf = &inner.children[child_idx.as_usize()];
        let start = phys_offset as usize;
        let mut out = vec![0u8; len];
        let avail = buf.len().saturating_sub(start).min(len);
        out[..avail].copy_from_slice(&buf[start..start + avail]);
        out
    }
}

impl ChildIo for MemoryChildIo {
    fn child_io(&self, child_idx: ChildIndex, phys_offset: u64, buf: &mut [u8], op: ChildOp) -> DraidResult<()> {
        let mut inner = self.inner.lock();
        let idx = child_idx.0;
        match op {
            ChildOp::Write => {
                if inner.unwritable.contains(&idx) {
                    debug!(child = idx, phys_offset, "memory child write rejected");
                    return Err(DraidError::eio(format!("child {idx} is unwritable")));
                }
                let start = phys_offset as usize;
                let end = start + buf.len();
                let dev = &mut inner.children[child_idx.as_usize()];
                if dev.len() < end {
                    dev.resize(end, 0);
                }
                dev[start..end].copy_from_slice(buf);
                Ok(())
            }
            ChildOp::Read => {
                if inner.unreadable.contains(&idx) {
                    debug!(child = idx, phys_offset, "memory child read rejected");
                    return Err(DraidError::eio(format!("child {idx} is unreadable")));
                }
                let start = phys_offset as usize;
                let dev = &inner.children[child_idx.as_usize()];
                let avail = dev.len().saturating_sub(start).min(buf.len());
                buf[..avail].copy_from_slice(&dev[start..start + avail]);
                buf[avail..].fill(0);
                Ok(())
            }
        }
    }

    fn child_readable(&self, child_idx: ChildIndex) -> bool {
        !self.inner.lock().unreadable.contains(&child_idx.0)
    }

    fn child_writable(&self, child_idx: ChildIndex) -> bool {
        !self.inner.lock().unwritable.contains(&child_idx.0)
    }

    fn child_dtl_contains(&self, child_idx: ChildIndex, kind: DtlKind, _txg: u64, _size: u64) -> bool {
        let inner = self.inner.lock();
        match kind {
            DtlKind::Missing => inner.dtl_missing.contains(&child_idx.0),
            DtlKind::Partial => inner.dtl_partial.contains(&child_idx.0),
        }
    }

    fn child_is_faulted(&self, child_idx: ChildIndex) -> bool {
        self.inner.lock().faulted.contains(&child_idx.0)
    }
}
