//! Child-device I/O abstraction injected into the dRAID engine (spec §6
//! "Callbacks required from the environment").
//!
//! The engine never talks to a block device directly; every column I/O
//! goes through a [`ChildIo`] implementation supplied by the caller.
//! This mirrors the environment's own vdev leaf layer, but keeps the
//! geometry/dispatch crates free of any actual storage backend.

mod memory;

pub use memory::MemoryChildIo;

use draid_error::DraidResult;
use draid_types::ChildIndex;

/// Which kind of dirty-time-log entry a [`ChildIo::child_dtl_contains`]
/// query is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtlKind {
    /// The child is entirely missing data for the queried range.
    Missing,
    /// The child has only partial data for the queried range.
    Partial,
}

/// One child I/O issued by the [`Dispatcher`](https://docs.rs/draid-core)
/// for a single stripe column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOp {
    /// Write `buf` to the child at `phys_offset`.
    Write,
    /// Read into `buf` from the child at `phys_offset`.
    Read,
}

/// The environment-supplied child-device interface (spec §6).
///
/// Implementations are required to be `Send + Sync`: the dispatcher may
/// be invoked concurrently from multiple caller threads, and per-column
/// I/O for one stripe has no inter-order (spec §5).
pub trait ChildIo: Send + Sync {
    /// Issues one column I/O synchronously, returning once the child
    /// has completed it (the engine's dispatch loop is itself
    /// synchronous; see the engine's concurrency notes). `buf` is
    /// written to (on a read) or read from (on a write) in place.
    ///
    /// # Errors
    /// Returns [`draid_error::DraidError::Eio`] if the child fails the
    /// operation.
    fn child_io(&self, child_idx: ChildIndex, phys_offset: u64, buf: &mut [u8], op: ChildOp) -> DraidResult<()>;

    /// Whether this child currently accepts reads. Immutable for the
    /// duration of one I/O (spec §6).
    fn child_readable(&self, child_idx: ChildIndex) -> bool;

    /// Whether this child currently accepts writes. Immutable for the
    /// duration of one I/O (spec §6).
    fn child_writable(&self, child_idx: ChildIndex) -> bool;

    /// Dirty-time-log query: does this child lack data of `kind` for
    /// transaction group `txg` over `size` bytes at the queried offset?
    fn child_dtl_contains(&self, child_idx: ChildIndex, kind: DtlKind, txg: u64, size: u64) -> bool;

    /// Whether this child's parent vdev currently uses a replacing or
    /// sparing operator (spec §4.8 "faulted").
    fn child_is_faulted(&self, child_idx: ChildIndex) -> bool;
}
