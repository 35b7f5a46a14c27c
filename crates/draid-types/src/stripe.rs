//! Transient per-I/O stripe map (spec §3 `StripeMap`).

use smallvec::SmallVec;

use crate::ChildIndex;

/// Describes where one column's bytes come from without owning them.
///
/// The engine never copies or allocates the caller's payload; it only
/// describes, for each column, which slice of which buffer (or which
/// synthetic zero-fill) that column's bytes are drawn from. The actual
/// read/write against a [`ChildIo`](https://docs.rs/draid-vfs)
/// implementation resolves this view into real bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferView {
    /// A view into the caller's payload buffer, `[offset, offset+len)`.
    Payload {
        /// Byte offset into the caller's buffer.
        offset: u64,
        /// Length of this column's share.
        len: u64,
    },
    /// A synthetic zero-filled skip sector of `len` bytes (write path).
    Zero {
        /// Length of the skip sector.
        len: u64,
    },
    /// A gang view: `data_len` real bytes from the payload tail followed
    /// by `skip_len` zero-filled bytes, together forming one column.
    Gang {
        /// Byte offset into the caller's buffer where the real tail starts.
        data_offset: u64,
        /// Length of the real data tail.
        data_len: u64,
        /// Length of the zero-filled pad following the tail.
        skip_len: u64,
    },
    /// A view into the single auxiliary skip buffer shared by every
    /// skip-sector column of one stripe (scrub/resilver read variant).
    AuxSkip {
        /// Length of this column's share of the auxiliary buffer.
        len: u64,
    },
}

impl BufferView {
    /// Total byte length this view contributes to its column.
    #[must_use]
    pub const fn len(&self) -> u64 {
        match self {
            Self::Payload { len, .. } | Self::Zero { len } | Self::AuxSkip { len } => *len,
            Self::Gang { data_len, skip_len, .. } => data_len + skip_len,
        }
    }

    /// True when this view contributes zero bytes (possible only for a
    /// degenerate zero-size column, never produced by a valid stripe).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One column of a stripe: a data or parity slot mapped to one physical
/// child and tracked through the lifetime of a single I/O.
#[derive(Debug, Clone)]
pub struct Column {
    /// Physical child this column is dispatched to.
    pub devidx: ChildIndex,
    /// Physical byte offset on that child.
    pub phys_offset: u64,
    /// Byte length of this column (equal across all columns of a stripe).
    pub size: u64,
    /// Where this column's bytes come from or go to.
    pub buffer_view: BufferView,
    /// Set once the column's child I/O has completed with an error.
    pub error: bool,
    /// Set once the column's child I/O has been issued.
    pub tried: bool,
    /// True for a normal-read stripe where this column (typically
    /// parity) was never scheduled.
    pub skipped: bool,
    /// Set when this column should receive a best-effort repair write
    /// after a successful reconstruction.
    pub repair_flag: bool,
}

impl Column {
    /// Builds a fresh, not-yet-dispatched column.
    #[must_use]
    pub fn new(devidx: ChildIndex, phys_offset: u64, size: u64, buffer_view: BufferView) -> Self {
        Self {
            devidx,
            phys_offset,
            size,
            buffer_view,
            error: false,
            tried: false,
            skipped: false,
            repair_flag: false,
        }
    }

    /// True if this column's child I/O was issued and did not error.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.tried && !self.error
    }
}

/// Ordered column vector for one stripe, sized `groupwidth`.
///
/// Parity columns occupy indices `[0, nparity)`; data columns occupy
/// `[nparity, groupwidth)`, per spec §4.4.
pub type StripeMap = SmallVec<[Column; 16]>;
