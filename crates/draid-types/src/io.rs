//! The logical-I/O boundary shape: operation kind, flags, submission
//! request and completion report (spec §6).

use crate::ChildIndex;

/// Kind of logical operation a caller submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    /// Full-stripe write; all `groupwidth` columns are scheduled.
    Write,
    /// Data-only read, expanded to include parity on checksum failure.
    Read,
    /// Always reads every column including skip sectors, verifies parity.
    Scrub,
    /// Like `Scrub`, additionally aware of per-child fault state for
    /// repair-write scheduling.
    Resilver,
    /// Forwarded to children as-is; rejected with `Enotsup` where the
    /// target spare lacks TRIM support.
    Trim,
    /// Forwarded to children; carries no stripe geometry.
    Flush,
    /// Reads the synthesized label region of a spare or leaf.
    LabelProbe,
}

bitflags::bitflags! {
    /// Per-submission behavior modifiers (spec §6 `flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct IoFlags: u8 {
        /// This I/O is part of a scrub pass.
        const SCRUB = 0b0001;
        /// This I/O is part of a resilver pass.
        const RESILVER = 0b0010;
        /// This I/O is a label/config probe, not ordinary data traffic.
        const PROBE = 0b0100;
        /// The caller holds the configuration writer lock; label writes
        /// to reserved regions are permitted rather than rejected.
        const CONFIG_WRITER = 0b1000;
    }
}

/// One logical I/O submitted to the engine.
///
/// `buffer_len` stands in for the opaque gather-list buffer named in
/// spec §6 ("byte-ABD"); this engine does not own caller memory, so it
/// tracks only the length needed to build a [`StripeMap`](crate::StripeMap)
/// and leaves the actual bytes behind a [`ChildIo`](https://docs.rs/draid-vfs)
/// implementation.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionRequest {
    /// Operation kind.
    pub op: IoOp,
    /// Logical byte offset; must equal `Config::astart(offset)`.
    pub offset: u64,
    /// Logical byte size; must fit within a single group.
    pub size: u64,
    /// Length of the caller-supplied payload buffer, in bytes.
    pub buffer_len: u64,
    /// Behavior modifiers.
    pub flags: IoFlags,
    /// Birth transaction group, used by `DegradeOracle` for healing
    /// resilver; `None` means "sequential resilver, no known birth".
    pub birth_txg: Option<u64>,
    /// Caller-supplied checksum the assembled [`IoOp::Read`] payload
    /// must match; `None` skips verification. Ignored by every other
    /// `op`. A successful read whose checksum mismatches triggers the
    /// same reconstruction path as a failed child read (spec §4.6).
    pub expected_checksum: Option<u64>,
}

/// Result of a completed logical I/O.
#[derive(Debug, Clone, Default)]
pub struct CompletionReport {
    /// Children whose column I/O failed, in dispatch order.
    pub failed_children: Vec<ChildIndex>,
    /// Whether `Parity::reconstruct` was attempted for this I/O.
    pub reconstruction_attempted: bool,
    /// Whether a best-effort repair write was scheduled as a result.
    pub repair_scheduled: bool,
}

impl CompletionReport {
    /// A report for an I/O that completed with no errors at all.
    #[must_use]
    pub fn clean() -> Self {
        Self::default()
    }
}
