//! Error types shared across the dRAID geometry and I/O engine.

use std::fmt;

/// The error kinds a dRAID submission can fail with.
///
/// Each variant corresponds to one row of the error table in the
/// engine's design notes; callers match on these rather than on an
/// errno-style integer.
#[derive(Debug, thiserror::Error)]
pub enum DraidError {
    /// A geometry constraint was violated, an offset was misaligned, or
    /// `ndata`/`nparity` are inconsistent with `children`/`nspares`.
    #[error("invalid geometry: {detail}")]
    Einval {
        /// What was wrong, in plain language (field name, expected vs. actual).
        detail: String,
    },

    /// A permutation-map or stripe checksum did not match.
    #[error("checksum mismatch: {detail}")]
    Ecksum {
        /// Context: which checksum, expected vs. computed.
        detail: String,
    },

    /// Too many children are missing to reconstruct a stripe, or a
    /// distributed spare resolved to no physical child.
    #[error("no such device or address: {detail}")]
    Enxio {
        /// Context: group index, number of missing columns, parity budget.
        detail: String,
    },

    /// A child reported an I/O error and reconstruction was attempted
    /// but failed (or was not eligible).
    #[error("I/O error: {detail}")]
    Eio {
        /// Context: which child, which op, underlying cause if known.
        detail: String,
    },

    /// The requested operation is not supported in this context.
    #[error("operation not supported: {detail}")]
    Enotsup {
        /// Context: which op and why it is rejected.
        detail: String,
    },

    /// A permutation-map lookup found no table entry for the requested
    /// child count.
    #[error("no permutation-map entry for {children} children")]
    Enoent {
        /// The child count that had no table entry.
        children: u16,
    },
}

impl DraidError {
    /// Builds an [`Einval`](Self::Einval) with a formatted detail string.
    pub fn einval(detail: impl fmt::Display) -> Self {
        Self::Einval { detail: detail.to_string() }
    }

    /// Builds an [`Ecksum`](Self::Ecksum) with a formatted detail string.
    pub fn ecksum(detail: impl fmt::Display) -> Self {
        Self::Ecksum { detail: detail.to_string() }
    }

    /// Builds an [`Enxio`](Self::Enxio) with a formatted detail string.
    pub fn enxio(detail: impl fmt::Display) -> Self {
        Self::Enxio { detail: detail.to_string() }
    }

    /// Builds an [`Eio`](Self::Eio) with a formatted detail string.
    pub fn eio(detail: impl fmt::Display) -> Self {
        Self::Eio { detail: detail.to_string() }
    }

    /// Builds an [`Enotsup`](Self::Enotsup) with a formatted detail string.
    pub fn enotsup(detail: impl fmt::Display) -> Self {
        Self::Enotsup { detail: detail.to_string() }
    }

    /// True if this error kind represents a condition a caller might
    /// sensibly retry after repair (reconstruction-adjacent), as opposed
    /// to a configuration mistake.
    #[must_use]
    pub const fn is_recoverable_class(&self) -> bool {
        matches!(self, Self::Eio { .. } | Self::Enxio { .. })
    }
}

/// Convenience alias used throughout the engine crates.
pub type DraidResult<T> = Result<T, DraidError>;
