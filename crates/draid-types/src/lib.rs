//! Shared data model for the dRAID geometry and I/O engine.
//!
//! This crate holds the plain data types every other `draid-*` crate
//! passes across its boundaries: child/column indices, the per-I/O
//! stripe map, the submission request/response shape, and the
//! distributed-spare path identifier. It has no behavior tied to a
//! particular [`Config`](https://docs.rs/draid-core) instance and no
//! I/O — those live in `draid-core`.

mod io;
mod spare;
mod stripe;

pub use io::{CompletionReport, IoFlags, IoOp, SubmissionRequest};
pub use spare::DistributedSparePath;
pub use stripe::{BufferView, Column, StripeMap};

/// Index of one member device among a dRAID's `children`.
///
/// `0 <= value < children` is an invariant enforced by every producer
/// of this type, never by the type itself (a bare `u16` would allow
/// the same range; the newtype exists so child indices and, say, row
/// counts are never silently swapped at a call site).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChildIndex(pub u16);

impl ChildIndex {
    /// Returns the index as a `usize` for slice indexing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for ChildIndex {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `log2` of a child's minimum sector size, e.g. `12` for 4 KiB sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ashift(pub u8);

impl Ashift {
    /// The sector size in bytes this shift implies.
    #[must_use]
    pub const fn sector_size(self) -> u64 {
        1u64 << self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_index_as_usize_round_trips() {
        let c = ChildIndex(7);
        assert_eq!(c.as_usize(), 7usize);
    }

    #[test]
    fn ashift_sector_size_is_power_of_two() {
        assert_eq!(Ashift(12).sector_size(), 4096);
        assert_eq!(Ashift(9).sector_size(), 512);
    }

    #[test]
    fn child_index_displays_as_plain_number() {
        assert_eq!(ChildIndex(42).to_string(), "42");
    }
}
