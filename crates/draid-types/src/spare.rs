//! Distributed-spare path identifier: `draid<nparity>-<vdev_id>-<spare_id>`
//! (spec §6, "bit-exact").

use std::fmt;
use std::str::FromStr;

/// A parsed distributed-spare virtual-device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedSparePath {
    /// Parity count of the parent dRAID, embedded in the path for
    /// sanity-checking at open time.
    pub nparity: u8,
    /// Top-level vdev index of the parent dRAID.
    pub vdev_id: u64,
    /// Which of the `[0, nspares)` spare slots this path names.
    pub spare_id: u16,
}

impl fmt::Display for DistributedSparePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draid{}-{}-{}", self.nparity, self.vdev_id, self.spare_id)
    }
}

/// Failure to parse a distributed-spare path string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSparePathError {
    /// The string did not start with `draid`.
    MissingPrefix,
    /// Expected exactly three hyphen-separated fields after the prefix.
    WrongFieldCount,
    /// One of the three numeric fields failed to parse, or carried a
    /// leading zero (rejected: the format requires none).
    BadField(&'static str),
}

impl fmt::Display for ParseSparePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrefix => write!(f, "spare path does not start with 'draid'"),
            Self::WrongFieldCount => write!(f, "spare path must have exactly 3 fields"),
            Self::BadField(which) => write!(f, "spare path field '{which}' is not a valid decimal integer"),
        }
    }
}

impl std::error::Error for ParseSparePathError {}

fn parse_decimal_no_leading_zero<T: FromStr>(s: &str, field: &'static str) -> Result<T, ParseSparePathError> {
    if s.len() > 1 && s.starts_with('0') {
        return Err(ParseSparePathError::BadField(field));
    }
    s.parse::<T>().map_err(|_| ParseSparePathError::BadField(field))
}

impl FromStr for DistributedSparePath {
    type Err = ParseSparePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("draid").ok_or(ParseSparePathError::MissingPrefix)?;
        let mut fields = rest.split('-');
        let nparity_str = fields.next().ok_or(ParseSparePathError::WrongFieldCount)?;
        let vdev_id_str = fields.next().ok_or(ParseSparePathError::WrongFieldCount)?;
        let spare_id_str = fields.next().ok_or(ParseSparePathError::WrongFieldCount)?;
        if fields.next().is_some() {
            return Err(ParseSparePathError::WrongFieldCount);
        }
        Ok(Self {
            nparity: parse_decimal_no_leading_zero(nparity_str, "nparity")?,
            vdev_id: parse_decimal_no_leading_zero(vdev_id_str, "vdev_id")?,
            spare_id: parse_decimal_no_leading_zero(spare_id_str, "spare_id")?,
        })
    }
}
