//! Sealed `GF(2^8)` parity generation and reconstruction engine (spec
//! §4.5).
//!
//! Column layout follows the stripe convention used throughout the
//! engine: columns `[0, nparity)` are parity (`P`, and for `nparity >=
//! 2`, `Q`, and for `nparity == 3`, `R`), columns `[nparity,
//! nparity+ndata)` are data. `P` is plain XOR; `Q` and `R` are
//! Reed-Solomon-style syndromes using the field's primitive element
//! `2` raised to the data column's index (and to twice that index for
//! `R`) as coefficients — the same construction RAID-Z-style triple
//! parity uses.

mod gf256;
mod matrix;

use draid_error::{DraidError, DraidResult};
use gf256::Gf256Tables;
use matrix::GfMatrix;

/// Stateless (beyond its cached lookup tables) parity codec.
pub struct ParityEngine {
    gf: Gf256Tables,
}

impl ParityEngine {
    /// Builds a codec, computing its `GF(2^8)` tables once.
    #[must_use]
    pub fn new() -> Self {
        Self { gf: Gf256Tables::new() }
    }

    fn row_coeff(&self, row: usize, data_idx: usize) -> u8 {
        match row {
            0 => 1,
            1 => self.gf.pow(2, data_idx as u32),
            2 => self.gf.pow(4, data_idx as u32),
            _ => unreachable!("nparity is capped at 3 by Config::configure"),
        }
    }

    /// Fills `parity` (length `nparity`) from `data` (length `ndata`).
    ///
    /// All slices (data and parity) must share one common length; that
    /// is the stripe's per-column size after `StripeBuilder` has padded
    /// every column to equal length with skip sectors.
    ///
    /// # Errors
    /// Returns [`DraidError::Einval`] if `nparity` is outside `1..=3`,
    /// `ndata` is zero, or the column slices are not all the same length.
    pub fn generate(&self, ndata: usize, nparity: usize, data: &[&[u8]], parity: &mut [&mut [u8]]) -> DraidResult<()> {
        if !(1..=3).contains(&nparity) {
            return Err(DraidError::einval(format!("nparity {nparity} out of range 1..=3")));
        }
        if ndata == 0 {
            return Err(DraidError::einval("ndata must be at least 1"));
        }
        if data.len() != ndata || parity.len() != nparity {
            return Err(DraidError::einval("column count does not match ndata/nparity"));
        }
        let len = common_length(data.iter().map(|s| &**s).chain(parity.iter().map(|s| &**s)))?;

        for row in parity.iter_mut() {
            row.fill(0);
        }
        for (i, col) in data.iter().enumerate() {
            for row in 0..nparity {
                let c = self.row_coeff(row, i);
                for pos in 0..len {
                    parity[row][pos] ^= self.gf.mul(c, col[pos]);
                }
            }
        }
        Ok(())
    }

    /// Reconstructs up to `nparity` missing columns of a stripe.
    ///
    /// `columns` holds all `nparity + ndata` column buffers in stripe
    /// order (parity first); entries named in `missing` may contain
    /// stale bytes on entry and are fully overwritten on success.
    /// `missing` may be empty, in which case this is a no-op (the
    /// "reconstruct of the empty set is the identity" property).
    ///
    /// # Errors
    /// Returns [`DraidError::Einval`] for malformed shapes, and
    /// [`DraidError::Enxio`] when `missing.len() > nparity` or an
    /// internal invariant about the reconstruction matrix's
    /// invertibility is violated (which would indicate a coefficient
    /// bug, not a caller error, for the fixed `p <= 3` matrices this
    /// engine uses).
    pub fn reconstruct(
        &self,
        ndata: usize,
        nparity: usize,
        columns: &mut [&mut [u8]],
        missing: &[usize],
    ) -> DraidResult<()> {
        if !(1..=3).contains(&nparity) {
            return Err(DraidError::einval(format!("nparity {nparity} out of range 1..=3")));
        }
        if ndata == 0 {
            return Err(DraidError::einval("ndata must be at least 1"));
        }
        let total = ndata + nparity;
        if columns.len() != total {
            return Err(DraidError::einval("column count does not match ndata+nparity"));
        }
        if missing.len() > nparity {
            return Err(DraidError::enxio(format!(
                "{} missing columns exceeds nparity {nparity}",
                missing.len()
            )));
        }
        let mut seen = vec![false; total];
        for &m in missing {
            if m >= total || std::mem::replace(&mut seen[m], true) {
                return Err(DraidError::einval("missing column index out of range or duplicated"));
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let len = common_length(columns.iter().map(|s| &**s))?;

        let missing_parity: Vec<usize> = missing.iter().copied().filter(|&m| m < nparity).collect();
        let missing_data: Vec<usize> = missing.iter().copied().filter(|&m| m >= nparity).map(|m| m - nparity).collect();

        if !missing_data.is_empty() {
            let k = missing_data.len();
            let available_rows: Vec<usize> = (0..nparity).filter(|r| !missing_parity.contains(r)).collect();
            debug_assert!(available_rows.len() >= k, "insufficient parity rows to recover missing data");
            let selected_rows = &available_rows[..k];

            let mut mat_data = vec![0u8; k * k];
            for (ri, &row) in selected_rows.iter().enumerate() {
                for (ci, &di) in missing_data.iter().enumerate() {
                    mat_data[ri * k + ci] = self.row_coeff(row, di);
                }
            }
            let matrix = GfMatrix::from_rows(k, mat_data);
            let inv = matrix
                .invert(&self.gf)
                .ok_or_else(|| DraidError::enxio("reconstruction matrix is singular"))?;

            let known_data: Vec<usize> = (0..ndata).filter(|i| !missing_data.contains(i)).collect();

            for pos in 0..len {
                let mut rhs = vec![0u8; k];
                for (ri, &row) in selected_rows.iter().enumerate() {
                    let mut val = columns[row][pos];
                    for &j in &known_data {
                        let c = self.row_coeff(row, j);
                        if c != 0 {
                            val ^= self.gf.mul(c, columns[nparity + j][pos]);
                        }
                    }
                    rhs[ri] = val;
                }
                for (ci, &di) in missing_data.iter().enumerate() {
                    let mut val = 0u8;
                    for ri in 0..k {
                        let c = inv.entry(ci, ri);
                        if c != 0 {
                            val ^= self.gf.mul(c, rhs[ri]);
                        }
                    }
                    columns[nparity + di][pos] = val;
                }
            }
        }

        if !missing_parity.is_empty() {
            for pos in 0..len {
                for &row in &missing_parity {
                    let mut val = 0u8;
                    for i in 0..ndata {
                        let c = self.row_coeff(row, i);
                        if c != 0 {
                            val ^= self.gf.mul(c, columns[nparity + i][pos]);
                        }
                    }
                    columns[row][pos] = val;
                }
            }
        }

        Ok(())
    }
}

impl Default for ParityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn common_length<'a>(mut slices: impl Iterator<Item = &'a [u8]>) -> DraidResult<usize> {
    let first = slices.next().map_or(0, <[u8]>::len);
    for s in slices {
        if s.len() != first {
            return Err(DraidError::einval("stripe columns are not all the same length"));
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_columns(n: usize, len: usize, fill: impl Fn(usize) -> u8) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![fill(i); len]).collect()
    }

    #[test]
    fn single_parity_is_xor() {
        let engine = ParityEngine::new();
        let d0 = vec![0b1010_1010u8; 4];
        let d1 = vec![0b0110_0110u8; 4];
        let mut p0 = vec![0u8; 4];
        engine.generate(2, 1, &[&d0, &d1], &mut [&mut p0]).unwrap();
        for i in 0..4 {
            assert_eq!(p0[i], d0[i] ^ d1[i]);
        }
    }

    #[test]
    fn reconstruct_empty_missing_set_is_identity() {
        let engine = ParityEngine::new();
        let data = owned_columns(3, 8, |i| i as u8 + 1);
        let mut parity = owned_columns(1, 8, |_| 0);
        {
            let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
            let mut pref: Vec<&mut [u8]> = parity.iter_mut().map(Vec::as_mut_slice).collect();
            engine.generate(3, 1, &refs, &mut pref).unwrap();
        }
        let before = parity.clone();
        let mut all: Vec<Vec<u8>> = parity.into_iter().chain(data).collect();
        let mut refs: Vec<&mut [u8]> = all.iter_mut().map(Vec::as_mut_slice).collect();
        engine.reconstruct(3, 1, &mut refs, &[]).unwrap();
        assert_eq!(refs[0], before[0].as_slice());
    }

    #[test]
    fn single_parity_reconstructs_one_missing_data_column() {
        let engine = ParityEngine::new();
        let d0 = vec![11u8, 22, 33, 44];
        let d1 = vec![55u8, 66, 77, 88];
        let mut p0 = vec![0u8; 4];
        engine.generate(2, 1, &[&d0, &d1], &mut [&mut p0]).unwrap();

        let mut stripe = vec![p0.clone(), d0.clone(), vec![0u8; 4]];
        let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
        engine.reconstruct(2, 1, &mut refs, &[2]).unwrap();
        assert_eq!(refs[2], d1.as_slice());
    }

    #[test]
    fn double_parity_reconstructs_two_missing_data_columns() {
        let engine = ParityEngine::new();
        let d0 = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let d1 = vec![200u8, 150, 90, 45, 12, 250, 3, 77];
        let d2 = vec![9u8, 8, 7, 6, 5, 4, 3, 2];
        let mut p = vec![0u8; 8];
        let mut q = vec![0u8; 8];
        engine.generate(3, 2, &[&d0, &d1, &d2], &mut [&mut p, &mut q]).unwrap();

        let mut stripe = vec![p.clone(), q.clone(), d0.clone(), vec![0u8; 8], vec![0u8; 8]];
        let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
        engine.reconstruct(3, 2, &mut refs, &[3, 4]).unwrap();
        assert_eq!(refs[3], d1.as_slice());
        assert_eq!(refs[4], d2.as_slice());
    }

    #[test]
    fn triple_parity_reconstructs_three_missing_data_columns() {
        let engine = ParityEngine::new();
        let cols = owned_columns(5, 6, |i| (i as u8).wrapping_mul(37).wrapping_add(5));
        let mut p = vec![0u8; 6];
        let mut q = vec![0u8; 6];
        let mut r = vec![0u8; 6];
        let refs: Vec<&[u8]> = cols.iter().map(Vec::as_slice).collect();
        engine.generate(5, 3, &refs, &mut [&mut p, &mut q, &mut r]).unwrap();

        let mut stripe: Vec<Vec<u8>> = vec![p.clone(), q.clone(), r.clone()];
        stripe.push(cols[0].clone());
        stripe.push(vec![0u8; 6]);
        stripe.push(vec![0u8; 6]);
        stripe.push(vec![0u8; 6]);
        let mut mref: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
        engine.reconstruct(5, 3, &mut mref, &[4, 5, 6]).unwrap();
        assert_eq!(mref[4], cols[1].as_slice());
        assert_eq!(mref[5], cols[2].as_slice());
        assert_eq!(mref[6], cols[3].as_slice());
    }

    #[test]
    fn missing_parity_only_is_recomputed_from_data() {
        let engine = ParityEngine::new();
        let d0 = vec![3u8; 4];
        let d1 = vec![5u8; 4];
        let mut p = vec![0u8; 4];
        let mut q = vec![0u8; 4];
        engine.generate(2, 2, &[&d0, &d1], &mut [&mut p, &mut q]).unwrap();

        let mut stripe = vec![vec![0u8; 4], q.clone(), d0.clone(), d1.clone()];
        let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
        engine.reconstruct(2, 2, &mut refs, &[0]).unwrap();
        assert_eq!(refs[0], p.as_slice());
    }

    #[test]
    fn too_many_missing_columns_is_enxio() {
        let engine = ParityEngine::new();
        let mut stripe = vec![vec![0u8; 4]; 4];
        let mut refs: Vec<&mut [u8]> = stripe.iter_mut().map(Vec::as_mut_slice).collect();
        let err = engine.reconstruct(3, 1, &mut refs, &[0, 1]).unwrap_err();
        assert!(matches!(err, DraidError::Enxio { .. }));
    }

    #[test]
    fn mismatched_column_lengths_is_einval() {
        let engine = ParityEngine::new();
        let d0 = vec![0u8; 4];
        let d1 = vec![0u8; 5];
        let mut p0 = vec![0u8; 4];
        let err = engine.generate(2, 1, &[&d0, &d1], &mut [&mut p0]).unwrap_err();
        assert!(matches!(err, DraidError::Einval { .. }));
    }
}
