//! One-hot DNA batches
//!
//! Batches are `(rows, length, 4)` arrays with channels ordered A, C, G, T.
//! Ambiguous bases (`N`) encode as all-zero columns. Reversing both the
//! position axis and the channel axis yields the reverse complement, since
//! the channel order pairs A with T and C with G.

use crate::error::{EffectError, Result};
use ndarray::{s, Array3, Axis};

/// Nucleotide alphabet in channel order
pub const ALPHABET: [u8; 4] = [b'A', b'C', b'G', b'T'];

fn channel(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Encode equal-length DNA sequences as a one-hot batch
pub fn one_hot<S: AsRef<str>>(sequences: &[S]) -> Result<Array3<f32>> {
    let Some(first) = sequences.first() else {
        return Err(EffectError::invalid("cannot encode an empty set of sequences"));
    };
    let length = first.as_ref().len();

    let mut batch = Array3::<f32>::zeros((sequences.len(), length, ALPHABET.len()));
    for (row, seq) in sequences.iter().enumerate() {
        let seq = seq.as_ref().as_bytes();
        if seq.len() != length {
            return Err(EffectError::invalid(format!(
                "sequence {} has length {}, expected {}",
                row,
                seq.len(),
                length
            )));
        }
        for (pos, &base) in seq.iter().enumerate() {
            match channel(base) {
                Some(c) => batch[[row, pos, c]] = 1.0,
                None if base.eq_ignore_ascii_case(&b'N') => {}
                None => {
                    return Err(EffectError::invalid(format!(
                        "invalid base '{}' at sequence {}, position {}",
                        base as char, row, pos
                    )))
                }
            }
        }
    }

    Ok(batch)
}

/// Reverse complement of a one-hot batch
pub fn reverse_complement(batch: &Array3<f32>) -> Array3<f32> {
    batch.slice(s![.., ..;-1, ..;-1]).to_owned()
}

/// Copy of `batch` with `base` substituted at `position` in every row
///
/// `positions[row]` gives the mutated position of each row.
pub fn substitute(batch: &Array3<f32>, positions: &[usize], bases: &[u8]) -> Result<Array3<f32>> {
    let (rows, length, _) = batch.dim();
    if positions.len() != rows || bases.len() != rows {
        return Err(EffectError::invalid(format!(
            "need one position and base per row ({} rows), got {} positions and {} bases",
            rows,
            positions.len(),
            bases.len()
        )));
    }

    let mut mutated = batch.clone();
    for (row, mut column) in mutated.axis_iter_mut(Axis(0)).enumerate() {
        let pos = positions[row];
        if pos >= length {
            return Err(EffectError::invalid(format!(
                "position {} out of range for sequence length {}",
                pos, length
            )));
        }
        let c = channel(bases[row]).ok_or_else(|| {
            EffectError::invalid(format!("invalid base '{}'", bases[row] as char))
        })?;
        column.row_mut(pos).fill(0.0);
        column[[pos, c]] = 1.0;
    }

    Ok(mutated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_basic() {
        let batch = one_hot(&["ACGT"]).unwrap();
        assert_eq!(batch.dim(), (1, 4, 4));
        for pos in 0..4 {
            assert_eq!(batch[[0, pos, pos]], 1.0);
            assert_eq!(batch.slice(s![0, pos, ..]).sum(), 1.0);
        }
    }

    #[test]
    fn test_one_hot_n_is_zero() {
        let batch = one_hot(&["ANA"]).unwrap();
        assert_eq!(batch.slice(s![0, 1, ..]).sum(), 0.0);
    }

    #[test]
    fn test_one_hot_rejects_ragged() {
        assert!(one_hot(&["ACG", "AC"]).is_err());
    }

    #[test]
    fn test_one_hot_rejects_invalid_base() {
        assert!(one_hot(&["ACXT"]).is_err());
    }

    #[test]
    fn test_reverse_complement_matches_string() {
        let batch = one_hot(&["AACGTG"]).unwrap();
        let expected = one_hot(&["CACGTT"]).unwrap();
        assert_eq!(reverse_complement(&batch), expected);
    }

    #[test]
    fn test_reverse_complement_is_involution() {
        let batch = one_hot(&["GATTACA", "CCCNGGA"]).unwrap();
        assert_eq!(reverse_complement(&reverse_complement(&batch)), batch);
    }

    #[test]
    fn test_substitute() {
        let batch = one_hot(&["AAAA", "CCCC"]).unwrap();
        let mutated = substitute(&batch, &[1, 3], b"GT").unwrap();
        assert_eq!(mutated, one_hot(&["AGAA", "CCCT"]).unwrap());
        // Original untouched
        assert_eq!(batch, one_hot(&["AAAA", "CCCC"]).unwrap());
    }

    #[test]
    fn test_substitute_out_of_range() {
        let batch = one_hot(&["AAAA"]).unwrap();
        assert!(substitute(&batch, &[4], b"G").is_err());
    }
}
