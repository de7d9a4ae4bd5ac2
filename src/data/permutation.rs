//! Index permutations over read-only sample storage
//!
//! [`LengthOrder`] replaces sorting a batch by length in place: it records the
//! descending-length order and its inverse, so length-ordered work can be undone
//! before anything is compared against labels. [`epoch_permutation`] replaces an
//! in-place shuffle of the training set with a fresh permutation per epoch.

use crate::utils::SeededRng;

/// Descending-length processing order for a batch and its inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthOrder {
    /// `order[i]` is the original row processed at position `i`.
    order: Vec<usize>,
    /// `inverse[row]` is the position at which original `row` was processed.
    inverse: Vec<usize>,
}

impl LengthOrder {
    /// Sort rows by length, longest first. Ties keep their original order.
    pub fn descending(lengths: &[usize]) -> Self {
        let mut order: Vec<usize> = (0..lengths.len()).collect();
        order.sort_by(|&a, &b| lengths[b].cmp(&lengths[a]));
        let mut inverse = vec![0; order.len()];
        for (pos, &row) in order.iter().enumerate() {
            inverse[row] = pos;
        }
        Self { order, inverse }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn inverse(&self) -> &[usize] {
        &self.inverse
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reorder `row_len`-wide rows from original order into processing order.
    pub fn apply(&self, rows: &[f32], row_len: usize) -> Vec<f32> {
        assert_eq!(rows.len(), self.len() * row_len, "rows length mismatch in apply");
        let mut out = Vec::with_capacity(rows.len());
        for &row in &self.order {
            out.extend_from_slice(&rows[row * row_len..(row + 1) * row_len]);
        }
        out
    }

    /// Reorder rows from processing order back to original order.
    pub fn restore(&self, rows: &[f32], row_len: usize) -> Vec<f32> {
        assert_eq!(rows.len(), self.len() * row_len, "rows length mismatch in restore");
        let mut out = Vec::with_capacity(rows.len());
        for &pos in &self.inverse {
            out.extend_from_slice(&rows[pos * row_len..(pos + 1) * row_len]);
        }
        out
    }
}

/// Fresh shuffled visiting order of `0..n` for one epoch of one trial.
///
/// Each (trial, epoch) pair reads its own ChaCha stream of `seed`, so the order
/// does not depend on any earlier epoch and the dataset itself is never reordered.
pub fn epoch_permutation(n: usize, seed: u64, trial: usize, epoch: usize) -> Vec<usize> {
    let stream = ((trial as u64) << 32) | (epoch as u64 & 0xffff_ffff);
    let mut rng = SeededRng::with_stream(seed, stream);
    let mut indices: Vec<usize> = (0..n).collect();
    rng.shuffle_usize(&mut indices);
    indices
}
