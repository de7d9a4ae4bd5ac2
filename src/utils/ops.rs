//! Matrix multiply helper over flat row-major buffers.

use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

/// Single-precision GEMM: `C = alpha * op(A) * op(B) + beta * C`.
///
/// `op(A)` is `m x k`, `op(B)` is `k x n`, `C` is `m x n`. When `trans_a` is set,
/// `a` is stored as `k x m` and used transposed (same for `b`).
///
/// # Panics
///
/// Panics if a buffer length does not match its declared shape.
#[allow(clippy::too_many_arguments)]
pub fn sgemm(
    trans_a: bool,
    trans_b: bool,
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    b: &[f32],
    beta: f32,
    c: &mut [f32],
) {
    assert_eq!(a.len(), m * k, "sgemm: A length mismatch");
    assert_eq!(b.len(), k * n, "sgemm: B length mismatch");
    assert_eq!(c.len(), m * n, "sgemm: C length mismatch");
    if m == 0 || n == 0 {
        return;
    }

    let a_shape = if trans_a { (k, m) } else { (m, k) };
    let b_shape = if trans_b { (n, k) } else { (k, n) };
    let a_view = ArrayView2::from_shape(a_shape, a).expect("shape checked above");
    let b_view = ArrayView2::from_shape(b_shape, b).expect("shape checked above");
    let a_op = if trans_a { a_view.t() } else { a_view };
    let b_op = if trans_b { b_view.t() } else { b_view };
    let mut c_view = ArrayViewMut2::from_shape((m, n), c).expect("shape checked above");

    general_mat_mul(alpha, &a_op, &b_op, beta, &mut c_view);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgemm_plain() {
        // [1 2; 3 4] x [5 6; 7 8] = [19 22; 43 50]
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [0.0; 4];
        sgemm(false, false, 2, 2, 2, 1.0, &a, &b, 0.0, &mut c);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_sgemm_transposed_accumulate() {
        // A^T with A = [1 2 3] (1x3) -> 3x1, B = [1 1] (1x2)
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 1.0];
        let mut c = [1.0; 6];
        sgemm(true, false, 3, 2, 1, 1.0, &a, &b, 1.0, &mut c);
        assert_eq!(c, [2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_sgemm_b_transposed() {
        // x (1x2) times W^T where W is 3x2
        let x = [1.0, 2.0];
        let w = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut c = [0.0; 3];
        sgemm(false, true, 1, 3, 2, 1.0, &x, &w, 0.0, &mut c);
        assert_eq!(c, [1.0, 2.0, 3.0]);
    }
}
