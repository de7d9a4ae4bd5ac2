//! Activation functions and their backward passes
//!
//! - ReLU (in-place forward, mask-based backward)
//! - Tanh (in-place forward, output-based backward)
//! - Softmax (row-wise, and over a valid prefix for attention pooling)

/// ReLU activation function applied in-place.
///
/// Sets all negative values to 0.0, keeps positive values unchanged.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// ReLU backward given the activation output: zeroes gradient where output <= 0.
pub fn relu_backward_inplace(output: &[f32], grad: &mut [f32]) {
    assert_eq!(output.len(), grad.len(), "relu_backward length mismatch");
    for (g, &y) in grad.iter_mut().zip(output) {
        if y <= 0.0 {
            *g = 0.0;
        }
    }
}

/// Tanh applied in-place.
pub fn tanh_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        *value = value.tanh();
    }
}

/// Tanh backward given the activation output: `grad *= 1 - y^2`.
pub fn tanh_backward_inplace(output: &[f32], grad: &mut [f32]) {
    assert_eq!(output.len(), grad.len(), "tanh_backward length mismatch");
    for (g, &y) in grad.iter_mut().zip(output) {
        *g *= 1.0 - y * y;
    }
}

/// Softmax activation applied row-wise.
///
/// Converts logits to probabilities for each row. Uses the max-subtraction
/// trick for numerical stability to avoid overflow with large values.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        softmax_inplace(row);
    }
}

/// Softmax over a single slice.
pub fn softmax_inplace(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }
    let max_value = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for value in row.iter_mut() {
        *value = (*value - max_value).exp();
        sum += *value;
    }

    let inv_sum = 1.0f32 / sum;
    for value in row.iter_mut() {
        *value *= inv_sum;
    }
}
