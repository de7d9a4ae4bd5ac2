//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types implement.
//! The trait provides a common interface for forward propagation, backward propagation
//! and exposing trainable tensors to the optimizer.

use crate::optimizers::Param;

/// Core trait for neural network layers.
///
/// Layers own their parameters, gradient accumulators and whatever forward-pass
/// cache the backward pass needs, so both passes take `&mut self`.
///
/// # Example
///
/// ```ignore
/// // Forward pass through a layer
/// let mut output = vec![0.0f32; batch_size * layer.output_size()];
/// layer.forward(&input, &mut output, batch_size);
///
/// // Backward pass: accumulates parameter gradients, optionally fills grad_input
/// let mut grad_input = vec![0.0f32; batch_size * layer.input_size()];
/// layer.backward(&input, &grad_output, Some(&mut grad_input), batch_size);
///
/// // Hand tensors to the optimizer
/// optimizer.step(&mut layer.parameters("fc"));
/// ```
pub trait Layer {
    /// Forward propagation through the layer.
    ///
    /// # Arguments
    ///
    /// * `input` - Input data flattened as a 1D array (batch_size × input_size)
    /// * `output` - Output buffer to store results (batch_size × output_size)
    /// * `batch_size` - Number of samples in the batch
    ///
    /// # Panics
    ///
    /// Implementations may panic if input/output dimensions don't match expected sizes.
    fn forward(&mut self, input: &[f32], output: &mut [f32], batch_size: usize);

    /// Backward propagation through the layer.
    ///
    /// Accumulates gradients for weights and biases internally and, when `grad_input`
    /// is given, overwrites it with the gradient with respect to the layer input.
    /// Pass `None` when the input is frozen (e.g. embeddings) to skip that product.
    ///
    /// # Arguments
    ///
    /// * `input` - Input data from the matching forward pass (batch_size × input_size)
    /// * `grad_output` - Gradient of loss w.r.t. layer output (batch_size × output_size)
    /// * `grad_input` - Optional buffer for the gradient w.r.t. input (batch_size × input_size)
    /// * `batch_size` - Number of samples in the batch
    fn backward(
        &mut self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: Option<&mut [f32]>,
        batch_size: usize,
    );

    /// Trainable tensors paired with their gradient buffers, named `{prefix}.{tensor}`.
    ///
    /// Parameter-free layers return an empty vector.
    fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>>;

    /// Clear accumulated parameter gradients.
    fn zero_grad(&mut self);

    /// Switch between training and inference behaviour. No-op for most layers.
    fn set_training(&mut self, _training: bool) {}

    /// Expected number of input features per sample.
    fn input_size(&self) -> usize;

    /// Number of output features per sample.
    fn output_size(&self) -> usize;

    /// Total count of trainable scalars.
    fn parameter_count(&self) -> usize;
}
