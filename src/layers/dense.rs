//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected layer)
//! that performs the transformation: output = input × weights + biases

use crate::layers::Layer;
use crate::optimizers::Param;
use crate::utils::ops::sgemm;
use crate::utils::SeededRng;

/// Dense (fully connected) layer with weights and biases.
///
/// Performs the linear transformation: y = xW + b
/// where x is the input (batch_size × input_size),
/// W is the weight matrix (input_size × output_size),
/// and b is the bias vector (output_size).
///
/// # Example
///
/// ```
/// use causal_relation_networks::layers::{DenseLayer, Layer};
/// use causal_relation_networks::utils::SeededRng;
///
/// let mut rng = SeededRng::new(42);
/// let layer = DenseLayer::new(300, 64, &mut rng);
/// assert_eq!(layer.input_size(), 300);
/// assert_eq!(layer.output_size(), 64);
/// ```
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
    grad_weights: Vec<f32>,
    grad_biases: Vec<f32>,
}

impl DenseLayer {
    /// Create a new DenseLayer with Xavier initialization.
    ///
    /// Weights are sampled from U[-limit, limit] with
    /// limit = sqrt(6 / (input_size + output_size)). Biases start at zero.
    pub fn new(input_size: usize, output_size: usize, rng: &mut SeededRng) -> Self {
        let mut weights = vec![0.0f32; input_size * output_size];
        let limit = (6.0f32 / (input_size + output_size) as f32).sqrt();

        for value in &mut weights {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Self::from_weights(input_size, output_size, weights, vec![0.0f32; output_size])
    }

    /// Create a layer from explicit weights (input_size × output_size, row-major) and biases.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lengths don't match the declared sizes.
    pub fn from_weights(
        input_size: usize,
        output_size: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Self {
        assert_eq!(weights.len(), input_size * output_size, "weights length mismatch");
        assert_eq!(biases.len(), output_size, "biases length mismatch");
        Self {
            input_size,
            output_size,
            grad_weights: vec![0.0f32; weights.len()],
            grad_biases: vec![0.0f32; output_size],
            weights,
            biases,
        }
    }

    /// Identity map of the given width with zero bias.
    pub fn identity(size: usize) -> Self {
        let mut weights = vec![0.0f32; size * size];
        for i in 0..size {
            weights[i * size + i] = 1.0;
        }
        Self::from_weights(size, size, weights, vec![0.0f32; size])
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    pub fn grad_weights(&self) -> &[f32] {
        &self.grad_weights
    }

    pub fn grad_biases(&self) -> &[f32] {
        &self.grad_biases
    }
}

impl Layer for DenseLayer {
    fn forward(&mut self, input: &[f32], output: &mut [f32], batch_size: usize) {
        assert_eq!(
            input.len(),
            batch_size * self.input_size,
            "input len mismatch: expected {}, got {}",
            batch_size * self.input_size,
            input.len()
        );
        assert_eq!(
            output.len(),
            batch_size * self.output_size,
            "output len mismatch: expected {}, got {}",
            batch_size * self.output_size,
            output.len()
        );

        sgemm(
            false,
            false,
            batch_size,
            self.output_size,
            self.input_size,
            1.0,
            input,
            &self.weights,
            0.0,
            output,
        );
        for row in output.chunks_exact_mut(self.output_size) {
            for (value, bias) in row.iter_mut().zip(&self.biases) {
                *value += bias;
            }
        }
    }

    fn backward(
        &mut self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: Option<&mut [f32]>,
        batch_size: usize,
    ) {
        assert_eq!(
            grad_output.len(),
            batch_size * self.output_size,
            "grad_output len mismatch"
        );

        // dW += X^T · dY
        sgemm(
            true,
            false,
            self.input_size,
            self.output_size,
            batch_size,
            1.0,
            input,
            grad_output,
            1.0,
            &mut self.grad_weights,
        );
        for row in grad_output.chunks_exact(self.output_size) {
            for (g, d) in self.grad_biases.iter_mut().zip(row) {
                *g += d;
            }
        }

        // dX = dY · W^T
        if let Some(grad_input) = grad_input {
            assert_eq!(
                grad_input.len(),
                batch_size * self.input_size,
                "grad_input len mismatch"
            );
            sgemm(
                false,
                true,
                batch_size,
                self.input_size,
                self.output_size,
                1.0,
                grad_output,
                &self.weights,
                0.0,
                grad_input,
            );
        }
    }

    fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>> {
        vec![
            Param::new(
                format!("{prefix}.weight"),
                &mut self.weights,
                &mut self.grad_weights,
            ),
            Param::new(
                format!("{prefix}.bias"),
                &mut self.biases,
                &mut self.grad_biases,
            ),
        ]
    }

    fn zero_grad(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
