//! Dropout layer implementation for regularization
//!
//! Randomly zeroes a fraction of units during training and rescales the rest by
//! 1/(1-drop_rate). In inference mode inputs pass through unchanged. Used for the
//! embedding dropout on each segment and for the layer dropout inside the relation
//! transforms and the classifier head.

use crate::layers::Layer;
use crate::optimizers::Param;
use crate::utils::SeededRng;

/// Dropout layer for regularization.
///
/// The size is fixed per sample; the batch dimension may vary between calls.
///
/// # Example
///
/// ```
/// use causal_relation_networks::layers::{DropoutLayer, Layer};
/// use causal_relation_networks::utils::SeededRng;
///
/// let mut rng = SeededRng::new(42);
/// let mut layer = DropoutLayer::new(512, 0.5, &mut rng);
/// layer.set_training(false);
/// assert!(!layer.is_training());
/// assert_eq!(layer.parameter_count(), 0);
/// ```
pub struct DropoutLayer {
    size: usize,
    drop_rate: f32,
    training: bool,
    /// Per-unit multiplier from the last training forward pass: 0 or 1/(1-drop_rate).
    mask: Vec<f32>,
    rng: SeededRng,
}

impl DropoutLayer {
    /// Creates a new dropout layer in training mode.
    ///
    /// The layer forks its own generator from `rng`, so masks are reproducible
    /// for a fixed seed.
    ///
    /// # Panics
    ///
    /// Panics if `drop_rate` is outside `[0.0, 1.0)`.
    pub fn new(size: usize, drop_rate: f32, rng: &mut SeededRng) -> Self {
        assert!(
            (0.0..1.0).contains(&drop_rate),
            "drop_rate must be in range [0.0, 1.0)"
        );

        Self {
            size,
            drop_rate,
            training: true,
            mask: Vec::new(),
            rng: rng.fork(),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Apply dropout in place. Equivalent to `forward` with aliased buffers.
    pub fn apply_inplace(&mut self, data: &mut [f32], batch_size: usize) {
        let total_size = batch_size * self.size;
        assert_eq!(
            data.len(),
            total_size,
            "input len mismatch: expected {}, got {}",
            total_size,
            data.len()
        );
        if !self.training || self.drop_rate == 0.0 {
            self.mask.clear();
            return;
        }

        let scale = 1.0 / (1.0 - self.drop_rate);
        self.mask.resize(total_size, 0.0);
        for (value, m) in data.iter_mut().zip(self.mask.iter_mut()) {
            if self.rng.next_f32() >= self.drop_rate {
                *m = scale;
                *value *= scale;
            } else {
                *m = 0.0;
                *value = 0.0;
            }
        }
    }

    /// Backward in place: multiplies the gradient by the saved mask.
    pub fn backward_inplace(&self, grad: &mut [f32]) {
        if self.mask.is_empty() {
            return;
        }
        assert_eq!(grad.len(), self.mask.len(), "grad len mismatch in dropout backward");
        for (g, m) in grad.iter_mut().zip(&self.mask) {
            *g *= m;
        }
    }
}

impl Layer for DropoutLayer {
    fn forward(&mut self, input: &[f32], output: &mut [f32], batch_size: usize) {
        assert_eq!(
            output.len(),
            input.len(),
            "output len mismatch: expected {}, got {}",
            input.len(),
            output.len()
        );
        output.copy_from_slice(input);
        self.apply_inplace(output, batch_size);
    }

    fn backward(
        &mut self,
        _input: &[f32],
        grad_output: &[f32],
        grad_input: Option<&mut [f32]>,
        batch_size: usize,
    ) {
        let Some(grad_input) = grad_input else {
            return;
        };
        assert_eq!(
            grad_input.len(),
            batch_size * self.size,
            "grad_input len mismatch"
        );
        grad_input.copy_from_slice(grad_output);
        self.backward_inplace(grad_input);
    }

    fn parameters(&mut self, _prefix: &str) -> Vec<Param<'_>> {
        Vec::new()
    }

    fn zero_grad(&mut self) {}

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn parameter_count(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "drop_rate must be in range [0.0, 1.0)")]
    fn test_rejects_rate_one() {
        let mut rng = SeededRng::new(42);
        DropoutLayer::new(4, 1.0, &mut rng);
    }

    #[test]
    fn test_inference_passes_through() {
        let mut rng = SeededRng::new(42);
        let mut layer = DropoutLayer::new(4, 0.5, &mut rng);
        layer.set_training(false);

        let input = vec![1.0, 2.0, 3.0, 4.0];
        let mut output = vec![0.0; 4];
        layer.forward(&input, &mut output, 1);
        assert_eq!(output, input);
    }

    #[test]
    fn test_zero_rate_keeps_everything_in_training() {
        let mut rng = SeededRng::new(42);
        let mut layer = DropoutLayer::new(8, 0.0, &mut rng);
        let mut data = vec![1.5f32; 16];
        layer.apply_inplace(&mut data, 2);
        assert!(data.iter().all(|&v| v == 1.5));
    }

    #[test]
    fn test_training_scales_kept_units() {
        let mut rng = SeededRng::new(7);
        let mut layer = DropoutLayer::new(1000, 0.5, &mut rng);
        let input = vec![1.0f32; 1000];
        let mut output = vec![0.0f32; 1000];
        layer.forward(&input, &mut output, 1);

        let kept = output.iter().filter(|&&v| v != 0.0).count();
        assert!(output.iter().all(|&v| v == 0.0 || v == 2.0));
        assert!(kept > 400 && kept < 600, "kept {}", kept);
    }

    #[test]
    fn test_backward_uses_forward_mask() {
        let mut rng = SeededRng::new(11);
        let mut layer = DropoutLayer::new(32, 0.3, &mut rng);
        let input = vec![1.0f32; 32];
        let mut output = vec![0.0f32; 32];
        layer.forward(&input, &mut output, 1);

        let grad_out = vec![1.0f32; 32];
        let mut grad_in = vec![0.0f32; 32];
        layer.backward(&input, &grad_out, Some(&mut grad_in), 1);
        assert_eq!(grad_in, output);
    }
}
