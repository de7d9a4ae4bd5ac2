//! Optimizer abstractions for parameter updates
//!
//! Models expose their trainable tensors as a list of [`Param`] views (value and
//! gradient buffers side by side). An [`Optimizer`] walks that list once per step.
//! The list order is stable for a given model, so stateful optimizers keep their
//! moment estimates per slot.
//!
//! # Available Optimizers
//!
//! - SGD: Vanilla stochastic gradient descent
//! - Adam: Adaptive moment estimation with bias correction
//!
//! Both apply L2 weight decay by adding `weight_decay * value` to the gradient.
//!
//! # Example
//!
//! ```ignore
//! use causal_relation_networks::optimizers::{clip_grad_norm, Adam, Optimizer};
//!
//! let mut optimizer = Adam::new(1e-4, 0.9, 0.999, 1e-8, 3e-4);
//!
//! let mut params = model.parameters();
//! clip_grad_norm(&mut params, 0.35);
//! optimizer.step(&mut params);
//! ```

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

/// A named trainable tensor together with its gradient accumulator.
pub struct Param<'a> {
    pub name: String,
    pub value: &'a mut [f32],
    pub grad: &'a mut [f32],
}

impl<'a> Param<'a> {
    /// # Panics
    ///
    /// Panics if value and gradient lengths differ.
    pub fn new(name: String, value: &'a mut [f32], grad: &'a mut [f32]) -> Self {
        assert_eq!(
            value.len(),
            grad.len(),
            "Parameters and gradients must have the same length ({})",
            name
        );
        Self { name, value, grad }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Core trait for optimizers.
pub trait Optimizer {
    /// Apply one update to every tensor in `params` using its gradient.
    ///
    /// # Panics
    ///
    /// Stateful implementations panic if the parameter list changes shape between steps.
    fn step(&mut self, params: &mut [Param<'_>]);

    /// Clear momentum and step counters.
    fn reset(&mut self);

    /// Current base learning rate.
    fn learning_rate(&self) -> f32;

    /// Set the learning rate, typically from a scheduler before each step.
    fn set_learning_rate(&mut self, lr: f32);
}

/// Global L2 norm over all gradients.
pub fn grad_norm(params: &[Param<'_>]) -> f32 {
    params
        .iter()
        .flat_map(|p| p.grad.iter())
        .map(|&g| (g as f64) * (g as f64))
        .sum::<f64>()
        .sqrt() as f32
}

/// Rescale gradients so their global L2 norm does not exceed `max_norm`.
///
/// Gradients are untouched when `max_norm <= 0` (clipping disabled) or when the
/// norm is already within bound. Returns the pre-clip norm.
pub fn clip_grad_norm(params: &mut [Param<'_>], max_norm: f32) -> f32 {
    let norm = grad_norm(params);
    if max_norm <= 0.0 || norm <= max_norm {
        return norm;
    }
    let scale = max_norm / norm;
    for p in params.iter_mut() {
        for g in p.grad.iter_mut() {
            *g *= scale;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clip_rescales_to_max() {
        let mut v = vec![0.0f32; 2];
        let mut g = vec![3.0f32, 4.0];
        let mut params = vec![Param::new("p".into(), &mut v, &mut g)];

        let norm = clip_grad_norm(&mut params, 1.0);
        assert_relative_eq!(norm, 5.0, epsilon = 1e-6);
        assert_relative_eq!(grad_norm(&params), 1.0, epsilon = 1e-6);
        assert_relative_eq!(params[0].grad[0], 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_clip_disabled_when_non_positive() {
        let mut v = vec![0.0f32; 2];
        let mut g = vec![30.0f32, 40.0];
        let mut params = vec![Param::new("p".into(), &mut v, &mut g)];

        clip_grad_norm(&mut params, 0.0);
        clip_grad_norm(&mut params, -1.0);
        assert_eq!(params[0].grad.to_vec(), vec![30.0, 40.0]);
    }

    #[test]
    #[should_panic(expected = "Parameters and gradients must have the same length")]
    fn test_param_length_mismatch_panics() {
        let mut v = vec![0.0f32; 2];
        let mut g = vec![0.0f32; 3];
        Param::new("p".into(), &mut v, &mut g);
    }
}
