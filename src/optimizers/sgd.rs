//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! Performs `parameter -= learning_rate * (gradient + weight_decay * parameter)`.

use crate::optimizers::{Optimizer, Param};

/// Stochastic Gradient Descent optimizer.
///
/// ```
/// use causal_relation_networks::optimizers::{Optimizer, Param, SGD};
///
/// let mut optimizer = SGD::new(0.1, 0.0);
/// let mut w = vec![1.0f32, 2.0, 3.0];
/// let mut g = vec![0.1f32, 0.2, 0.3];
/// optimizer.step(&mut [Param::new("w".into(), &mut w, &mut g)]);
/// assert!((w[0] - 0.99).abs() < 1e-6);
/// assert!((w[2] - 2.97).abs() < 1e-6);
/// ```
pub struct SGD {
    learning_rate: f32,
    weight_decay: f32,
}

impl SGD {
    pub fn new(learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Param<'_>]) {
        for param in params.iter_mut() {
            for (value, grad) in param.value.iter_mut().zip(param.grad.iter()) {
                *value -= self.learning_rate * (grad + self.weight_decay * *value);
            }
        }
    }

    fn reset(&mut self) {
        // Vanilla SGD has no state to reset
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weight_decay_added_to_gradient() {
        let mut optimizer = SGD::new(0.5, 0.1);
        let mut w = vec![2.0f32];
        let mut g = vec![1.0f32];
        optimizer.step(&mut [Param::new("w".into(), &mut w, &mut g)]);
        // 2 - 0.5 * (1 + 0.2) = 1.4
        assert_relative_eq!(w[0], 1.4, epsilon = 1e-6);
    }

    #[test]
    fn test_set_learning_rate() {
        let mut optimizer = SGD::new(0.5, 0.0);
        optimizer.set_learning_rate(0.0);
        let mut w = vec![2.0f32];
        let mut g = vec![1.0f32];
        optimizer.step(&mut [Param::new("w".into(), &mut w, &mut g)]);
        assert_eq!(w[0], 2.0);
    }
}
