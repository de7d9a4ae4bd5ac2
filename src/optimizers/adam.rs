//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! This module provides the Adam optimizer, which combines momentum and
//! adaptive learning rates with bias correction for improved convergence.

use crate::optimizers::{Optimizer, Param};

/// Adam optimizer with L2 weight decay.
///
/// The update rule, with `g = gradient + weight_decay * parameter`:
///
/// ```text
/// m_t = β1 * m_{t-1} + (1 - β1) * g
/// v_t = β2 * v_{t-1} + (1 - β2) * g²
/// m_hat = m_t / (1 - β1^t)
/// v_hat = v_t / (1 - β2^t)
/// parameter = parameter - α * m_hat / (√v_hat + ε)
/// ```
///
/// Moment buffers are kept per parameter slot, allocated on the first step.
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    /// First moment estimates, one buffer per parameter slot
    m: Vec<Vec<f32>>,
    /// Second moment estimates, one buffer per parameter slot
    v: Vec<Vec<f32>>,
    /// Time step counter for bias correction
    t: usize,
}

impl Adam {
    /// Creates a new Adam optimizer.
    ///
    /// ```
    /// use causal_relation_networks::optimizers::{Adam, Optimizer};
    ///
    /// let optimizer = Adam::new(0.001, 0.9, 0.999, 1e-8, 0.0);
    /// assert_eq!(optimizer.learning_rate(), 0.001);
    /// ```
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Adam with the usual (0.9, 0.999, 1e-8) moments.
    pub fn with_defaults(learning_rate: f32, weight_decay: f32) -> Self {
        Self::new(learning_rate, 0.9, 0.999, 1e-8, weight_decay)
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> usize {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Param<'_>]) {
        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.len()]).collect();
            self.v = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }
        assert_eq!(
            self.m.len(),
            params.len(),
            "parameter list changed between optimizer steps"
        );

        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for ((param, m), v) in params.iter_mut().zip(&mut self.m).zip(&mut self.v) {
            assert_eq!(m.len(), param.len(), "parameter '{}' changed size", param.name);
            for i in 0..param.len() {
                let g = param.grad[i] + self.weight_decay * param.value[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

                let m_hat = m[i] / bias_correction1;
                let v_hat = v[i] / bias_correction2;
                param.value[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }

    fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
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
    fn test_first_step_moves_by_learning_rate() {
        // With bias correction the first step is lr * sign(g)
        let mut optimizer = Adam::new(0.1, 0.9, 0.999, 1e-8, 0.0);
        let mut w = vec![1.0f32, -1.0];
        let mut g = vec![0.5f32, -2.0];
        let mut params = vec![Param::new("w".into(), &mut w, &mut g)];
        optimizer.step(&mut params);

        assert_relative_eq!(w[0], 0.9, epsilon = 1e-5);
        assert_relative_eq!(w[1], -0.9, epsilon = 1e-5);
    }

    #[test]
    fn test_state_is_per_slot() {
        let mut optimizer = Adam::with_defaults(0.01, 0.0);
        let mut a = vec![0.0f32; 3];
        let mut ga = vec![1.0f32; 3];
        let mut b = vec![0.0f32; 1];
        let mut gb = vec![-1.0f32; 1];
        {
            let mut params = vec![
                Param::new("a".into(), &mut a, &mut ga),
                Param::new("b".into(), &mut b, &mut gb),
            ];
            optimizer.step(&mut params);
            optimizer.step(&mut params);
        }
        assert_eq!(optimizer.step_count(), 2);
        assert!(a.iter().all(|&x| x < 0.0));
        assert!(b[0] > 0.0);
    }

    #[test]
    fn test_weight_decay_shrinks_with_zero_gradient() {
        let mut optimizer = Adam::new(0.01, 0.9, 0.999, 1e-8, 0.1);
        let mut w = vec![2.0f32];
        let mut g = vec![0.0f32];
        let mut params = vec![Param::new("w".into(), &mut w, &mut g)];
        optimizer.step(&mut params);
        assert!(w[0] < 2.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut optimizer = Adam::with_defaults(0.01, 0.0);
        let mut w = vec![0.0f32];
        let mut g = vec![1.0f32];
        let mut params = vec![Param::new("w".into(), &mut w, &mut g)];
        optimizer.step(&mut params);
        optimizer.reset();
        assert_eq!(optimizer.step_count(), 0);
    }
}
