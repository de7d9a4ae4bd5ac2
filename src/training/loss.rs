//! Classification losses over raw class scores.
//!
//! Both losses take `batch × n_class` logits, apply a row softmax and return the
//! mean loss, the gradient w.r.t. the logits and the probabilities themselves (the
//! evaluator reuses them instead of running a second softmax).

use crate::config::ExperimentConfig;
use crate::error::{CausalError, Result};
use crate::utils::activations::softmax_rows;

const PROB_EPS: f32 = 1e-7;

/// The active loss for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum LossKind {
    /// `−α_t (1 − p_t)^γ log p_t`, with `α_t = α` for the positive class and `1 − α` otherwise.
    Focal { gamma: f32, alpha: f32 },
    /// `Σ w_y (−log p_y) / Σ w_y`
    WeightedCrossEntropy { weights: Vec<f32> },
}

/// Result of one loss evaluation.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f32,
    /// d loss / d logits, `batch × n_class`
    pub grad: Vec<f32>,
    /// Softmax probabilities, `batch × n_class`
    pub probs: Vec<f32>,
}

impl LossKind {
    /// Accepted values of `loss_type`.
    pub const NAMES: &'static [&'static str] = &["focal", "weighted_cross_entropy"];

    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        match config.loss_type.as_str() {
            "focal" => Ok(LossKind::Focal {
                gamma: config.focal_gamma,
                alpha: config.focal_alpha,
            }),
            "weighted_cross_entropy" => Ok(LossKind::WeightedCrossEntropy {
                weights: config.class_weights.clone(),
            }),
            other => Err(CausalError::config(format!(
                "Invalid loss_type '{}'. Must be one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LossKind::Focal { .. } => "focal",
            LossKind::WeightedCrossEntropy { .. } => "weighted_cross_entropy",
        }
    }

    /// Mean loss over the batch together with its gradient.
    ///
    /// # Panics
    ///
    /// Panics if `logits.len() != labels.len() * n_class` or a label is `>= n_class`.
    pub fn compute(&self, logits: &[f32], labels: &[usize], n_class: usize) -> LossOutput {
        let batch = labels.len();
        assert_eq!(logits.len(), batch * n_class, "logits/labels size mismatch");
        assert!(labels.iter().all(|&y| y < n_class), "label out of range");

        let mut probs = logits.to_vec();
        softmax_rows(&mut probs, batch, n_class);

        let (loss, grad) = match self {
            LossKind::Focal { gamma, alpha } => focal(&probs, labels, n_class, *gamma, *alpha),
            LossKind::WeightedCrossEntropy { weights } => {
                weighted_cross_entropy(&probs, labels, n_class, weights)
            }
        };
        LossOutput { loss, grad, probs }
    }
}

fn focal(probs: &[f32], labels: &[usize], n_class: usize, gamma: f32, alpha: f32) -> (f32, Vec<f32>) {
    let batch = labels.len();
    let mut grad = vec![0.0f32; probs.len()];
    if batch == 0 {
        return (0.0, grad);
    }
    let inv_batch = 1.0 / batch as f32;
    let mut total = 0.0f32;

    for (i, &y) in labels.iter().enumerate() {
        let row = &probs[i * n_class..(i + 1) * n_class];
        let p = row[y].clamp(PROB_EPS, 1.0 - PROB_EPS);
        let alpha_t = if y == 1 { alpha } else { 1.0 - alpha };
        let log_p = p.ln();
        let one_minus = 1.0 - p;
        let modulator = one_minus.powf(gamma);

        total += -alpha_t * modulator * log_p;

        // d loss / d p_t, then through the softmax: d p_t / d z_c = p_t (δ_tc − p_c)
        let mut dl_dp = -modulator / p;
        if gamma != 0.0 {
            dl_dp += gamma * one_minus.powf(gamma - 1.0) * log_p;
        }
        let scale = alpha_t * dl_dp * p * inv_batch;
        for (c, g) in grad[i * n_class..(i + 1) * n_class].iter_mut().enumerate() {
            let delta = if c == y { 1.0 } else { 0.0 };
            *g = scale * (delta - row[c]);
        }
    }
    (total * inv_batch, grad)
}

fn weighted_cross_entropy(
    probs: &[f32],
    labels: &[usize],
    n_class: usize,
    weights: &[f32],
) -> (f32, Vec<f32>) {
    let mut grad = vec![0.0f32; probs.len()];
    let weight_sum: f32 = labels.iter().map(|&y| weights[y]).sum();
    if weight_sum <= 0.0 {
        return (0.0, grad);
    }

    let mut total = 0.0f32;
    for (i, &y) in labels.iter().enumerate() {
        let row = &probs[i * n_class..(i + 1) * n_class];
        let w = weights[y];
        total += -w * row[y].max(PROB_EPS).ln();
        for (c, g) in grad[i * n_class..(i + 1) * n_class].iter_mut().enumerate() {
            let delta = if c == y { 1.0 } else { 0.0 };
            *g = w * (row[c] - delta) / weight_sum;
        }
    }
    (total / weight_sum, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_focal_with_zero_gamma_is_weighted_cross_entropy() {
        let logits = [0.3f32, -0.2, 1.1, 0.4];
        let labels = [1, 0];
        let focal = LossKind::Focal { gamma: 0.0, alpha: 0.5 }.compute(&logits, &labels, 2);

        let mut probs = logits.to_vec();
        softmax_rows(&mut probs, 2, 2);
        let expected = -0.5 * (probs[1].ln() + probs[2].ln()) / 2.0;
        assert_relative_eq!(focal.loss, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_focal_downweights_easy_examples() {
        let kind = LossKind::Focal { gamma: 2.0, alpha: 0.5 };
        let easy = kind.compute(&[-3.0, 3.0], &[1], 2);
        let hard = kind.compute(&[3.0, -3.0], &[1], 2);
        let ce = LossKind::Focal { gamma: 0.0, alpha: 0.5 }.compute(&[-3.0, 3.0], &[1], 2);
        assert!(easy.loss < ce.loss * 0.01);
        assert!(hard.loss > easy.loss);
    }

    #[test]
    fn test_weighted_ce_normalises_by_weight_sum() {
        let kind = LossKind::WeightedCrossEntropy { weights: vec![0.2, 0.8] };
        let out = kind.compute(&[0.0, 0.0, 0.0, 0.0], &[0, 1], 2);
        // uniform probabilities: −log 0.5 regardless of weights
        assert_relative_eq!(out.loss, 2.0f32.ln(), epsilon = 1e-6);
        assert_relative_eq!(out.grad[0], 0.2 * (0.5 - 1.0), epsilon = 1e-6);
        assert_relative_eq!(out.grad[3], 0.8 * (0.5 - 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_rows_sum_to_zero() {
        let kind = LossKind::Focal { gamma: 4.0, alpha: 0.75 };
        let out = kind.compute(&[0.2, -0.7, 1.5, 0.1, -0.3, -0.3], &[0, 1, 1], 2);
        for row in out.grad.chunks_exact(2) {
            assert_relative_eq!(row[0] + row[1], 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_weight_batch_has_no_gradient() {
        let kind = LossKind::WeightedCrossEntropy { weights: vec![0.0, 1.0] };
        let out = kind.compute(&[1.0, 2.0], &[0], 2);
        assert_eq!(out.loss, 0.0);
        assert!(out.grad.iter().all(|&g| g == 0.0));
    }
}
