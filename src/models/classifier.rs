//! Final classifier head.

use crate::config::ClassifierConfig;
use crate::layers::{DenseLayer, DropoutLayer, Layer};
use crate::optimizers::Param;
use crate::utils::activations::{relu_backward_inplace, relu_inplace};
use crate::utils::SeededRng;

/// `Linear(input → n_class)`, or with a hidden width set
/// `Linear(input → hidden) → ReLU → Dropout → Linear(hidden → n_class)`.
/// Outputs are raw scores.
pub struct ClassifierHead {
    hidden: Option<(DenseLayer, DropoutLayer)>,
    output: DenseLayer,
    input: Vec<f32>,
    hidden_out: Vec<f32>,
    hidden_dropped: Vec<f32>,
    batch_size: usize,
}

impl ClassifierHead {
    pub fn new(config: &ClassifierConfig, dropout: f32, rng: &mut SeededRng) -> Self {
        let (hidden, out_in) = match config.hidden {
            Some(width) => {
                let layer = DenseLayer::new(config.input_dim, width, rng);
                let drop = DropoutLayer::new(width, dropout, rng);
                (Some((layer, drop)), width)
            }
            None => (None, config.input_dim),
        };
        Self {
            hidden,
            output: DenseLayer::new(out_in, config.n_class, rng),
            input: Vec::new(),
            hidden_out: Vec::new(),
            hidden_dropped: Vec::new(),
            batch_size: 0,
        }
    }

    pub fn input_dim(&self) -> usize {
        match &self.hidden {
            Some((layer, _)) => layer.input_size(),
            None => self.output.input_size(),
        }
    }

    pub fn n_class(&self) -> usize {
        self.output.output_size()
    }

    pub fn forward(&mut self, input: &[f32], batch_size: usize) -> Vec<f32> {
        assert_eq!(
            input.len(),
            batch_size * self.input_dim(),
            "classifier input length mismatch"
        );
        self.input = input.to_vec();
        self.batch_size = batch_size;

        let mut logits = vec![0.0f32; batch_size * self.n_class()];
        match &mut self.hidden {
            Some((layer, drop)) => {
                self.hidden_out.resize(batch_size * layer.output_size(), 0.0);
                layer.forward(input, &mut self.hidden_out, batch_size);
                relu_inplace(&mut self.hidden_out);
                self.hidden_dropped.clone_from(&self.hidden_out);
                drop.apply_inplace(&mut self.hidden_dropped, batch_size);
                self.output.forward(&self.hidden_dropped, &mut logits, batch_size);
            }
            None => self.output.forward(input, &mut logits, batch_size),
        }
        logits
    }

    /// Accumulate head gradients and return the gradient w.r.t. the head input.
    pub fn backward(&mut self, grad_logits: &[f32]) -> Vec<f32> {
        let batch_size = self.batch_size;
        let mut grad_input = vec![0.0f32; self.input.len()];
        match &mut self.hidden {
            Some((layer, drop)) => {
                let mut grad_hidden = vec![0.0f32; self.hidden_dropped.len()];
                self.output.backward(
                    &self.hidden_dropped,
                    grad_logits,
                    Some(&mut grad_hidden),
                    batch_size,
                );
                drop.backward_inplace(&mut grad_hidden);
                relu_backward_inplace(&self.hidden_out, &mut grad_hidden);
                layer.backward(&self.input, &grad_hidden, Some(&mut grad_input), batch_size);
            }
            None => {
                self.output
                    .backward(&self.input, grad_logits, Some(&mut grad_input), batch_size);
            }
        }
        grad_input
    }

    pub fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>> {
        let mut params = Vec::new();
        if let Some((layer, _)) = &mut self.hidden {
            params.extend(layer.parameters(&format!("{prefix}.hidden")));
        }
        params.extend(self.output.parameters(&format!("{prefix}.out")));
        params
    }

    pub fn zero_grad(&mut self) {
        if let Some((layer, _)) = &mut self.hidden {
            layer.zero_grad();
        }
        self.output.zero_grad();
    }

    pub fn set_training(&mut self, training: bool) {
        if let Some((_, drop)) = &mut self.hidden {
            drop.set_training(training);
        }
    }

    pub fn parameter_count(&self) -> usize {
        let hidden = self.hidden.as_ref().map_or(0, |(l, _)| l.parameter_count());
        hidden + self.output.parameter_count()
    }
}
