//! Convolutional encoder for one sample segment.

use crate::data::{Batch, EmbeddingTable, Field};
use crate::error::{CausalError, Result};
use crate::layers::{Conv1DLayer, DropoutLayer, Layer};
use crate::optimizers::Param;
use crate::utils::SeededRng;

/// Embedding dropout, then one [`Conv1DLayer`] per kernel width, concatenated.
///
/// The output row is width-major: the `n_filter` pooled features of the first
/// width, then those of the second, and so on. Its size is
/// `n_filter × widths.len()` whatever the segment length.
pub struct SegmentEncoder {
    field: Field,
    seq_len: usize,
    emb_dim: usize,
    n_filter: usize,
    convs: Vec<Conv1DLayer>,
    dropout: DropoutLayer,
    embedded: Vec<f32>,
    batch_size: usize,
}

impl SegmentEncoder {
    pub fn new(
        field: Field,
        seq_len: usize,
        emb_dim: usize,
        n_filter: usize,
        widths: &[usize],
        emb_dropout: f32,
        rng: &mut SeededRng,
    ) -> Self {
        let convs = widths
            .iter()
            .map(|&w| Conv1DLayer::new(seq_len, emb_dim, w, n_filter, rng))
            .collect();
        Self {
            field,
            seq_len,
            emb_dim,
            n_filter,
            convs,
            dropout: DropoutLayer::new(seq_len * emb_dim, emb_dropout, rng),
            embedded: Vec::new(),
            batch_size: 0,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.n_filter * self.convs.len()
    }

    /// Look up this encoder's field of `batch` and encode it.
    pub fn encode(&mut self, table: &EmbeddingTable, batch: &Batch) -> Result<Vec<f32>> {
        let tokens = batch.tokens(self.field);
        let expected = batch.size() * self.seq_len;
        if tokens.len() != expected {
            return Err(CausalError::Shape {
                context: format!("{} batch width", self.field.name()),
                expected,
                actual: tokens.len(),
            });
        }
        if table.dim() != self.emb_dim {
            return Err(CausalError::Shape {
                context: "embedding dimension".to_string(),
                expected: self.emb_dim,
                actual: table.dim(),
            });
        }
        let embedded = table.lookup(tokens, self.field)?;
        Ok(self.forward(embedded, batch.size()))
    }

    /// Encode already-embedded rows (`batch_size × seq_len × emb_dim`).
    pub fn forward(&mut self, mut embedded: Vec<f32>, batch_size: usize) -> Vec<f32> {
        self.dropout.apply_inplace(&mut embedded, batch_size);
        self.embedded = embedded;
        self.batch_size = batch_size;

        let out_dim = self.output_dim();
        let mut output = vec![0.0f32; batch_size * out_dim];
        let mut pooled = vec![0.0f32; batch_size * self.n_filter];
        for (wi, conv) in self.convs.iter_mut().enumerate() {
            conv.forward(&self.embedded, &mut pooled, batch_size);
            for b in 0..batch_size {
                let dst = &mut output[b * out_dim + wi * self.n_filter..][..self.n_filter];
                dst.copy_from_slice(&pooled[b * self.n_filter..(b + 1) * self.n_filter]);
            }
        }
        output
    }

    /// Accumulate filter gradients. The embedding table is frozen, so no input gradient.
    pub fn backward(&mut self, grad_output: &[f32]) {
        let batch_size = self.batch_size;
        let out_dim = self.output_dim();
        assert_eq!(grad_output.len(), batch_size * out_dim, "grad_output len mismatch");

        let mut grad = vec![0.0f32; batch_size * self.n_filter];
        for (wi, conv) in self.convs.iter_mut().enumerate() {
            for b in 0..batch_size {
                grad[b * self.n_filter..(b + 1) * self.n_filter]
                    .copy_from_slice(&grad_output[b * out_dim + wi * self.n_filter..][..self.n_filter]);
            }
            conv.backward(&self.embedded, &grad, None, batch_size);
        }
    }

    pub fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>> {
        self.convs
            .iter_mut()
            .flat_map(|conv| {
                let name = format!("{}.conv{}", prefix, conv.width());
                conv.parameters(&name)
            })
            .collect()
    }

    pub fn zero_grad(&mut self) {
        self.convs.iter_mut().for_each(|c| c.zero_grad());
    }

    pub fn set_training(&mut self, training: bool) {
        self.dropout.set_training(training);
    }

    pub fn parameter_count(&self) -> usize {
        self.convs.iter().map(|c| c.parameter_count()).sum()
    }
}
