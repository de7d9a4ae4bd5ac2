//! Attention-pooling encoder over the full sentence
//!
//! ```text
//! h_t = tanh(W x_t + b)          x_t: embedded (+ position) token t
//! s_t = u · h_t
//! a   = softmax(s_1 .. s_len)    only the first `len` positions take part
//! y   = Σ_t a_t h_t
//! ```
//!
//! Rows are packed in descending-length order (one packed row per valid token),
//! and the pooled vectors are restored to batch order before being returned.

use crate::data::{Batch, EmbeddingTable, Field, LengthOrder};
use crate::error::{CausalError, Result};
use crate::layers::{DenseLayer, DropoutLayer, Layer};
use crate::optimizers::Param;
use crate::utils::activations::{softmax_inplace, tanh_backward_inplace, tanh_inplace};
use crate::utils::SeededRng;

/// Sinusoidal position encodings, `seq_len × dim` row-major.
///
/// `angle = pos / 10000^(2*(i/2)/dim)`; even dimensions take `sin`, odd take `cos`.
pub fn sinusoidal_encoding(seq_len: usize, dim: usize) -> Vec<f32> {
    let mut pe = vec![0.0f32; seq_len * dim];
    for pos in 0..seq_len {
        for i in 0..dim {
            let exponent = (2 * (i / 2)) as f32 / dim as f32;
            let angle = pos as f32 / 10000f32.powf(exponent);
            pe[pos * dim + i] = if i % 2 == 0 { angle.sin() } else { angle.cos() };
        }
    }
    pe
}

pub struct ContextEncoder {
    seq_len: usize,
    emb_dim: usize,
    hidden: usize,
    proj: DenseLayer,
    query: Vec<f32>,
    grad_query: Vec<f32>,
    positional: Option<Vec<f32>>,
    dropout: DropoutLayer,
    // forward cache, all in processing (descending-length) order
    order: Option<LengthOrder>,
    spans: Vec<(usize, usize)>,
    packed: Vec<f32>,
    states: Vec<f32>,
    attention: Vec<f32>,
}

impl ContextEncoder {
    pub fn new(
        seq_len: usize,
        emb_dim: usize,
        hidden: usize,
        positional_encoding: bool,
        emb_dropout: f32,
        rng: &mut SeededRng,
    ) -> Self {
        let proj = DenseLayer::new(emb_dim, hidden, rng);
        let limit = (6.0f32 / (hidden + 1) as f32).sqrt();
        let query = (0..hidden).map(|_| rng.gen_range_f32(-limit, limit)).collect();
        Self {
            seq_len,
            emb_dim,
            hidden,
            proj,
            query,
            grad_query: vec![0.0; hidden],
            positional: positional_encoding.then(|| sinusoidal_encoding(seq_len, emb_dim)),
            dropout: DropoutLayer::new(seq_len * emb_dim, emb_dropout, rng),
            order: None,
            spans: Vec::new(),
            packed: Vec::new(),
            states: Vec::new(),
            attention: Vec::new(),
        }
    }

    pub fn output_dim(&self) -> usize {
        self.hidden
    }

    pub fn grad_query(&self) -> &[f32] {
        &self.grad_query
    }

    /// Attention weights of the last forward pass for original batch row `row`.
    pub fn attention_for(&self, row: usize) -> Option<&[f32]> {
        let order = self.order.as_ref()?;
        let pos = *order.inverse().get(row)?;
        let (start, len) = self.spans[pos];
        Some(&self.attention[start..start + len])
    }

    /// Look up the full-sentence field of `batch` and pool it.
    pub fn encode(&mut self, table: &EmbeddingTable, batch: &Batch) -> Result<Vec<f32>> {
        let tokens = batch.tokens(Field::Full);
        let expected = batch.size() * self.seq_len;
        if tokens.len() != expected {
            return Err(CausalError::Shape {
                context: "tokens batch width".to_string(),
                expected,
                actual: tokens.len(),
            });
        }
        let embedded = table.lookup(tokens, Field::Full)?;
        Ok(self.forward(embedded, &batch.lengths))
    }

    /// Pool embedded rows (`lengths.len() × seq_len × emb_dim`) into `lengths.len() × hidden`.
    ///
    /// Lengths are clamped to `[1, seq_len]`.
    pub fn forward(&mut self, mut embedded: Vec<f32>, lengths: &[usize]) -> Vec<f32> {
        let batch_size = lengths.len();
        let row_len = self.seq_len * self.emb_dim;
        assert_eq!(embedded.len(), batch_size * row_len, "embedded len mismatch");

        if let Some(pe) = &self.positional {
            for row in embedded.chunks_exact_mut(row_len) {
                for (v, p) in row.iter_mut().zip(pe) {
                    *v += p;
                }
            }
        }
        self.dropout.apply_inplace(&mut embedded, batch_size);

        let clamped: Vec<usize> = lengths.iter().map(|&l| l.clamp(1, self.seq_len)).collect();
        let order = LengthOrder::descending(&clamped);

        self.spans.clear();
        self.packed.clear();
        let mut start = 0;
        for &row in order.order() {
            let len = clamped[row];
            self.spans.push((start, len));
            self.packed
                .extend_from_slice(&embedded[row * row_len..row * row_len + len * self.emb_dim]);
            start += len;
        }
        let n_tokens = start;

        self.states.resize(n_tokens * self.hidden, 0.0);
        self.proj.forward(&self.packed, &mut self.states, n_tokens);
        tanh_inplace(&mut self.states);

        self.attention.resize(n_tokens, 0.0);
        for (t, h) in self.states.chunks_exact(self.hidden).enumerate() {
            self.attention[t] = h.iter().zip(&self.query).map(|(a, b)| a * b).sum();
        }

        let mut pooled = vec![0.0f32; batch_size * self.hidden];
        for (i, &(start, len)) in self.spans.iter().enumerate() {
            let weights = &mut self.attention[start..start + len];
            softmax_inplace(weights);
            let y = &mut pooled[i * self.hidden..(i + 1) * self.hidden];
            for (t, &a) in weights.iter().enumerate() {
                let h = &self.states[(start + t) * self.hidden..(start + t + 1) * self.hidden];
                for (yv, hv) in y.iter_mut().zip(h) {
                    *yv += a * hv;
                }
            }
        }

        let restored = order.restore(&pooled, self.hidden);
        self.order = Some(order);
        restored
    }

    /// Accumulate projection and query gradients for `grad_output` (batch order).
    pub fn backward(&mut self, grad_output: &[f32]) {
        let Some(order) = &self.order else {
            panic!("ContextEncoder::backward called before forward");
        };
        let grad_sorted = order.apply(grad_output, self.hidden);
        let hidden = self.hidden;

        let mut grad_states = vec![0.0f32; self.states.len()];
        for (i, &(start, len)) in self.spans.iter().enumerate() {
            let dy = &grad_sorted[i * hidden..(i + 1) * hidden];
            let attn = &self.attention[start..start + len];

            let d_attn: Vec<f32> = (0..len)
                .map(|t| {
                    let h = &self.states[(start + t) * hidden..(start + t + 1) * hidden];
                    h.iter().zip(dy).map(|(a, b)| a * b).sum()
                })
                .collect();
            let mean: f32 = attn.iter().zip(&d_attn).map(|(a, d)| a * d).sum();

            for t in 0..len {
                let ds = attn[t] * (d_attn[t] - mean);
                let row = (start + t) * hidden;
                for k in 0..hidden {
                    grad_states[row + k] = attn[t] * dy[k] + ds * self.query[k];
                    self.grad_query[k] += ds * self.states[row + k];
                }
            }
        }

        tanh_backward_inplace(&self.states, &mut grad_states);
        let n_tokens = self.states.len() / hidden;
        self.proj.backward(&self.packed, &grad_states, None, n_tokens);
    }

    pub fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>> {
        let mut params = self.proj.parameters(&format!("{prefix}.proj"));
        params.push(Param::new(
            format!("{prefix}.query"),
            &mut self.query,
            &mut self.grad_query,
        ));
        params
    }

    pub fn zero_grad(&mut self) {
        self.proj.zero_grad();
        self.grad_query.fill(0.0);
    }

    pub fn set_training(&mut self, training: bool) {
        self.dropout.set_training(training);
    }

    pub fn parameter_count(&self) -> usize {
        self.proj.parameter_count() + self.query.len()
    }
}
