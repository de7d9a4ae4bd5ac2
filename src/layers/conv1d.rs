//! 1D convolution over token positions with ReLU and max-over-time pooling
//!
//! Input rows are embedded sequences laid out as `seq_len × emb_dim`. Each of the
//! `filters` kernels spans `width` consecutive tokens across the full embedding,
//! so a window at position p is the contiguous slice `[p*emb_dim, (p+width)*emb_dim)`.
//! The layer output is one scalar per filter: `max_p relu(z[p])`.

use crate::layers::Layer;
use crate::optimizers::Param;
use crate::utils::ops::sgemm;
use crate::utils::SeededRng;

/// Convolution + ReLU + max-over-time pooling for one kernel width.
pub struct Conv1DLayer {
    seq_len: usize,
    emb_dim: usize,
    width: usize,
    filters: usize,
    weights: Vec<f32>, // [width * emb_dim, filters]
    biases: Vec<f32>,  // [filters]
    grad_weights: Vec<f32>,
    grad_biases: Vec<f32>,
    // forward cache
    columns: Vec<f32>, // [batch * positions, width * emb_dim]
    preact: Vec<f32>,  // [batch * positions, filters]
    argmax: Vec<usize>, // [batch, filters]
}

impl Conv1DLayer {
    /// Create a layer with Xavier initialization.
    ///
    /// fan_in = width × emb_dim, fan_out = filters × width.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero or larger than `seq_len`.
    pub fn new(
        seq_len: usize,
        emb_dim: usize,
        width: usize,
        filters: usize,
        rng: &mut SeededRng,
    ) -> Self {
        let fan_in = (width * emb_dim) as f32;
        let fan_out = (filters * width) as f32;
        let limit = (6.0f32 / (fan_in + fan_out)).sqrt();

        let mut weights = vec![0.0f32; width * emb_dim * filters];
        for value in &mut weights {
            *value = rng.gen_range_f32(-limit, limit);
        }

        Self::from_weights(seq_len, emb_dim, width, filters, weights, vec![0.0; filters])
    }

    /// Create a layer from explicit weights laid out `[width * emb_dim, filters]`.
    pub fn from_weights(
        seq_len: usize,
        emb_dim: usize,
        width: usize,
        filters: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Self {
        assert!(
            width >= 1 && width <= seq_len,
            "kernel width {} must be in 1..={}",
            width,
            seq_len
        );
        assert_eq!(weights.len(), width * emb_dim * filters, "weights length mismatch");
        assert_eq!(biases.len(), filters, "biases length mismatch");
        Self {
            seq_len,
            emb_dim,
            width,
            filters,
            grad_weights: vec![0.0; weights.len()],
            grad_biases: vec![0.0; filters],
            weights,
            biases,
            columns: Vec::new(),
            preact: Vec::new(),
            argmax: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of valid window positions: seq_len - width + 1.
    pub fn positions(&self) -> usize {
        self.seq_len - self.width + 1
    }

    pub fn grad_weights(&self) -> &[f32] {
        &self.grad_weights
    }

    pub fn grad_biases(&self) -> &[f32] {
        &self.grad_biases
    }

    fn window_len(&self) -> usize {
        self.width * self.emb_dim
    }
}

impl Layer for Conv1DLayer {
    fn forward(&mut self, input: &[f32], output: &mut [f32], batch_size: usize) {
        let row_len = self.seq_len * self.emb_dim;
        assert_eq!(input.len(), batch_size * row_len, "input len mismatch");
        assert_eq!(output.len(), batch_size * self.filters, "output len mismatch");

        let positions = self.positions();
        let window = self.window_len();

        // im2col: windows are contiguous in the row-major sequence layout
        self.columns.clear();
        self.columns.reserve(batch_size * positions * window);
        for row in input.chunks_exact(row_len) {
            for p in 0..positions {
                let start = p * self.emb_dim;
                self.columns.extend_from_slice(&row[start..start + window]);
            }
        }

        self.preact.resize(batch_size * positions * self.filters, 0.0);
        sgemm(
            false,
            false,
            batch_size * positions,
            self.filters,
            window,
            1.0,
            &self.columns,
            &self.weights,
            0.0,
            &mut self.preact,
        );

        self.argmax.resize(batch_size * self.filters, 0);
        for b in 0..batch_size {
            for f in 0..self.filters {
                let mut best_p = 0;
                let mut best = f32::NEG_INFINITY;
                for p in 0..positions {
                    let idx = (b * positions + p) * self.filters + f;
                    self.preact[idx] += self.biases[f];
                    if self.preact[idx] > best {
                        best = self.preact[idx];
                        best_p = p;
                    }
                }
                self.argmax[b * self.filters + f] = best_p;
                output[b * self.filters + f] = best.max(0.0);
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
        assert_eq!(grad_output.len(), batch_size * self.filters, "grad_output len mismatch");
        let positions = self.positions();
        let window = self.window_len();

        // Route each pooled gradient to its argmax position, through the ReLU.
        let mut grad_pre = vec![0.0f32; batch_size * positions * self.filters];
        for b in 0..batch_size {
            for f in 0..self.filters {
                let p = self.argmax[b * self.filters + f];
                let idx = (b * positions + p) * self.filters + f;
                if self.preact[idx] > 0.0 {
                    grad_pre[idx] = grad_output[b * self.filters + f];
                }
            }
        }

        sgemm(
            true,
            false,
            window,
            self.filters,
            batch_size * positions,
            1.0,
            &self.columns,
            &grad_pre,
            1.0,
            &mut self.grad_weights,
        );
        for row in grad_pre.chunks_exact(self.filters) {
            for (g, d) in self.grad_biases.iter_mut().zip(row) {
                *g += d;
            }
        }

        if let Some(grad_input) = grad_input {
            assert_eq!(grad_input.len(), input.len(), "grad_input len mismatch");
            let mut grad_cols = vec![0.0f32; batch_size * positions * window];
            sgemm(
                false,
                true,
                batch_size * positions,
                window,
                self.filters,
                1.0,
                &grad_pre,
                &self.weights,
                0.0,
                &mut grad_cols,
            );
            // col2im: overlapping windows accumulate
            grad_input.fill(0.0);
            let row_len = self.seq_len * self.emb_dim;
            for b in 0..batch_size {
                for p in 0..positions {
                    let src = &grad_cols[(b * positions + p) * window..][..window];
                    let dst = &mut grad_input[b * row_len + p * self.emb_dim..][..window];
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d += s;
                    }
                }
            }
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
        self.seq_len * self.emb_dim
    }

    fn output_size(&self) -> usize {
        self.filters
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
