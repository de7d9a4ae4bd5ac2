//! Relation composition over segment pairs
//!
//! Four directed pairs are built per sample, each concatenated with the context
//! vector, and passed through the shared transform `g`:
//!
//! ```text
//! op_i = [y_a, y_b, y_ctx]       (a, b) in (pre,cur) (cur,pre) (pre,alt) (alt,cur)
//! g_i  = relu(G2 · drop(relu(G1 · op_i)))
//! out  = drop(relu(F · Σ_i g_i))
//! ```
//!
//! The four `g_i` are summed element-wise in sorted value order, which makes the
//! aggregate bit-for-bit independent of the order the slots were built in.

use crate::layers::{DenseLayer, DropoutLayer, Layer};
use crate::optimizers::Param;
use crate::utils::activations::{relu_backward_inplace, relu_inplace};
use crate::utils::SeededRng;

/// Segment index inside a relation pair.
pub const PRE: usize = 0;
pub const ALT: usize = 1;
pub const CUR: usize = 2;

/// Directed segment pairs, in canonical slot order.
pub const RELATION_PAIRS: [(usize, usize); 4] = [(PRE, CUR), (CUR, PRE), (PRE, ALT), (ALT, CUR)];

const CANONICAL_SLOTS: [usize; 4] = [0, 1, 2, 3];

/// Gradients with respect to the composer inputs, each in batch order.
#[derive(Debug, Clone)]
pub struct RelationGrads {
    pub pre: Vec<f32>,
    pub alt: Vec<f32>,
    pub cur: Vec<f32>,
    pub ctx: Vec<f32>,
}

/// Build the relation operand rows for a batch.
///
/// Row `b * 4 + k` holds pair `RELATION_PAIRS[slots[k]]` of sample `b`, followed
/// by its context vector. Each row is `2 * seg_dim + ctx_dim` wide.
pub fn relation_ops(
    segments: [&[f32]; 3],
    ctx: &[f32],
    batch_size: usize,
    seg_dim: usize,
    ctx_dim: usize,
    slots: [usize; 4],
) -> Vec<f32> {
    for seg in segments {
        assert_eq!(seg.len(), batch_size * seg_dim, "segment len mismatch");
    }
    assert_eq!(ctx.len(), batch_size * ctx_dim, "context len mismatch");

    let op_dim = 2 * seg_dim + ctx_dim;
    let mut ops = Vec::with_capacity(batch_size * 4 * op_dim);
    for b in 0..batch_size {
        for &slot in &slots {
            let (first, second) = RELATION_PAIRS[slot];
            ops.extend_from_slice(&segments[first][b * seg_dim..(b + 1) * seg_dim]);
            ops.extend_from_slice(&segments[second][b * seg_dim..(b + 1) * seg_dim]);
            ops.extend_from_slice(&ctx[b * ctx_dim..(b + 1) * ctx_dim]);
        }
    }
    ops
}

/// Order-independent sum of four values.
fn sum_sorted(mut values: [f32; 4]) -> f32 {
    values.sort_by(f32::total_cmp);
    ((values[0] + values[1]) + values[2]) + values[3]
}

pub struct RelationComposer {
    seg_dim: usize,
    ctx_dim: usize,
    hidden: usize,
    g1: DenseLayer,
    g_dropout: DropoutLayer,
    g2: DenseLayer,
    f1: DenseLayer,
    f_dropout: DropoutLayer,
    // forward cache
    batch_size: usize,
    slots: [usize; 4],
    ops: Vec<f32>,
    g1_out: Vec<f32>,
    g1_dropped: Vec<f32>,
    g2_out: Vec<f32>,
    summed: Vec<f32>,
    f1_out: Vec<f32>,
}

impl RelationComposer {
    pub fn new(
        seg_dim: usize,
        ctx_dim: usize,
        hidden: usize,
        dropout: f32,
        rng: &mut SeededRng,
    ) -> Self {
        let g1 = DenseLayer::new(2 * seg_dim + ctx_dim, hidden, rng);
        let g2 = DenseLayer::new(hidden, hidden, rng);
        let f1 = DenseLayer::new(hidden, hidden, rng);
        Self::from_layers(seg_dim, ctx_dim, g1, g2, f1, dropout, rng)
    }

    /// Assemble from explicit `g` and `f` layers.
    ///
    /// # Panics
    ///
    /// Panics if the layer sizes don't chain: `g1: 2*seg_dim+ctx_dim → H`, `g2: H → H`, `f1: H → H`.
    pub fn from_layers(
        seg_dim: usize,
        ctx_dim: usize,
        g1: DenseLayer,
        g2: DenseLayer,
        f1: DenseLayer,
        dropout: f32,
        rng: &mut SeededRng,
    ) -> Self {
        let hidden = g1.output_size();
        assert_eq!(g1.input_size(), 2 * seg_dim + ctx_dim, "g1 input size mismatch");
        assert_eq!(g2.input_size(), hidden, "g2 input size mismatch");
        assert_eq!(g2.output_size(), hidden, "g2 output size mismatch");
        assert_eq!(f1.input_size(), hidden, "f1 input size mismatch");
        assert_eq!(f1.output_size(), hidden, "f1 output size mismatch");
        Self {
            seg_dim,
            ctx_dim,
            hidden,
            g1,
            g_dropout: DropoutLayer::new(hidden, dropout, rng),
            g2,
            f1,
            f_dropout: DropoutLayer::new(hidden, dropout, rng),
            batch_size: 0,
            slots: CANONICAL_SLOTS,
            ops: Vec::new(),
            g1_out: Vec::new(),
            g1_dropped: Vec::new(),
            g2_out: Vec::new(),
            summed: Vec::new(),
            f1_out: Vec::new(),
        }
    }

    pub fn op_dim(&self) -> usize {
        2 * self.seg_dim + self.ctx_dim
    }

    pub fn output_dim(&self) -> usize {
        self.hidden
    }

    /// Compose relations in canonical slot order.
    pub fn forward(
        &mut self,
        y_pre: &[f32],
        y_alt: &[f32],
        y_cur: &[f32],
        y_ctx: &[f32],
        batch_size: usize,
    ) -> Vec<f32> {
        self.forward_ordered(y_pre, y_alt, y_cur, y_ctx, batch_size, CANONICAL_SLOTS)
    }

    /// Compose relations with the four slots built in the order given by `slots`.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is not a permutation of `0..4`.
    pub fn forward_ordered(
        &mut self,
        y_pre: &[f32],
        y_alt: &[f32],
        y_cur: &[f32],
        y_ctx: &[f32],
        batch_size: usize,
        slots: [usize; 4],
    ) -> Vec<f32> {
        let mut seen = [false; 4];
        for &s in &slots {
            assert!(s < 4 && !seen[s], "slots must be a permutation of 0..4");
            seen[s] = true;
        }

        let rows = batch_size * 4;
        let hidden = self.hidden;
        self.batch_size = batch_size;
        self.slots = slots;
        self.ops = relation_ops(
            [y_pre, y_alt, y_cur],
            y_ctx,
            batch_size,
            self.seg_dim,
            self.ctx_dim,
            slots,
        );

        self.g1_out.resize(rows * hidden, 0.0);
        self.g1.forward(&self.ops, &mut self.g1_out, rows);
        relu_inplace(&mut self.g1_out);
        self.g1_dropped.clone_from(&self.g1_out);
        self.g_dropout.apply_inplace(&mut self.g1_dropped, rows);

        self.g2_out.resize(rows * hidden, 0.0);
        self.g2.forward(&self.g1_dropped, &mut self.g2_out, rows);
        relu_inplace(&mut self.g2_out);

        self.summed.resize(batch_size * hidden, 0.0);
        for b in 0..batch_size {
            for h in 0..hidden {
                let at = |k: usize| self.g2_out[(b * 4 + k) * hidden + h];
                self.summed[b * hidden + h] = sum_sorted([at(0), at(1), at(2), at(3)]);
            }
        }

        self.f1_out.resize(batch_size * hidden, 0.0);
        self.f1.forward(&self.summed, &mut self.f1_out, batch_size);
        relu_inplace(&mut self.f1_out);
        let mut output = self.f1_out.clone();
        self.f_dropout.apply_inplace(&mut output, batch_size);
        output
    }

    /// Accumulate `g`/`f` gradients and return gradients for the four inputs.
    pub fn backward(&mut self, grad_output: &[f32]) -> RelationGrads {
        let batch_size = self.batch_size;
        let rows = batch_size * 4;
        let hidden = self.hidden;
        assert_eq!(grad_output.len(), batch_size * hidden, "grad_output len mismatch");

        let mut grad_f = grad_output.to_vec();
        self.f_dropout.backward_inplace(&mut grad_f);
        relu_backward_inplace(&self.f1_out, &mut grad_f);
        let mut grad_sum = vec![0.0f32; batch_size * hidden];
        self.f1.backward(&self.summed, &grad_f, Some(&mut grad_sum), batch_size);

        // d(sum)/d(g_i) = 1 for every slot
        let mut grad_g2 = Vec::with_capacity(rows * hidden);
        for b in 0..batch_size {
            for _ in 0..4 {
                grad_g2.extend_from_slice(&grad_sum[b * hidden..(b + 1) * hidden]);
            }
        }
        relu_backward_inplace(&self.g2_out, &mut grad_g2);
        let mut grad_g1 = vec![0.0f32; rows * hidden];
        self.g2.backward(&self.g1_dropped, &grad_g2, Some(&mut grad_g1), rows);
        self.g_dropout.backward_inplace(&mut grad_g1);
        relu_backward_inplace(&self.g1_out, &mut grad_g1);
        let op_dim = self.op_dim();
        let mut grad_ops = vec![0.0f32; rows * op_dim];
        self.g1.backward(&self.ops, &grad_g1, Some(&mut grad_ops), rows);

        let (seg_dim, ctx_dim) = (self.seg_dim, self.ctx_dim);
        let mut grads = [
            vec![0.0f32; batch_size * seg_dim],
            vec![0.0f32; batch_size * seg_dim],
            vec![0.0f32; batch_size * seg_dim],
        ];
        let mut grad_ctx = vec![0.0f32; batch_size * ctx_dim];
        for b in 0..batch_size {
            for (k, &slot) in self.slots.iter().enumerate() {
                let row = &grad_ops[(b * 4 + k) * op_dim..(b * 4 + k + 1) * op_dim];
                let (first, second) = RELATION_PAIRS[slot];
                accumulate(&mut grads[first][b * seg_dim..(b + 1) * seg_dim], &row[..seg_dim]);
                accumulate(
                    &mut grads[second][b * seg_dim..(b + 1) * seg_dim],
                    &row[seg_dim..2 * seg_dim],
                );
                accumulate(&mut grad_ctx[b * ctx_dim..(b + 1) * ctx_dim], &row[2 * seg_dim..]);
            }
        }

        let [pre, alt, cur] = grads;
        RelationGrads {
            pre,
            alt,
            cur,
            ctx: grad_ctx,
        }
    }

    pub fn parameters(&mut self, prefix: &str) -> Vec<Param<'_>> {
        let mut params = self.g1.parameters(&format!("{prefix}.g1"));
        params.extend(self.g2.parameters(&format!("{prefix}.g2")));
        params.extend(self.f1.parameters(&format!("{prefix}.f1")));
        params
    }

    pub fn zero_grad(&mut self) {
        self.g1.zero_grad();
        self.g2.zero_grad();
        self.f1.zero_grad();
    }

    pub fn set_training(&mut self, training: bool) {
        self.g_dropout.set_training(training);
        self.f_dropout.set_training(training);
    }

    pub fn parameter_count(&self) -> usize {
        self.g1.parameter_count() + self.g2.parameter_count() + self.f1.parameter_count()
    }
}

fn accumulate(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
