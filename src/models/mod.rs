//! Causality classifiers and the components they are assembled from
//!
//! - [`SegmentEncoder`]: multi-width convolution + max-over-time over one segment
//! - [`ContextEncoder`]: attention pooling over the whole (position-encoded) sentence
//! - [`RelationComposer`]: four directed segment pairs, shared `g`, sum, shared `f`
//! - [`ClassifierHead`]: optional hidden layer and the output map to class scores
//!
//! Two complete models are registered in [`crate::architecture`]:
//! [`RelationNetwork`] and [`ContextPool`].

pub mod classifier;
pub mod context_encoder;
pub mod context_pool;
pub mod relation;
pub mod relation_network;
pub mod segment_encoder;

pub use classifier::ClassifierHead;
pub use context_encoder::ContextEncoder;
pub use context_pool::ContextPool;
pub use relation::{RelationComposer, RelationGrads, RELATION_PAIRS};
pub use relation_network::RelationNetwork;
pub use segment_encoder::SegmentEncoder;

use crate::data::Batch;
use crate::error::Result;
use crate::optimizers::Param;

/// A trainable classifier over token batches.
///
/// `backward` consumes the caches written by the preceding `forward`, so the two
/// must be called in pairs on the same batch.
pub trait CausalModel {
    /// Registry name of the model.
    fn name(&self) -> &'static str;

    /// Number of output classes.
    fn n_class(&self) -> usize;

    /// Class scores (raw logits), `batch.size() × n_class`, in batch order.
    ///
    /// # Errors
    ///
    /// Fails on token ids outside the embedding table or batch fields whose
    /// width differs from the model's configured maximum lengths.
    fn forward(&mut self, batch: &Batch) -> Result<Vec<f32>>;

    /// Accumulate parameter gradients for `grad_logits` (same shape as the logits).
    fn backward(&mut self, grad_logits: &[f32]);

    /// Enable or disable dropout.
    fn set_training(&mut self, training: bool);

    /// Clear all accumulated gradients.
    fn zero_grad(&mut self);

    /// Every trainable tensor, in a fixed order with stable names.
    fn parameters(&mut self) -> Vec<Param<'_>>;

    /// Total count of trainable scalars.
    fn parameter_count(&self) -> usize;

    /// Context attention weights from the last forward pass for batch row `row`.
    fn attention(&self, _row: usize) -> Option<&[f32]> {
        None
    }
}
