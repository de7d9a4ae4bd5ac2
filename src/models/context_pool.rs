//! Whole-sentence baseline: context encoder straight into the classifier head.

use crate::config::ExperimentConfig;
use crate::data::{Batch, EmbeddingTable};
use crate::error::{CausalError, Result};
use crate::models::{CausalModel, ClassifierHead, ContextEncoder};
use crate::optimizers::Param;
use crate::utils::SeededRng;
use std::sync::Arc;

/// Encodes the full sentence only and ignores the segment split.
pub struct ContextPool {
    embeddings: Arc<EmbeddingTable>,
    context: ContextEncoder,
    head: ClassifierHead,
}

impl ContextPool {
    pub const NAME: &'static str = "context_pool";

    pub fn new(
        config: &ExperimentConfig,
        embeddings: Arc<EmbeddingTable>,
        rng: &mut SeededRng,
    ) -> Result<Self> {
        if config.classifier.input_dim != config.context_hidden {
            return Err(CausalError::Config(format!(
                "classifier.input_dim ({}) must equal context_hidden ({})",
                config.classifier.input_dim, config.context_hidden
            )));
        }
        let context = ContextEncoder::new(
            config.max_len.full,
            embeddings.dim(),
            config.context_hidden,
            config.positional_encoding,
            config.emb_dropout,
            rng,
        );
        let head = ClassifierHead::new(&config.classifier, config.layer_dropout, rng);
        Ok(Self {
            embeddings,
            context,
            head,
        })
    }
}

impl CausalModel for ContextPool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn n_class(&self) -> usize {
        self.head.n_class()
    }

    fn forward(&mut self, batch: &Batch) -> Result<Vec<f32>> {
        let y_ctx = self.context.encode(&self.embeddings, batch)?;
        Ok(self.head.forward(&y_ctx, batch.size()))
    }

    fn backward(&mut self, grad_logits: &[f32]) {
        let grad_ctx = self.head.backward(grad_logits);
        self.context.backward(&grad_ctx);
    }

    fn set_training(&mut self, training: bool) {
        self.context.set_training(training);
        self.head.set_training(training);
    }

    fn zero_grad(&mut self) {
        self.context.zero_grad();
        self.head.zero_grad();
    }

    fn parameters(&mut self) -> Vec<Param<'_>> {
        let mut params = self.context.parameters("context");
        params.extend(self.head.parameters("head"));
        params
    }

    fn parameter_count(&self) -> usize {
        self.context.parameter_count() + self.head.parameter_count()
    }

    fn attention(&self, row: usize) -> Option<&[f32]> {
        self.context.attention_for(row)
    }
}
