//! The segment relation network.

use crate::config::ExperimentConfig;
use crate::data::{Batch, EmbeddingTable, Field};
use crate::error::{CausalError, Result};
use crate::models::{CausalModel, ClassifierHead, ContextEncoder, RelationComposer, SegmentEncoder};
use crate::optimizers::Param;
use crate::utils::SeededRng;
use std::sync::Arc;

/// Three segment encoders and a context encoder feeding the relation composer,
/// followed by the classifier head.
pub struct RelationNetwork {
    embeddings: Arc<EmbeddingTable>,
    seg_pre: SegmentEncoder,
    seg_alt: SegmentEncoder,
    seg_cur: SegmentEncoder,
    context: ContextEncoder,
    relation: RelationComposer,
    head: ClassifierHead,
}

impl RelationNetwork {
    pub const NAME: &'static str = "relation_network";

    pub fn new(
        config: &ExperimentConfig,
        embeddings: Arc<EmbeddingTable>,
        rng: &mut SeededRng,
    ) -> Result<Self> {
        if config.classifier.input_dim != config.relation_hidden {
            return Err(CausalError::Config(format!(
                "classifier.input_dim ({}) must equal relation_hidden ({})",
                config.classifier.input_dim, config.relation_hidden
            )));
        }
        let emb_dim = embeddings.dim();
        let mut segment = |field: Field| {
            SegmentEncoder::new(
                field,
                field.max_len(&config.max_len),
                emb_dim,
                config.n_filter,
                &config.kernel_widths,
                config.emb_dropout,
                rng,
            )
        };
        let seg_pre = segment(Field::Pre);
        let seg_alt = segment(Field::Alt);
        let seg_cur = segment(Field::Cur);

        let context = ContextEncoder::new(
            config.max_len.full,
            emb_dim,
            config.context_hidden,
            config.positional_encoding,
            config.emb_dropout,
            rng,
        );
        let relation = RelationComposer::new(
            seg_pre.output_dim(),
            context.output_dim(),
            config.relation_hidden,
            config.layer_dropout,
            rng,
        );
        let head = ClassifierHead::new(&config.classifier, config.layer_dropout, rng);

        Ok(Self {
            embeddings,
            seg_pre,
            seg_alt,
            seg_cur,
            context,
            relation,
            head,
        })
    }
}

impl CausalModel for RelationNetwork {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn n_class(&self) -> usize {
        self.head.n_class()
    }

    fn forward(&mut self, batch: &Batch) -> Result<Vec<f32>> {
        let table = &self.embeddings;
        let y_pre = self.seg_pre.encode(table, batch)?;
        let y_alt = self.seg_alt.encode(table, batch)?;
        let y_cur = self.seg_cur.encode(table, batch)?;
        let y_ctx = self.context.encode(table, batch)?;
        let rel = self
            .relation
            .forward(&y_pre, &y_alt, &y_cur, &y_ctx, batch.size());
        Ok(self.head.forward(&rel, batch.size()))
    }

    fn backward(&mut self, grad_logits: &[f32]) {
        let grad_rel = self.head.backward(grad_logits);
        let grads = self.relation.backward(&grad_rel);
        self.seg_pre.backward(&grads.pre);
        self.seg_alt.backward(&grads.alt);
        self.seg_cur.backward(&grads.cur);
        self.context.backward(&grads.ctx);
    }

    fn set_training(&mut self, training: bool) {
        self.seg_pre.set_training(training);
        self.seg_alt.set_training(training);
        self.seg_cur.set_training(training);
        self.context.set_training(training);
        self.relation.set_training(training);
        self.head.set_training(training);
    }

    fn zero_grad(&mut self) {
        self.seg_pre.zero_grad();
        self.seg_alt.zero_grad();
        self.seg_cur.zero_grad();
        self.context.zero_grad();
        self.relation.zero_grad();
        self.head.zero_grad();
    }

    fn parameters(&mut self) -> Vec<Param<'_>> {
        let mut params = self.seg_pre.parameters("seg_pre");
        params.extend(self.seg_alt.parameters("seg_alt"));
        params.extend(self.seg_cur.parameters("seg_cur"));
        params.extend(self.context.parameters("context"));
        params.extend(self.relation.parameters("relation"));
        params.extend(self.head.parameters("head"));
        params
    }

    fn parameter_count(&self) -> usize {
        self.seg_pre.parameter_count()
            + self.seg_alt.parameter_count()
            + self.seg_cur.parameter_count()
            + self.context.parameter_count()
            + self.relation.parameter_count()
            + self.head.parameter_count()
    }

    fn attention(&self, row: usize) -> Option<&[f32]> {
        self.context.attention_for(row)
    }
}
