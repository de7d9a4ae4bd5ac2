//! Model and optimizer registries
//!
//! Configuration files name the model and the optimizer by string. Both names are
//! resolved here against fixed tables of constructors, so an unknown name fails at
//! configuration time instead of somewhere inside a trial.

use crate::config::ExperimentConfig;
use crate::data::EmbeddingTable;
use crate::error::{CausalError, Result};
use crate::models::{CausalModel, ContextPool, RelationNetwork};
use crate::optimizers::{Adam, Optimizer, SGD};
use crate::utils::SeededRng;
use std::sync::Arc;

/// Constructor signature shared by every registered model.
pub type ModelBuilder =
    fn(&ExperimentConfig, Arc<EmbeddingTable>, &mut SeededRng) -> Result<Box<dyn CausalModel>>;

/// A registered model variant.
pub struct ModelEntry {
    /// Name used in the `model` field of the configuration
    pub name: &'static str,
    pub build: ModelBuilder,
    /// Width of the representation the model hands to its classifier head.
    /// `classifier.input_dim` must equal this.
    pub head_input_dim: fn(&ExperimentConfig) -> usize,
}

fn build_relation_network(
    config: &ExperimentConfig,
    embeddings: Arc<EmbeddingTable>,
    rng: &mut SeededRng,
) -> Result<Box<dyn CausalModel>> {
    Ok(Box::new(RelationNetwork::new(config, embeddings, rng)?))
}

fn build_context_pool(
    config: &ExperimentConfig,
    embeddings: Arc<EmbeddingTable>,
    rng: &mut SeededRng,
) -> Result<Box<dyn CausalModel>> {
    Ok(Box::new(ContextPool::new(config, embeddings, rng)?))
}

fn relation_width(config: &ExperimentConfig) -> usize {
    config.relation_hidden
}

fn context_width(config: &ExperimentConfig) -> usize {
    config.context_hidden
}

/// All registered models.
pub const MODELS: &[ModelEntry] = &[
    ModelEntry {
        name: RelationNetwork::NAME,
        build: build_relation_network,
        head_input_dim: relation_width,
    },
    ModelEntry {
        name: ContextPool::NAME,
        build: build_context_pool,
        head_input_dim: context_width,
    },
];

/// Registered optimizer names.
pub const OPTIMIZERS: &[&str] = &["adam", "sgd"];

fn model_names() -> String {
    MODELS.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
}

/// Finds the registry entry for `name`.
///
/// # Errors
///
/// [`CausalError::Config`] listing the valid names when `name` is not registered.
pub fn lookup_model(name: &str) -> Result<&'static ModelEntry> {
    MODELS.iter().find(|m| m.name == name).ok_or_else(|| {
        CausalError::config(format!(
            "Invalid model '{}'. Must be one of: {}",
            name,
            model_names()
        ))
    })
}

/// Builds a fresh model for `config.model` with weights drawn from `rng`.
///
/// # Examples
///
/// ```no_run
/// use causal_relation_networks::architecture::build_model;
/// use causal_relation_networks::config::load_config;
/// use causal_relation_networks::data::load_embeddings;
/// use causal_relation_networks::utils::SeededRng;
/// use std::sync::Arc;
///
/// let config = load_config("config/relation_network.json").unwrap();
/// let table = Arc::new(load_embeddings(&config.paths.embeddings).unwrap());
/// let mut rng = SeededRng::new(config.seed);
/// let model = build_model(&config, table, &mut rng).unwrap();
/// assert_eq!(model.name(), "relation_network");
/// ```
pub fn build_model(
    config: &ExperimentConfig,
    embeddings: Arc<EmbeddingTable>,
    rng: &mut SeededRng,
) -> Result<Box<dyn CausalModel>> {
    let entry = lookup_model(&config.model)?;
    (entry.build)(config, embeddings, rng)
}

/// Checks that `name` is a registered optimizer.
pub fn lookup_optimizer(name: &str) -> Result<&'static str> {
    OPTIMIZERS
        .iter()
        .copied()
        .find(|&o| o == name)
        .ok_or_else(|| {
            CausalError::config(format!(
                "Invalid optimizer '{}'. Must be one of: {}",
                name,
                OPTIMIZERS.join(", ")
            ))
        })
}

/// Builds the optimizer named by `config.optimizer` with the configured
/// learning rate and weight decay.
pub fn build_optimizer(config: &ExperimentConfig) -> Result<Box<dyn Optimizer>> {
    let optimizer: Box<dyn Optimizer> = match lookup_optimizer(&config.optimizer)? {
        "adam" => Box::new(Adam::with_defaults(config.learning_rate, config.weight_decay)),
        "sgd" => Box::new(SGD::new(config.learning_rate, config.weight_decay)),
        other => {
            return Err(CausalError::config(format!(
                "optimizer '{}' has no constructor",
                other
            )))
        }
    };
    Ok(optimizer)
}
