//! Causal Relation Networks
//!
//! Classifies a sentence split into three segments (preceding clause, connective "alt"
//! span, current clause) as causal or non-causal. Each segment is encoded by its own
//! multi-width convolutional encoder, the whole sequence is summarised by an attention
//! pooling context encoder, and four directed segment pairs are composed by a relation
//! network before classification.
//!
//! # Modules
//!
//! - `layers`: Layer trait and implementations (Dense, Conv1D, Dropout)
//! - `models`: Segment/context encoders, relation composer and the full classifiers
//! - `optimizers`: Optimizer trait, Adam and SGD, gradient clipping
//! - `training`: Loss functions, evaluator and the multi-trial experiment tracker
//! - `data`: Samples, batches, the frozen embedding table and the length/epoch permutations
//! - `utils`: RNG, activations, GEMM helper and the warmup-cosine LR scheduler
//! - `config`: Experiment configuration loading and validation
//! - `architecture`: Model and optimizer registries mapping configuration names to constructors
//! - `checkpoint`: Named-tensor checkpoint files
//! - `results`: JSON/CSV result artifacts

pub mod architecture;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod models;
pub mod optimizers;
pub mod results;
pub mod training;
pub mod utils;

pub use error::{CausalError, Result};
