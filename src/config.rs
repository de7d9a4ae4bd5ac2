//! Experiment configuration
//!
//! The whole run is described by one JSON file deserialized into an
//! [`ExperimentConfig`]. It is loaded and validated once, then passed by
//! reference to every component; nothing mutates it afterwards.

use crate::architecture;
use crate::error::{CausalError, Result};
use crate::training::loss::LossKind;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum token count per sample field. Longer inputs are rejected, shorter ones padded.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MaxLenConfig {
    pub full: usize,
    pub pre: usize,
    pub alt: usize,
    pub cur: usize,
}

impl Default for MaxLenConfig {
    fn default() -> Self {
        Self {
            full: 128,
            pre: 64,
            alt: 8,
            cur: 64,
        }
    }
}

/// Final classifier dimensions, stated explicitly rather than inferred from the encoder.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Width of the representation fed to the head; must match the model's output.
    pub input_dim: usize,
    /// Optional hidden layer: Linear → ReLU → Dropout before the output map.
    #[serde(default)]
    pub hidden: Option<usize>,
    #[serde(default = "default_n_class")]
    pub n_class: usize,
}

/// Input and output locations.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PathsConfig {
    pub train: PathBuf,
    pub valid: PathBuf,
    #[serde(default)]
    pub test: Option<PathBuf>,
    pub embeddings: PathBuf,
    pub model_dir: PathBuf,
    pub result_dir: PathBuf,
}

/// Configuration for one multi-trial experiment.
///
/// # Example
///
/// ```json
/// {
///   "model": "relation_network",
///   "trials": 3,
///   "epochs": 10,
///   "loss_type": "focal",
///   "classifier": { "input_dim": 128, "hidden": 64, "n_class": 2 },
///   "paths": {
///     "train": "data/train.json",
///     "valid": "data/valid.json",
///     "embeddings": "data/embeddings.json",
///     "model_dir": "out/models",
///     "result_dir": "out/results"
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    /// Registered model name: "relation_network" or "context_pool"
    pub model: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_train")]
    pub batch_train: usize,
    #[serde(default = "default_batch_eval")]
    pub batch_eval: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Registered optimizer name: "adam" or "sgd"
    #[serde(default = "default_optimizer")]
    pub optimizer: String,
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f32,
    /// Fraction of total optimizer steps spent in linear warmup
    #[serde(default = "default_warmup")]
    pub warmup: f32,
    /// Global gradient-norm bound; values <= 0 disable clipping
    #[serde(default = "default_clip")]
    pub clip: f32,
    /// "focal" or "weighted_cross_entropy"
    #[serde(default = "default_loss_type")]
    pub loss_type: String,
    #[serde(default = "default_focal_gamma")]
    pub focal_gamma: f32,
    #[serde(default = "default_focal_alpha")]
    pub focal_alpha: f32,
    #[serde(default = "default_class_weights")]
    pub class_weights: Vec<f32>,
    #[serde(default = "default_emb_dropout")]
    pub emb_dropout: f32,
    #[serde(default = "default_layer_dropout")]
    pub layer_dropout: f32,
    #[serde(default)]
    pub max_len: MaxLenConfig,
    #[serde(default = "default_n_filter")]
    pub n_filter: usize,
    #[serde(default = "default_kernel_widths")]
    pub kernel_widths: Vec<usize>,
    #[serde(default = "default_context_hidden")]
    pub context_hidden: usize,
    /// Add sinusoidal position encodings to the full sequence
    #[serde(default = "default_true")]
    pub positional_encoding: bool,
    #[serde(default = "default_relation_hidden")]
    pub relation_hidden: usize,
    pub classifier: ClassifierConfig,
    /// Batches between running-loss log lines
    #[serde(default = "default_log_period")]
    pub log_period: usize,
    pub paths: PathsConfig,
}

fn default_seed() -> u64 {
    23333
}
fn default_trials() -> usize {
    3
}
fn default_epochs() -> usize {
    10
}
fn default_batch_train() -> usize {
    32
}
fn default_batch_eval() -> usize {
    64
}
fn default_learning_rate() -> f32 {
    1e-4
}
fn default_optimizer() -> String {
    "adam".to_string()
}
fn default_weight_decay() -> f32 {
    3e-4
}
fn default_warmup() -> f32 {
    0.5
}
fn default_clip() -> f32 {
    0.35
}
fn default_loss_type() -> String {
    "focal".to_string()
}
fn default_focal_gamma() -> f32 {
    4.0
}
fn default_focal_alpha() -> f32 {
    0.75
}
fn default_class_weights() -> Vec<f32> {
    vec![0.2, 0.8]
}
fn default_emb_dropout() -> f32 {
    0.3
}
fn default_layer_dropout() -> f32 {
    0.5
}
fn default_n_filter() -> usize {
    50
}
fn default_kernel_widths() -> Vec<usize> {
    vec![2, 3, 4]
}
fn default_context_hidden() -> usize {
    128
}
fn default_relation_hidden() -> usize {
    128
}
fn default_true() -> bool {
    true
}
fn default_n_class() -> usize {
    2
}
fn default_log_period() -> usize {
    1000
}

impl ExperimentConfig {
    /// Output width of the segment encoders: filters × kernel widths.
    pub fn segment_dim(&self) -> usize {
        self.n_filter * self.kernel_widths.len()
    }

    /// Loss selected by `loss_type`.
    pub fn loss_kind(&self) -> Result<LossKind> {
        LossKind::from_config(self)
    }
}

/// Loads and validates an experiment configuration from a JSON file.
///
/// Parse failures, including missing required fields, are reported as
/// [`CausalError::Config`] naming the file.
///
/// ```no_run
/// use causal_relation_networks::config::load_config;
///
/// let cfg = load_config("config/relation_network.json").unwrap();
/// assert_eq!(cfg.model, "relation_network");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ExperimentConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| CausalError::config(format!("cannot read {}: {}", path.display(), e)))?;
    let config: ExperimentConfig = serde_json::from_str(&contents)
        .map_err(|e| CausalError::config(format!("{}: {}", path.display(), e)))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks every field constraint and cross-field dimension contract.
pub fn validate_config(config: &ExperimentConfig) -> Result<()> {
    let entry = architecture::lookup_model(&config.model)?;
    architecture::lookup_optimizer(&config.optimizer)?;
    let loss = config.loss_kind()?;

    for (name, value) in [
        ("trials", config.trials),
        ("epochs", config.epochs),
        ("batch_train", config.batch_train),
        ("batch_eval", config.batch_eval),
        ("n_filter", config.n_filter),
        ("context_hidden", config.context_hidden),
        ("relation_hidden", config.relation_hidden),
        ("log_period", config.log_period),
    ] {
        if value == 0 {
            return Err(CausalError::config(format!("{} must be positive", name)));
        }
    }

    if config.learning_rate <= 0.0 {
        return Err(CausalError::config("learning_rate must be positive"));
    }
    if config.weight_decay < 0.0 {
        return Err(CausalError::config("weight_decay must be non-negative"));
    }
    if !(0.0..1.0).contains(&config.warmup) {
        return Err(CausalError::config("warmup must be in range [0.0, 1.0)"));
    }
    for (name, rate) in [
        ("emb_dropout", config.emb_dropout),
        ("layer_dropout", config.layer_dropout),
    ] {
        if !(0.0..1.0).contains(&rate) {
            return Err(CausalError::config(format!(
                "{} must be in range [0.0, 1.0)",
                name
            )));
        }
    }

    if config.kernel_widths.is_empty() {
        return Err(CausalError::config("kernel_widths must not be empty"));
    }
    if config.kernel_widths.contains(&0) {
        return Err(CausalError::config("kernel widths must be positive"));
    }
    let mut distinct = config.kernel_widths.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != config.kernel_widths.len() {
        return Err(CausalError::config("kernel widths must be distinct"));
    }
    let widest = config.kernel_widths.iter().copied().max().unwrap_or(0);
    for (field, len) in [
        ("full", config.max_len.full),
        ("pre", config.max_len.pre),
        ("alt", config.max_len.alt),
        ("cur", config.max_len.cur),
    ] {
        if len < widest {
            return Err(CausalError::config(format!(
                "max_len.{} = {} is shorter than the widest kernel ({})",
                field, len, widest
            )));
        }
    }

    if config.classifier.n_class != 2 {
        return Err(CausalError::config(format!(
            "classifier.n_class must be 2 (binary causal label), got {}",
            config.classifier.n_class
        )));
    }
    if config.classifier.hidden == Some(0) {
        return Err(CausalError::config("classifier.hidden must be positive when set"));
    }
    let expected_input = (entry.head_input_dim)(config);
    if config.classifier.input_dim != expected_input {
        return Err(CausalError::config(format!(
            "classifier.input_dim = {} does not match the {} output width {}",
            config.classifier.input_dim, config.model, expected_input
        )));
    }

    let weights = &config.class_weights;
    if weights.len() != config.classifier.n_class {
        return Err(CausalError::config(format!(
            "class_weights has {} entries, expected {}",
            weights.len(),
            config.classifier.n_class
        )));
    }
    if weights.iter().any(|&w| w < 0.0) || weights.iter().sum::<f32>() <= 0.0 {
        return Err(CausalError::config(
            "class_weights must be non-negative with a positive sum",
        ));
    }
    if let LossKind::Focal { gamma, alpha } = loss {
        if gamma < 0.0 {
            return Err(CausalError::config("focal_gamma must be non-negative"));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(CausalError::config("focal_alpha must be in range [0.0, 1.0]"));
        }
    }

    Ok(())
}
