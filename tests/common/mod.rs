//! Small configurations and synthetic data shared by the integration tests.
#![allow(dead_code)]

use causal_relation_networks::config::ExperimentConfig;
use causal_relation_networks::data::{Dataset, EmbeddingTable, Sample};
use causal_relation_networks::utils::SeededRng;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub const VOCAB: usize = 24;
pub const EMB_DIM: usize = 4;
/// Connective token that marks a causal sample in the synthetic data.
pub const CAUSAL_CONNECTIVE: u32 = 7;

/// A small but complete relation-network configuration writing under `dir`.
pub fn tiny_config_json(dir: &Path) -> Value {
    json!({
        "model": "relation_network",
        "seed": 7,
        "trials": 2,
        "epochs": 2,
        "batch_train": 4,
        "batch_eval": 5,
        "learning_rate": 0.01,
        "warmup": 0.25,
        "clip": 1.0,
        "loss_type": "focal",
        "emb_dropout": 0.1,
        "layer_dropout": 0.1,
        "max_len": { "full": 10, "pre": 5, "alt": 3, "cur": 5 },
        "n_filter": 3,
        "kernel_widths": [2, 3],
        "context_hidden": 5,
        "relation_hidden": 6,
        "classifier": { "input_dim": 6, "hidden": 4, "n_class": 2 },
        "log_period": 2,
        "paths": {
            "train": dir.join("train.json"),
            "valid": dir.join("valid.json"),
            "test": dir.join("test.json"),
            "embeddings": dir.join("embeddings.json"),
            "model_dir": dir.join("models"),
            "result_dir": dir.join("results")
        }
    })
}

pub fn tiny_config(dir: &Path) -> ExperimentConfig {
    serde_json::from_value(tiny_config_json(dir)).unwrap()
}

pub fn tiny_table() -> Arc<EmbeddingTable> {
    let mut rng = SeededRng::new(11);
    Arc::new(EmbeddingTable::random(VOCAB, EMB_DIM, &mut rng).unwrap())
}

/// `n` samples alternating between the two labels, ids starting at `first_id`.
///
/// Causal samples carry [`CAUSAL_CONNECTIVE`] in their alt span.
pub fn synthetic_dataset(n: usize, first_id: u64, seed: u64) -> Dataset {
    let mut rng = SeededRng::new(seed);
    let token = |rng: &mut SeededRng| 8 + rng.gen_usize(VOCAB - 8) as u32;
    let samples = (0..n)
        .map(|i| {
            let label = i % 2;
            let pre_len = 1 + rng.gen_usize(4);
            let cur_len = 1 + rng.gen_usize(5);
            let tokens_pre: Vec<u32> = (0..pre_len).map(|_| token(&mut rng)).collect();
            let tokens_cur: Vec<u32> = (0..cur_len).map(|_| token(&mut rng)).collect();
            let connective = if label == 1 { CAUSAL_CONNECTIVE } else { 2 + rng.gen_usize(5) as u32 };
            let tokens_alt = vec![connective];

            let mut tokens = tokens_pre.clone();
            tokens.extend_from_slice(&tokens_alt);
            tokens.extend_from_slice(&tokens_cur);
            Sample {
                id: first_id + i as u64,
                length: tokens.len(),
                tokens,
                tokens_pre,
                tokens_alt,
                tokens_cur,
                label,
            }
        })
        .collect();
    Dataset::new(samples)
}

/// Every sample labelled `label`.
pub fn single_class_dataset(n: usize, label: usize) -> Dataset {
    let samples = synthetic_dataset(n, 500, 3)
        .samples()
        .iter()
        .cloned()
        .map(|mut s| {
            s.label = label;
            s
        })
        .collect();
    Dataset::new(samples)
}
