// evaluate_causal.rs
// Evaluate the run-wide best checkpoint on the test split.
//
// Usage:
//   evaluate_causal <config.json>
//
// Reads <model_dir>/best_model.bin and paths.test, writes
// <result_dir>/{false,roc,prc,predictions}_test.json and prints the test metrics.
//
// Log verbosity follows RUST_LOG (default: info).

use anyhow::{Context, Result};
use causal_relation_networks::architecture::build_model;
use causal_relation_networks::checkpoint::{load_checkpoint, BEST_MODEL_FILE};
use causal_relation_networks::config::load_config;
use causal_relation_networks::data::{load_embeddings, load_records};
use causal_relation_networks::results::{write_eval_artifacts, write_predictions};
use causal_relation_networks::training::{evaluate, EvalMetrics};
use causal_relation_networks::utils::SeededRng;
use std::env;
use std::sync::Arc;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let metrics = evaluate_from_args(&args)?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

/// Restore the best checkpoint for the config at `args[1]` and measure it on the test split.
fn evaluate_from_args(args: &[String]) -> Result<EvalMetrics> {
    let config_path = args
        .get(1)
        .context("usage: evaluate_causal <config.json>")?;
    let config = load_config(config_path)
        .with_context(|| format!("loading configuration {}", config_path))?;
    let test_path = config
        .paths
        .test
        .clone()
        .context("paths.test is not set in the configuration")?;

    let test = load_records(&test_path)
        .with_context(|| format!("loading test records {}", test_path.display()))?;
    let embeddings = load_embeddings(&config.paths.embeddings)
        .with_context(|| format!("loading embeddings {}", config.paths.embeddings.display()))?;

    let span = info_span!("evaluate", model = %config.model);
    let mut rng = SeededRng::new(config.seed);
    let mut model = build_model(&config, Arc::new(embeddings), &mut rng)?;
    let checkpoint = config.paths.model_dir.join(BEST_MODEL_FILE);
    load_checkpoint(&checkpoint, model.as_mut())
        .with_context(|| format!("loading checkpoint {}", checkpoint.display()))?;

    let loss = config.loss_kind()?;
    let metrics = evaluate(
        model.as_mut(),
        &test,
        config.batch_eval,
        &config.max_len,
        &loss,
    )?;
    write_eval_artifacts(&config.paths.result_dir, "test", &metrics)
        .context("writing test artifacts")?;
    write_predictions(&config.paths.result_dir, "test", &metrics)
        .context("writing test predictions")?;

    info!(
        parent: &span,
        samples = test.len(),
        loss = metrics.loss,
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        auroc = ?metrics.auroc,
        auprc = ?metrics.auprc,
        "test evaluation"
    );
    Ok(metrics)
}
