// train_causal.rs
// Multi-trial training of a causality classifier.
//
// Usage:
//   train_causal <config.json>
//
// Output (locations from the config's `paths`):
//   - <model_dir>/best_model.bin              run-wide best parameters
//   - <result_dir>/trial_<i>/{false,roc,prc}_valid.json, loss.json
//   - <result_dir>/metrics.csv
//
// Log verbosity follows RUST_LOG (default: info).

use anyhow::{Context, Result};
use causal_relation_networks::config::load_config;
use causal_relation_networks::data::{load_embeddings, load_records};
use causal_relation_networks::training::{ExperimentTracker, RunSummary};
use std::env;
use std::sync::Arc;
use tracing::info_span;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let summary = train_from_args(&args)?;

    match (summary.best_composite, summary.best_at) {
        (Some(score), Some((trial, epoch))) => println!(
            "best composite {:.4} at trial {} epoch {} -> {}",
            score,
            trial,
            epoch,
            summary.checkpoint_path.display()
        ),
        _ => println!("no epoch produced a defined composite score; no checkpoint written"),
    }
    println!("metrics table: {}", summary.metrics_table.display());
    Ok(())
}

/// Load everything named by the config at `args[1]` and run every trial.
fn train_from_args(args: &[String]) -> Result<RunSummary> {
    let config_path = args
        .get(1)
        .context("usage: train_causal <config.json>")?;
    let config = load_config(config_path)
        .with_context(|| format!("loading configuration {}", config_path))?;

    let train = load_records(&config.paths.train)
        .with_context(|| format!("loading training records {}", config.paths.train.display()))?;
    let valid = load_records(&config.paths.valid)
        .with_context(|| format!("loading validation records {}", config.paths.valid.display()))?;
    let embeddings = load_embeddings(&config.paths.embeddings)
        .with_context(|| format!("loading embeddings {}", config.paths.embeddings.display()))?;

    let span = info_span!("run", model = %config.model, seed = config.seed);
    let mut tracker = ExperimentTracker::new(&config, Arc::new(embeddings), &span)?;
    tracker.run(&train, &valid).context("training run failed")
}
