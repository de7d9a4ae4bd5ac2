//! Multi-trial training with composite-score model selection
//!
//! Each trial trains a freshly initialised model for the configured number of
//! epochs, evaluating on the validation set after every epoch. An epoch whose
//! composite score (AUROC + AUPRC + F1) strictly beats the trial's best becomes
//! the trial's recorded result; if it also strictly beats every earlier epoch
//! of the run, the model parameters are written to the run's checkpoint.

use crate::architecture::{build_model, build_optimizer};
use crate::checkpoint::{save_checkpoint, BEST_MODEL_FILE};
use crate::config::ExperimentConfig;
use crate::data::{epoch_permutation, Batch, Dataset, EmbeddingTable};
use crate::error::Result;
use crate::models::CausalModel;
use crate::optimizers::{clip_grad_norm, Optimizer};
use crate::results::{self, METRICS_TABLE_FILE};
use crate::training::evaluator::{evaluate, EvalMetrics};
use crate::training::loss::LossKind;
use crate::utils::lr_scheduler::{total_steps, LRScheduler, WarmupCosine};
use crate::utils::SeededRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn, Span};

/// Outcome of comparing one epoch's composite score against the bests so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Not a strict improvement (or the score is undefined).
    Continue,
    /// New best for the current trial only.
    TrialBest,
    /// New best for the trial and for the whole run; checkpoint it.
    RunBest,
}

/// Tracks the trial-best and run-best composite scores.
///
/// `None` stands below every attainable score. Undefined (`None`/NaN) scores
/// never improve anything, and ties are not improvements.
#[derive(Debug, Clone, Default)]
pub struct BestSelector {
    trial_best: Option<f32>,
    run_best: Option<f32>,
}

impl BestSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-trial best; the run best is kept.
    pub fn start_trial(&mut self) {
        self.trial_best = None;
    }

    pub fn observe(&mut self, score: Option<f32>) -> Selection {
        let Some(score) = score.filter(|s| !s.is_nan()) else {
            return Selection::Continue;
        };
        if self.trial_best.is_some_and(|best| score <= best) {
            return Selection::Continue;
        }
        self.trial_best = Some(score);
        if self.run_best.is_some_and(|best| score <= best) {
            return Selection::TrialBest;
        }
        self.run_best = Some(score);
        Selection::RunBest
    }

    pub fn trial_best(&self) -> Option<f32> {
        self.trial_best
    }

    pub fn run_best(&self) -> Option<f32> {
        self.run_best
    }
}

/// What one trial produced. Trials and epochs are numbered from 1.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    pub trial: usize,
    /// Epoch of the best validation composite, if any epoch had a defined one
    pub best_epoch: Option<usize>,
    pub best: Option<EvalMetrics>,
    /// Mean training loss per epoch
    pub train_loss: Vec<f32>,
    /// Validation loss per epoch
    pub valid_loss: Vec<f32>,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub trials: Vec<TrialRecord>,
    pub best_composite: Option<f32>,
    /// (trial, epoch) of the checkpointed parameters
    pub best_at: Option<(usize, usize)>,
    pub checkpoint_path: PathBuf,
    pub checkpoint_writes: usize,
    pub metrics_table: PathBuf,
}

/// Runs the configured number of trials one after the other.
pub struct ExperimentTracker<'a> {
    config: &'a ExperimentConfig,
    embeddings: Arc<EmbeddingTable>,
    loss: LossKind,
    selector: BestSelector,
    span: Span,
    checkpoint_writes: usize,
    best_at: Option<(usize, usize)>,
}

impl<'a> ExperimentTracker<'a> {
    /// Events are emitted as children of `span`.
    pub fn new(
        config: &'a ExperimentConfig,
        embeddings: Arc<EmbeddingTable>,
        span: &Span,
    ) -> Result<Self> {
        Ok(Self {
            config,
            embeddings,
            loss: config.loss_kind()?,
            selector: BestSelector::new(),
            span: span.clone(),
            checkpoint_writes: 0,
            best_at: None,
        })
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.config.paths.model_dir.join(BEST_MODEL_FILE)
    }

    /// Train every trial, then write the metrics table.
    ///
    /// # Errors
    ///
    /// Any batch, model or I/O error aborts the run.
    pub fn run(&mut self, train: &Dataset, valid: &Dataset) -> Result<RunSummary> {
        let config = self.config;
        info!(
            parent: &self.span,
            model = %config.model,
            trials = config.trials,
            epochs = config.epochs,
            train = train.len(),
            valid = valid.len(),
            train_labels = ?train.label_counts(config.classifier.n_class),
            valid_labels = ?valid.label_counts(config.classifier.n_class),
            loss = self.loss.name(),
            "starting run"
        );

        let mut trials = Vec::with_capacity(config.trials);
        for trial in 1..=config.trials {
            trials.push(self.run_trial(trial, train, valid)?);
        }

        let metrics_table = config.paths.result_dir.join(METRICS_TABLE_FILE);
        results::write_metrics_table(&metrics_table, &trials)?;
        info!(
            parent: &self.span,
            best_composite = ?self.selector.run_best(),
            best_at = ?self.best_at,
            checkpoint_writes = self.checkpoint_writes,
            table = %metrics_table.display(),
            "run finished"
        );

        Ok(RunSummary {
            trials,
            best_composite: self.selector.run_best(),
            best_at: self.best_at,
            checkpoint_path: self.checkpoint_path(),
            checkpoint_writes: self.checkpoint_writes,
            metrics_table,
        })
    }

    fn run_trial(&mut self, trial: usize, train: &Dataset, valid: &Dataset) -> Result<TrialRecord> {
        let config = self.config;
        let span = info_span!(parent: &self.span, "trial", trial);

        let mut rng = SeededRng::new(config.seed.wrapping_add(trial as u64));
        let mut model = build_model(config, Arc::clone(&self.embeddings), &mut rng)?;
        let mut optimizer = build_optimizer(config)?;
        let steps = total_steps(config.epochs, train.len(), config.batch_train);
        let mut scheduler = WarmupCosine::new(config.learning_rate, config.warmup, steps);
        self.selector.start_trial();
        info!(
            parent: &span,
            parameters = model.parameter_count(),
            total_steps = steps,
            warmup_steps = scheduler.warmup_steps(),
            "trial start"
        );

        let mut record = TrialRecord {
            trial,
            best_epoch: None,
            best: None,
            train_loss: Vec::with_capacity(config.epochs),
            valid_loss: Vec::with_capacity(config.epochs),
        };

        for epoch in 1..=config.epochs {
            let train_loss = self.train_epoch(
                model.as_mut(),
                optimizer.as_mut(),
                &mut scheduler,
                train,
                trial,
                epoch,
                &span,
            )?;
            record.train_loss.push(train_loss);

            let metrics = evaluate(
                model.as_mut(),
                valid,
                config.batch_eval,
                &config.max_len,
                &self.loss,
            )?;
            record.valid_loss.push(metrics.loss);
            let composite = metrics.composite();
            info!(
                parent: &span,
                epoch,
                train_loss,
                valid_loss = metrics.loss,
                accuracy = metrics.accuracy,
                precision = metrics.precision,
                recall = metrics.recall,
                f1 = metrics.f1,
                auroc = ?metrics.auroc,
                auprc = ?metrics.auprc,
                composite = ?composite,
                "validation"
            );
            if composite.is_none() {
                warn!(parent: &span, epoch, "composite score undefined, epoch not eligible as best");
            }

            match self.selector.observe(composite) {
                Selection::Continue => {}
                selection => {
                    info!(parent: &span, epoch, composite = ?composite, "new trial best");
                    record.best_epoch = Some(epoch);
                    record.best = Some(metrics);
                    if selection == Selection::RunBest {
                        let path = self.checkpoint_path();
                        save_checkpoint(&path, model.as_mut())?;
                        self.checkpoint_writes += 1;
                        self.best_at = Some((trial, epoch));
                        info!(parent: &span, epoch, path = %path.display(), "checkpoint written");
                    }
                }
            }
        }

        let dir = config.paths.result_dir.join(format!("trial_{trial}"));
        results::write_loss_curves(&dir, &record.train_loss, &record.valid_loss)?;
        match &record.best {
            Some(best) => {
                results::write_eval_artifacts(&dir, "valid", best)?;
                results::write_predictions(&dir, "valid", best)?;
                info!(
                    parent: &span,
                    best_epoch = ?record.best_epoch,
                    accuracy = best.accuracy,
                    f1 = best.f1,
                    auroc = ?best.auroc,
                    auprc = ?best.auprc,
                    "trial done"
                );
            }
            None => warn!(parent: &span, "no epoch produced a defined composite score"),
        }
        Ok(record)
    }

    /// One pass over the training set in a fresh random order; returns the mean loss.
    #[allow(clippy::too_many_arguments)]
    fn train_epoch(
        &self,
        model: &mut dyn CausalModel,
        optimizer: &mut dyn Optimizer,
        scheduler: &mut WarmupCosine,
        train: &Dataset,
        trial: usize,
        epoch: usize,
        span: &Span,
    ) -> Result<f32> {
        let config = self.config;
        let n_class = model.n_class();
        model.set_training(true);

        let order = epoch_permutation(train.len(), config.seed, trial, epoch);
        let mut epoch_sum = 0.0f64;
        let mut running = 0.0f32;
        for (step, chunk) in order.chunks(config.batch_train).enumerate() {
            let batch = Batch::gather(train, chunk, &config.max_len, n_class)?;

            optimizer.set_learning_rate(scheduler.get_lr());
            model.zero_grad();
            let logits = model.forward(&batch)?;
            let out = self.loss.compute(&logits, &batch.labels, n_class);
            model.backward(&out.grad);
            {
                let mut params = model.parameters();
                clip_grad_norm(&mut params, config.clip);
                optimizer.step(&mut params);
            }
            scheduler.step();

            epoch_sum += out.loss as f64 * batch.size() as f64;
            running += out.loss;
            if (step + 1) % config.log_period == 0 {
                info!(
                    parent: span,
                    epoch,
                    batch = step + 1,
                    loss = running / config.log_period as f32,
                    lr = optimizer.learning_rate(),
                    "running loss"
                );
                running = 0.0;
            }
        }

        Ok(if train.is_empty() {
            0.0
        } else {
            (epoch_sum / train.len() as f64) as f32
        })
    }
}
