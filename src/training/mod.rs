//! Losses, evaluation and the multi-trial experiment loop.

pub mod evaluator;
pub mod experiment;
pub mod loss;

pub use evaluator::{evaluate, EvalMetrics, PrCurve, Prediction, RocCurve};
pub use experiment::{BestSelector, ExperimentTracker, RunSummary, Selection, TrialRecord};
pub use loss::{LossKind, LossOutput};
