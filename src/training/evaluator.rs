//! Validation and test metrics
//!
//! One sequential pass over a dataset in evaluation mode, then standard binary
//! metrics on the collected predictions. Class 1 is the positive (causal) class.
//!
//! The ROC and precision-recall curves come from a threshold sweep over the
//! distinct predicted probabilities in descending order:
//!
//! - ROC points start at (0, 0) and end at (1, 1).
//! - PR points are truncated once full recall is reached, listed with recall
//!   decreasing, and end at (precision 1, recall 0).
//!
//! Both areas use the trapezoid rule. When only one class is present the curves
//! are undefined: both areas are `None`, the curves are empty and
//! [`EvalMetrics::composite`] is `None`.

use crate::config::MaxLenConfig;
use crate::data::{Batch, Dataset};
use crate::error::Result;
use crate::models::CausalModel;
use crate::training::loss::LossKind;
use serde::Serialize;

/// (FPR, TPR) points of a ROC curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f32>,
    pub tpr: Vec<f32>,
}

/// (precision, recall) points of a precision-recall curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrCurve {
    pub precision: Vec<f32>,
    pub recall: Vec<f32>,
}

/// Outcome for one sample, in dataset order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: u64,
    pub label: usize,
    pub predicted: usize,
    /// Probability of the causal class
    pub score: f32,
    /// Context attention over the sample's valid tokens, when the model pools with attention
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attention: Vec<f32>,
}

/// Everything measured in one evaluation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalMetrics {
    /// Mean loss per sample
    pub loss: f32,
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub auroc: Option<f32>,
    pub auprc: Option<f32>,
    pub false_positives: Vec<u64>,
    pub false_negatives: Vec<u64>,
    #[serde(skip)]
    pub roc: RocCurve,
    #[serde(skip)]
    pub pr: PrCurve,
    #[serde(skip)]
    pub predictions: Vec<Prediction>,
}

impl EvalMetrics {
    /// `AUROC + AUPRC + F1`, or `None` when either area is undefined.
    pub fn composite(&self) -> Option<f32> {
        let score = self.auroc? + self.auprc? + self.f1;
        score.is_finite().then_some(score)
    }
}

/// Runs `model` over `dataset` in evaluation mode and measures it.
///
/// Samples are visited in dataset order, `batch_size` at a time. The model is
/// left in evaluation mode.
///
/// # Errors
///
/// Propagates batch assembly and forward-pass errors.
pub fn evaluate(
    model: &mut dyn CausalModel,
    dataset: &Dataset,
    batch_size: usize,
    max_len: &MaxLenConfig,
    loss: &LossKind,
) -> Result<EvalMetrics> {
    assert!(batch_size > 0, "batch_size must be positive");
    model.set_training(false);
    let n_class = model.n_class();

    let mut ids = Vec::with_capacity(dataset.len());
    let mut labels = Vec::with_capacity(dataset.len());
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut scores = Vec::with_capacity(dataset.len());
    let mut attention = Vec::with_capacity(dataset.len());
    let mut loss_sum = 0.0f64;

    let indices: Vec<usize> = (0..dataset.len()).collect();
    for chunk in indices.chunks(batch_size) {
        let batch = Batch::gather(dataset, chunk, max_len, n_class)?;
        let logits = model.forward(&batch)?;
        let out = loss.compute(&logits, &batch.labels, n_class);
        loss_sum += out.loss as f64 * batch.size() as f64;

        for (i, row) in out.probs.chunks_exact(n_class).enumerate() {
            predictions.push(argmax(row));
            scores.push(row[1]);
            labels.push(batch.labels[i]);
            ids.push(batch.ids[i]);
            attention.push(model.attention(i).map(<[f32]>::to_vec).unwrap_or_default());
        }
    }

    let mean_loss = if labels.is_empty() {
        0.0
    } else {
        (loss_sum / labels.len() as f64) as f32
    };
    let mut metrics = compute_metrics(mean_loss, &ids, &labels, &predictions, &scores);
    for (prediction, weights) in metrics.predictions.iter_mut().zip(attention) {
        prediction.attention = weights;
    }
    Ok(metrics)
}

fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

/// Metrics from per-sample ids, true labels, predicted labels and positive-class scores.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn compute_metrics(
    loss: f32,
    ids: &[u64],
    labels: &[usize],
    predictions: &[usize],
    scores: &[f32],
) -> EvalMetrics {
    let n = labels.len();
    assert!(
        ids.len() == n && predictions.len() == n && scores.len() == n,
        "metric inputs must have equal length"
    );

    let mut tp = 0usize;
    let mut tn = 0usize;
    let mut false_positives = Vec::new();
    let mut false_negatives = Vec::new();
    for i in 0..n {
        match (labels[i] == 1, predictions[i] == 1) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (false, true) => false_positives.push(ids[i]),
            (true, false) => false_negatives.push(ids[i]),
        }
    }
    let per_sample = (0..n)
        .map(|i| Prediction {
            id: ids[i],
            label: labels[i],
            predicted: predictions[i],
            score: scores[i],
            attention: Vec::new(),
        })
        .collect();
    let fp = false_positives.len();
    let fn_ = false_negatives.len();

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f32 / den as f32 };
    let accuracy = ratio(tp + tn, n);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let (roc, pr) = match threshold_sweep(labels, scores) {
        Some(sweep) => (sweep.roc(), sweep.pr()),
        None => (RocCurve::default(), PrCurve::default()),
    };
    let defined = !roc.fpr.is_empty();
    let auroc = defined.then(|| trapezoid(&roc.fpr, &roc.tpr));
    let auprc = defined.then(|| trapezoid(&pr.recall, &pr.precision));

    EvalMetrics {
        loss,
        accuracy,
        precision,
        recall,
        f1,
        auroc,
        auprc,
        false_positives,
        false_negatives,
        roc,
        pr,
        predictions: per_sample,
    }
}

/// Cumulative true/false positive counts at each distinct threshold, highest first.
struct Sweep {
    tps: Vec<usize>,
    fps: Vec<usize>,
    positives: usize,
    negatives: usize,
}

fn threshold_sweep(labels: &[usize], scores: &[f32]) -> Option<Sweep> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (k, &i) in order.iter().enumerate() {
        if labels[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_threshold = order
            .get(k + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_threshold {
            tps.push(tp);
            fps.push(fp);
        }
    }

    Some(Sweep {
        tps,
        fps,
        positives,
        negatives,
    })
}

impl Sweep {
    fn roc(&self) -> RocCurve {
        let mut curve = RocCurve {
            fpr: vec![0.0],
            tpr: vec![0.0],
        };
        for (&tp, &fp) in self.tps.iter().zip(&self.fps) {
            curve.fpr.push(fp as f32 / self.negatives as f32);
            curve.tpr.push(tp as f32 / self.positives as f32);
        }
        curve
    }

    fn pr(&self) -> PrCurve {
        let last = self
            .tps
            .iter()
            .position(|&tp| tp == self.positives)
            .unwrap_or(self.tps.len() - 1);

        let mut curve = PrCurve::default();
        for k in (0..=last).rev() {
            let (tp, fp) = (self.tps[k], self.fps[k]);
            curve.precision.push(tp as f32 / (tp + fp) as f32);
            curve.recall.push(tp as f32 / self.positives as f32);
        }
        curve.precision.push(1.0);
        curve.recall.push(0.0);
        curve
    }
}

/// Trapezoid-rule area under `y(x)`; points may run in either x direction.
fn trapezoid(x: &[f32], y: &[f32]) -> f32 {
    let area: f32 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) * 0.5)
        .sum();
    area.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_ranking() {
        let m = compute_metrics(
            0.1,
            &[10, 11, 12, 13],
            &[0, 0, 1, 1],
            &[0, 0, 1, 1],
            &[0.1, 0.2, 0.8, 0.9],
        );
        assert_relative_eq!(m.accuracy, 1.0);
        assert_relative_eq!(m.f1, 1.0);
        assert_relative_eq!(m.auroc.unwrap(), 1.0);
        assert_relative_eq!(m.auprc.unwrap(), 1.0);
        assert_relative_eq!(m.composite().unwrap(), 3.0);
        assert!(m.false_positives.is_empty() && m.false_negatives.is_empty());
    }

    #[test]
    fn test_roc_points() {
        let m = compute_metrics(
            0.0,
            &[1, 2, 3, 4],
            &[0, 1, 0, 1],
            &[0, 0, 1, 1],
            &[0.1, 0.4, 0.35, 0.8],
        );
        // sorted: 0.8(+), 0.4(+), 0.35(-), 0.1(-)
        assert_eq!(m.roc.fpr, vec![0.0, 0.0, 0.0, 0.5, 1.0]);
        assert_eq!(m.roc.tpr, vec![0.0, 0.5, 1.0, 1.0, 1.0]);
        assert_relative_eq!(m.auroc.unwrap(), 1.0);
        assert_eq!(m.false_positives, vec![3]);
        assert_eq!(m.false_negatives, vec![2]);
    }

    #[test]
    fn test_pr_curve_ends_at_full_precision_zero_recall() {
        let m = compute_metrics(
            0.0,
            &[1, 2, 3, 4],
            &[1, 0, 1, 0],
            &[1, 1, 0, 0],
            &[0.9, 0.8, 0.7, 0.1],
        );
        assert_eq!(m.pr.recall, vec![1.0, 0.5, 0.5, 0.0]);
        assert_eq!(m.pr.precision, vec![2.0 / 3.0, 0.5, 1.0, 1.0]);
        assert_eq!(m.pr.recall.last(), Some(&0.0));
    }

    #[test]
    fn test_tied_scores_share_one_threshold() {
        let m = compute_metrics(0.0, &[1, 2], &[0, 1], &[1, 1], &[0.5, 0.5]);
        assert_eq!(m.roc.fpr, vec![0.0, 1.0]);
        assert_eq!(m.roc.tpr, vec![0.0, 1.0]);
        assert_relative_eq!(m.auroc.unwrap(), 0.5);
    }

    #[test]
    fn test_single_class_is_undefined() {
        let m = compute_metrics(0.3, &[1, 2, 3], &[1, 1, 1], &[1, 0, 1], &[0.9, 0.2, 0.7]);
        assert!(m.auroc.is_none());
        assert!(m.auprc.is_none());
        assert!(m.composite().is_none());
        assert!(m.roc.fpr.is_empty() && m.pr.recall.is_empty());
        assert_relative_eq!(m.recall, 2.0 / 3.0);
        assert_eq!(m.false_negatives, vec![2]);
    }
}
