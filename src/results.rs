//! Result artifacts for downstream consumers
//!
//! | file                     | content                                        |
//! |--------------------------|------------------------------------------------|
//! | `false_<tag>.json`       | `{"FP": [ids], "FN": [ids]}`                   |
//! | `roc_<tag>.json`         | `{"FPR": [...], "TPR": [...]}`                 |
//! | `prc_<tag>.json`         | `{"PRECISION": [...], "RECALL": [...]}`        |
//! | `predictions_<tag>.json` | per-sample id, label, prediction, score        |
//! | `loss.json`              | `{"train": [...], "valid": [...]}`             |
//! | `metrics.csv`            | one row per trial plus a `mean` row            |

use crate::error::Result;
use crate::training::evaluator::EvalMetrics;
use crate::training::experiment::TrialRecord;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Metrics table file name inside `result_dir`.
pub const METRICS_TABLE_FILE: &str = "metrics.csv";

/// Header of the metrics table.
pub const METRICS_COLUMNS: [&str; 8] = [
    "trial",
    "accuracy",
    "precision",
    "recall",
    "f1",
    "auroc",
    "auprc",
    "best_epoch",
];

#[derive(Debug, Serialize)]
pub struct FalseIds<'a> {
    #[serde(rename = "FP")]
    pub false_positives: &'a [u64],
    #[serde(rename = "FN")]
    pub false_negatives: &'a [u64],
}

#[derive(Debug, Serialize)]
pub struct RocPoints<'a> {
    #[serde(rename = "FPR")]
    pub fpr: &'a [f32],
    #[serde(rename = "TPR")]
    pub tpr: &'a [f32],
}

#[derive(Debug, Serialize)]
pub struct PrPoints<'a> {
    #[serde(rename = "PRECISION")]
    pub precision: &'a [f32],
    #[serde(rename = "RECALL")]
    pub recall: &'a [f32],
}

#[derive(Debug, Serialize)]
pub struct LossCurves<'a> {
    pub train: &'a [f32],
    pub valid: &'a [f32],
}

/// Pretty-printed JSON, creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes the FP/FN ids, ROC points and PR points of `metrics` into `dir`,
/// suffixing each file name with `tag` (`valid`, `test`).
pub fn write_eval_artifacts(dir: impl AsRef<Path>, tag: &str, metrics: &EvalMetrics) -> Result<()> {
    let dir = dir.as_ref();
    write_json(
        dir.join(format!("false_{tag}.json")),
        &FalseIds {
            false_positives: &metrics.false_positives,
            false_negatives: &metrics.false_negatives,
        },
    )?;
    write_json(
        dir.join(format!("roc_{tag}.json")),
        &RocPoints {
            fpr: &metrics.roc.fpr,
            tpr: &metrics.roc.tpr,
        },
    )?;
    write_json(
        dir.join(format!("prc_{tag}.json")),
        &PrPoints {
            precision: &metrics.pr.precision,
            recall: &metrics.pr.recall,
        },
    )
}

/// Writes the per-sample outcomes of `metrics` to `predictions_<tag>.json`.
pub fn write_predictions(dir: impl AsRef<Path>, tag: &str, metrics: &EvalMetrics) -> Result<()> {
    write_json(
        dir.as_ref().join(format!("predictions_{tag}.json")),
        &metrics.predictions,
    )
}

pub fn write_loss_curves(dir: impl AsRef<Path>, train: &[f32], valid: &[f32]) -> Result<()> {
    write_json(dir.as_ref().join("loss.json"), &LossCurves { train, valid })
}

fn cell(value: Option<f32>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

fn mean(values: impl Iterator<Item = Option<f32>>) -> Option<f32> {
    let defined: Vec<f32> = values.flatten().collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f32>() / defined.len() as f32)
    }
}

/// Writes the per-trial metrics table and a final `mean` row.
///
/// Trials that never produced a defined composite score get empty metric cells
/// and are left out of the mean.
pub fn write_metrics_table(path: impl AsRef<Path>, records: &[TrialRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(METRICS_COLUMNS)?;

    type Column = fn(&EvalMetrics) -> Option<f32>;
    let columns: [Column; 6] = [
        |m| Some(m.accuracy),
        |m| Some(m.precision),
        |m| Some(m.recall),
        |m| Some(m.f1),
        |m| m.auroc,
        |m| m.auprc,
    ];

    for record in records {
        let mut row = vec![record.trial.to_string()];
        for column in &columns {
            row.push(cell(record.best.as_ref().and_then(column)));
        }
        row.push(record.best_epoch.map(|e| e.to_string()).unwrap_or_default());
        w.write_record(&row)?;
    }

    let mut row = vec!["mean".to_string()];
    for column in &columns {
        row.push(cell(mean(
            records.iter().map(|r| r.best.as_ref().and_then(column)),
        )));
    }
    row.push(String::new());
    w.write_record(&row)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_false_ids_keys() {
        let json = serde_json::to_string(&FalseIds {
            false_positives: &[3, 7],
            false_negatives: &[],
        })
        .unwrap();
        assert_eq!(json, r#"{"FP":[3,7],"FN":[]}"#);
    }

    #[test]
    fn test_mean_skips_undefined() {
        assert_eq!(mean([Some(1.0), None, Some(3.0)].into_iter()), Some(2.0));
        assert_eq!(mean([None, None].into_iter()), None);
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(0.5)), "0.500000");
    }
}
