//! Tests for the model/optimizer registries and the assembled models
//!
//! - Building every registered model from configuration
//! - Output shapes and dimension contracts
//! - Stable parameter naming
//! - Data-contract errors surfaced from the forward pass

mod common;

use causal_relation_networks::architecture::{
    build_model, build_optimizer, lookup_model, MODELS, OPTIMIZERS,
};
use causal_relation_networks::data::{Batch, Dataset, EmbeddingTable, Field, Sample};
use causal_relation_networks::models::{CausalModel, SegmentEncoder};
use causal_relation_networks::utils::SeededRng;
use causal_relation_networks::CausalError;
use common::{synthetic_dataset, tiny_config, tiny_table};
use std::sync::Arc;
use tempfile::tempdir;

fn batch_of(dataset: &Dataset, n: usize, config_dir: &std::path::Path) -> Batch {
    let config = tiny_config(config_dir);
    let indices: Vec<usize> = (0..n).collect();
    Batch::gather(dataset, &indices, &config.max_len, 2).unwrap()
}

// ============================================================================
// Registry Tests
// ============================================================================

mod registry_tests {
    use super::*;

    #[test]
    fn test_every_registered_model_builds() {
        let dir = tempdir().unwrap();
        let mut config = tiny_config(dir.path());
        for entry in MODELS {
            config.model = entry.name.to_string();
            config.classifier.input_dim = (entry.head_input_dim)(&config);
            let mut rng = SeededRng::new(1);
            let model = build_model(&config, tiny_table(), &mut rng).unwrap();
            assert_eq!(model.name(), entry.name);
            assert_eq!(model.n_class(), 2);
            assert!(model.parameter_count() > 0);
        }
    }

    #[test]
    fn test_head_input_dims() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let relation = lookup_model("relation_network").unwrap();
        let pool = lookup_model("context_pool").unwrap();
        assert_eq!((relation.head_input_dim)(&config), config.relation_hidden);
        assert_eq!((pool.head_input_dim)(&config), config.context_hidden);
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let dir = tempdir().unwrap();
        let mut config = tiny_config(dir.path());
        config.model = "transformer".to_string();
        let mut rng = SeededRng::new(1);
        let result = build_model(&config, tiny_table(), &mut rng);
        assert!(matches!(result, Err(CausalError::Config(_))));
    }

    #[test]
    fn test_every_registered_optimizer_builds() {
        let dir = tempdir().unwrap();
        let mut config = tiny_config(dir.path());
        for &name in OPTIMIZERS {
            config.optimizer = name.to_string();
            let optimizer = build_optimizer(&config).unwrap();
            assert_eq!(optimizer.learning_rate(), config.learning_rate);
        }
    }
}

// ============================================================================
// Forward Pass Tests
// ============================================================================

mod forward_tests {
    use super::*;

    #[test]
    fn test_relation_network_logit_shape() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let mut rng = SeededRng::new(3);
        let mut model = build_model(&config, tiny_table(), &mut rng).unwrap();
        model.set_training(false);

        let dataset = synthetic_dataset(6, 0, 1);
        let batch = batch_of(&dataset, 6, dir.path());
        let logits = model.forward(&batch).unwrap();
        assert_eq!(logits.len(), 6 * 2);
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_eval_mode_is_deterministic() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let mut rng = SeededRng::new(3);
        let mut model = build_model(&config, tiny_table(), &mut rng).unwrap();
        model.set_training(false);

        let dataset = synthetic_dataset(4, 0, 2);
        let batch = batch_of(&dataset, 4, dir.path());
        let a = model.forward(&batch).unwrap();
        let b = model.forward(&batch).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_batch_order_does_not_change_sample_scores() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let mut rng = SeededRng::new(5);
        let mut model = build_model(&config, tiny_table(), &mut rng).unwrap();
        model.set_training(false);

        let dataset = synthetic_dataset(3, 0, 4);
        let forward = Batch::gather(&dataset, &[0, 1, 2], &config.max_len, 2).unwrap();
        let reversed = Batch::gather(&dataset, &[2, 1, 0], &config.max_len, 2).unwrap();
        let a = model.forward(&forward).unwrap();
        let b = model.forward(&reversed).unwrap();
        for i in 0..3 {
            let j = 2 - i;
            assert!((a[i * 2] - b[j * 2]).abs() < 1e-5);
            assert!((a[i * 2 + 1] - b[j * 2 + 1]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_token_outside_table_is_rejected() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let mut rng = SeededRng::new(3);
        let small = Arc::new(EmbeddingTable::random(5, common::EMB_DIM, &mut rng).unwrap());
        let mut model = build_model(&config, small, &mut rng).unwrap();

        let dataset = synthetic_dataset(2, 0, 1);
        let batch = batch_of(&dataset, 2, dir.path());
        let err = model.forward(&batch).unwrap_err();
        assert!(matches!(err, CausalError::TokenOutOfRange { vocab: 5, .. }));
    }

    #[test]
    fn test_overlong_segment_is_rejected_before_the_model() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let sample = Sample {
            id: 1,
            tokens: vec![2; 4],
            tokens_pre: vec![2; 4],
            tokens_alt: vec![3; 4],
            tokens_cur: vec![4],
            length: 4,
            label: 0,
        };
        let dataset = Dataset::new(vec![sample]);
        let err = Batch::gather(&dataset, &[0], &config.max_len, 2).unwrap_err();
        assert!(matches!(
            err,
            CausalError::SequenceTooLong {
                field: "tokens_alt",
                len: 4,
                max: 3
            }
        ));
    }
}

// ============================================================================
// Dimension Contract Tests
// ============================================================================

mod dimension_tests {
    use super::*;

    #[test]
    fn test_segment_dim_is_filters_times_widths() {
        let mut rng = SeededRng::new(2);
        for seq_len in [4, 9, 30] {
            let mut encoder =
                SegmentEncoder::new(Field::Pre, seq_len, 3, 5, &[2, 3, 4], 0.0, &mut rng);
            assert_eq!(encoder.output_dim(), 15);
            let out = encoder.forward(vec![0.1; 2 * seq_len * 3], 2);
            assert_eq!(out.len(), 2 * 15);
        }
    }

    #[test]
    fn test_parameter_names_are_stable_and_unique() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let names = |seed: u64| -> Vec<String> {
            let mut rng = SeededRng::new(seed);
            let mut model = build_model(&config, tiny_table(), &mut rng).unwrap();
            let names: Vec<String> = model.parameters().into_iter().map(|p| p.name).collect();
            names
        };
        let a = names(1);
        let b = names(2);
        assert_eq!(a, b);

        let mut unique = a.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), a.len());
        assert!(a.contains(&"seg_pre.conv2.weight".to_string()));
        assert!(a.contains(&"context.query".to_string()));
        assert!(a.contains(&"relation.g1.weight".to_string()));
        assert!(a.contains(&"head.out.bias".to_string()));
    }

    #[test]
    fn test_parameter_count_matches_tensors() {
        let dir = tempdir().unwrap();
        let config = tiny_config(dir.path());
        let mut rng = SeededRng::new(1);
        let mut model: Box<dyn CausalModel> = build_model(&config, tiny_table(), &mut rng).unwrap();
        let expected = model.parameter_count();
        let total: usize = model.parameters().iter().map(|p| p.len()).sum();
        assert_eq!(total, expected);
    }
}
