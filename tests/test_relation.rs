//! Tests for the relation composer
//!
//! - Slot-order invariance of the aggregate (bit-for-bit)
//! - The worked example with identity transforms
//! - Input gradients routed back to the right segment

use causal_relation_networks::layers::{DenseLayer, Layer};
use causal_relation_networks::models::relation::{relation_ops, ALT, CUR, PRE};
use causal_relation_networks::models::{RelationComposer, RELATION_PAIRS};
use causal_relation_networks::utils::SeededRng;

const PRE_VEC: [f32; 2] = [1.0, 0.0];
const ALT_VEC: [f32; 2] = [0.0, 1.0];
const CUR_VEC: [f32; 2] = [1.0, 1.0];
const CTX_VEC: [f32; 2] = [2.0, 2.0];

fn identity_composer() -> RelationComposer {
    let mut rng = SeededRng::new(0);
    RelationComposer::from_layers(
        2,
        2,
        DenseLayer::identity(6),
        DenseLayer::identity(6),
        DenseLayer::identity(6),
        0.0,
        &mut rng,
    )
}

fn all_slot_orders() -> Vec<[usize; 4]> {
    let mut orders = Vec::new();
    for a in 0..4 {
        for b in 0..4 {
            for c in 0..4 {
                for d in 0..4 {
                    let slots = [a, b, c, d];
                    let mut seen = [false; 4];
                    slots.iter().for_each(|&s| seen[s] = true);
                    if seen.iter().all(|&s| s) {
                        orders.push(slots);
                    }
                }
            }
        }
    }
    orders
}

// ============================================================================
// Worked Example
// ============================================================================

mod worked_example_tests {
    use super::*;

    #[test]
    fn test_pair_vectors() {
        let ops = relation_ops(
            [&PRE_VEC[..], &ALT_VEC[..], &CUR_VEC[..]],
            &CTX_VEC,
            1,
            2,
            2,
            [0, 1, 2, 3],
        );
        let pairs: Vec<&[f32]> = ops.chunks_exact(6).map(|op| &op[..4]).collect();
        assert_eq!(pairs[0], &[1.0, 0.0, 1.0, 1.0]);
        assert_eq!(pairs[1], &[1.0, 1.0, 1.0, 0.0]);
        assert_eq!(pairs[2], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(pairs[3], &[0.0, 1.0, 1.0, 1.0]);
        for op in ops.chunks_exact(6) {
            assert_eq!(&op[4..], &CTX_VEC);
        }
    }

    #[test]
    fn test_identity_transforms_sum_the_ops() {
        let mut composer = identity_composer();
        let out = composer.forward(&PRE_VEC, &ALT_VEC, &CUR_VEC, &CTX_VEC, 1);
        assert_eq!(out, vec![3.0, 2.0, 3.0, 3.0, 8.0, 8.0]);
    }

    #[test]
    fn test_canonical_pair_order() {
        assert_eq!(RELATION_PAIRS, [(PRE, CUR), (CUR, PRE), (PRE, ALT), (ALT, CUR)]);
    }
}

// ============================================================================
// Permutation Invariance
// ============================================================================

mod permutation_tests {
    use super::*;

    #[test]
    fn test_every_slot_order_is_bitwise_identical() {
        let batch = 3;
        let (seg_dim, ctx_dim) = (4, 5);
        let values = |n: usize, phase: f32| -> Vec<f32> {
            (0..n).map(|i| (i as f32 * 0.77 + phase).sin() * 3.1).collect()
        };
        let pre = values(batch * seg_dim, 0.1);
        let alt = values(batch * seg_dim, 1.3);
        let cur = values(batch * seg_dim, 2.9);
        let ctx = values(batch * ctx_dim, 4.2);

        let mut rng = SeededRng::new(99);
        let mut composer = RelationComposer::new(seg_dim, ctx_dim, 7, 0.0, &mut rng);
        let canonical = composer.forward(&pre, &alt, &cur, &ctx, batch);

        for slots in all_slot_orders() {
            let out = composer.forward_ordered(&pre, &alt, &cur, &ctx, batch, slots);
            let same = canonical
                .iter()
                .zip(&out)
                .all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(same, "slot order {:?} changed the output", slots);
        }
    }

    #[test]
    fn test_there_are_24_slot_orders() {
        assert_eq!(all_slot_orders().len(), 24);
    }
}

// ============================================================================
// Backward Tests
// ============================================================================

mod backward_tests {
    use super::*;

    #[test]
    fn test_identity_input_gradients() {
        let mut composer = identity_composer();
        composer.forward(&PRE_VEC, &ALT_VEC, &CUR_VEC, &CTX_VEC, 1);
        let grads = composer.backward(&[1.0; 6]);

        // pre appears in 3 pairs, cur in 3, alt in 2, ctx in all 4; ReLU blocks
        // the gradient wherever an operand entry is 0
        assert_eq!(grads.pre, vec![3.0, 0.0]);
        assert_eq!(grads.cur, vec![3.0, 3.0]);
        assert_eq!(grads.alt, vec![0.0, 2.0]);
        assert_eq!(grads.ctx, vec![4.0, 4.0]);
    }

    #[test]
    fn test_gradients_do_not_depend_on_slot_order() {
        let mut composer = identity_composer();
        composer.forward(&PRE_VEC, &ALT_VEC, &CUR_VEC, &CTX_VEC, 1);
        let canonical = composer.backward(&[0.5, -1.0, 2.0, 0.0, 1.0, 0.25]);
        composer.zero_grad();

        composer.forward_ordered(&PRE_VEC, &ALT_VEC, &CUR_VEC, &CTX_VEC, 1, [3, 1, 0, 2]);
        let shuffled = composer.backward(&[0.5, -1.0, 2.0, 0.0, 1.0, 0.25]);
        assert_eq!(canonical.pre, shuffled.pre);
        assert_eq!(canonical.alt, shuffled.alt);
        assert_eq!(canonical.cur, shuffled.cur);
        assert_eq!(canonical.ctx, shuffled.ctx);
    }

    #[test]
    fn test_parameters_are_named_per_transform() {
        let mut composer = identity_composer();
        let names: Vec<String> = composer
            .parameters("relation")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "relation.g1.weight",
                "relation.g1.bias",
                "relation.g2.weight",
                "relation.g2.bias",
                "relation.f1.weight",
                "relation.f1.bias",
            ]
        );
        assert_eq!(composer.parameter_count(), 3 * (36 + 6));
        assert_eq!(DenseLayer::identity(6).parameter_count(), 42);
    }
}
