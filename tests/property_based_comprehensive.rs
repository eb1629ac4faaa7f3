//! Property-based tests for the estimation building blocks
//!
//! Covers:
//! 1. Cell-wise overwrite and orientation selection
//! 2. Exactness of the merged mean difference
//! 3. Dropout identity outside the active rate range
//! 4. Reverse complement involution
//! 5. Channel selection ordering
//! 6. Class-name rewriting of layer graphs

use dropeffect::combiner::{combine, overwrite_by, select_reverse};
use dropeffect::layers::{DropoutParams, MonteCarloDropout};
use dropeffect::sequence::{one_hot, reverse_complement};
use dropeffect::transform::replace_class_names;
use dropeffect::ChannelSelection;
use ndarray::{Array2, Array3, ArrayD, IxDyn};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

fn matrix(rows: usize, cols: usize) -> impl Strategy<Value = Array2<f64>> {
    prop::collection::vec(-10.0f64..10.0, rows * cols)
        .prop_map(move |v| Array2::from_shape_vec((rows, cols), v).unwrap())
}

fn samples(iterations: usize, rows: usize, cols: usize) -> impl Strategy<Value = Array3<f32>> {
    prop::collection::vec(0.01f32..1.0, iterations * rows * cols)
        .prop_map(move |v| Array3::from_shape_vec((iterations, rows, cols), v).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_overwrite_by_is_cell_wise(
        (main, alt, selector) in (1usize..5, 1usize..5).prop_flat_map(|(r, c)| (
            matrix(r, c),
            matrix(r, c),
            prop::collection::vec(any::<bool>(), r * c)
                .prop_map(move |v| Array2::from_shape_vec((r, c), v).unwrap()),
        ))
    ) {
        let merged = overwrite_by(&main, &alt, &selector).unwrap();
        prop_assert_eq!(merged.dim(), main.dim());
        for ((idx, &take), &value) in selector.indexed_iter().zip(merged.iter()) {
            let expected = if take { alt[idx] } else { main[idx] };
            prop_assert_eq!(value, expected);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_selector_picks_smaller_pvalue(
        (p, p_rc) in (1usize..4, 1usize..4).prop_flat_map(|(r, c)| (matrix(r, c), matrix(r, c)))
    ) {
        let selector = select_reverse(&p, &p_rc).unwrap();
        let merged = overwrite_by(&p, &p_rc, &selector).unwrap();
        for (idx, &value) in merged.indexed_iter() {
            prop_assert!(value.abs() <= p[idx].abs());
            prop_assert_eq!(value.abs(), p[idx].abs().min(p_rc[idx].abs()));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_diff_is_exact_and_tables_share_shape(
        (reference, reference_rc, alternative, alternative_rc) in
            (2usize..6, 1usize..4, 1usize..4).prop_flat_map(|(n, r, c)| (
                samples(n, r, c),
                samples(n, r, c),
                samples(n, r, c),
                samples(n, r, c),
            ))
    ) {
        let merged = combine(&reference, &reference_rc, &alternative, &alternative_rc).unwrap();
        prop_assert_eq!(&merged.diff, &(&merged.alt_mean - &merged.ref_mean));

        let (_, rows, cols) = reference.dim();
        for table in [&merged.pvalue, &merged.ref_var, &merged.alt_var, &merged.cvar] {
            prop_assert_eq!(table.dim(), (rows, cols));
        }
        // Positive samples: finite, non-negative spread
        prop_assert!(merged.cvar.iter().all(|c| c.is_finite() && *c >= 0.0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_inactive_rate_is_identity(
        rate in prop_oneof![Just(0.0f64), Just(1.0f64), -2.0f64..=0.0, 1.0f64..3.0],
        values in prop::collection::vec(-5.0f32..5.0, 12),
        seed in any::<u64>(),
        training in any::<bool>(),
    ) {
        let input = ArrayD::from_shape_vec(IxDyn(&[3, 4]), values).unwrap();
        let layer = MonteCarloDropout::new(DropoutParams::new(rate));
        let output = layer
            .forward(input.clone(), training, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        prop_assert_eq!(output, input);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_reverse_complement_involution(
        sequences in (1usize..20).prop_flat_map(|len| {
            prop::collection::vec(prop::string::string_regex(&format!("[ACGTN]{{{}}}", len)).unwrap(), 1..4)
        })
    ) {
        let batch = one_hot(&sequences).unwrap();
        prop_assert_eq!(reverse_complement(&reverse_complement(&batch)), batch);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_name_selection_in_label_order(
        wanted in prop::collection::btree_set(0usize..6, 1..6)
    ) {
        let labels: Vec<String> = (0..6).map(|i| format!("track{}", i)).collect();
        let names: Vec<String> = wanted.iter().rev().map(|&i| labels[i].clone()).collect();
        let indices = ChannelSelection::Names(names).resolve(&labels).unwrap();
        prop_assert_eq!(indices, wanted.into_iter().collect::<Vec<_>>());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_replace_counts_every_dropout(depth in 0usize..5, width in 1usize..4) {
        let mut tree = json!({"class_name": "Dropout", "config": {"rate": 0.1}});
        for _ in 0..depth {
            let layers: Vec<_> = (0..width).map(|_| tree.clone()).collect();
            tree = json!({"class_name": "Sequential", "config": {"layers": layers}});
        }
        let replaced = replace_class_names(&mut tree, "Dropout", "MonteCarloDropout");
        prop_assert_eq!(replaced, width.pow(depth as u32));
        prop_assert!(!tree.to_string().contains("\"Dropout\""));
    }
}
