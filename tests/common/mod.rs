//! Common test utilities for LightGBM predict integration tests.

#![allow(dead_code)]

use lightgbm_predict::*;
use ndarray::Array2;
use rand::prelude::*;
use std::sync::Arc;

/// One numeric split on feature 0: `x <= 0.5` scores -1, otherwise 2.
/// NaN takes the default (left) branch.
pub const SINGLE_SPLIT_MODEL: &str = "tree
version=v3
num_class=1
num_tree_per_iteration=1
label_index=0
max_feature_idx=0
objective=regression
feature_names=x
feature_infos=[0:1]
tree_sizes=268

Tree=0
num_leaves=2
num_cat=0
split_feature=0
split_gain=4.5
threshold=0.5
decision_type=10
left_child=-1
right_child=-2
leaf_value=-1 2
leaf_weight=4 6
leaf_count=4 6
internal_value=0.8
internal_weight=10
internal_count=10
is_linear=0
shrinkage=1


end of trees

feature_importances:
x=1

parameters:
[boosting: gbdt]
end of parameters

pandas_categorical:null
";

/// Binary model over three features with one numeric tree (zero-as-missing
/// on its second split) and one categorical tree.
///
/// Tree 0: `a <= 1.5` goes to a split on `c`, otherwise leaf 0.4. The `c`
/// split treats zero as missing and routes it right (0.1); otherwise
/// `c <= 0` scores -0.2 and larger values 0.1.
///
/// Tree 1: `b` in {1, 2} scores 0.3, any other category (and NaN) -0.3.
pub const BINARY_MODEL: &str = "tree
version=v4
num_class=1
num_tree_per_iteration=1
label_index=0
max_feature_idx=2
objective=binary sigmoid:1
feature_names=a b c
feature_infos=[0:3] 1:2:3 [-1:1]
tree_sizes=420 380

Tree=0
num_leaves=3
num_cat=0
split_feature=0 2
split_gain=12.5 3.25
threshold=1.5 0
decision_type=2 4
left_child=1 -2
right_child=-1 -3
leaf_value=0.4 -0.2 0.1
leaf_weight=30 40 30
leaf_count=30 40 30
internal_value=0 -0.07
internal_weight=100 70
internal_count=100 70
is_linear=0
shrinkage=1


Tree=1
num_leaves=2
num_cat=1
split_feature=1
split_gain=9
threshold=0
decision_type=9
left_child=-1
right_child=-2
leaf_value=0.3 -0.3
leaf_weight=50 50
leaf_count=50 50
internal_value=0
internal_weight=100
internal_count=100
cat_boundaries=0 1
cat_threshold=6
is_linear=0
shrinkage=0.1


end of trees
";

pub const NUM_MULTICLASS_ITERATIONS: usize = 3;

/// Three classes over three iterations. Tree `i` is a single leaf worth
/// `2^i`, so every window of trees sums to a distinct value.
pub fn multiclass_model_text() -> String {
    let num_trees = 3 * NUM_MULTICLASS_ITERATIONS;
    let mut text = String::from(
        "tree\nversion=v3\nnum_class=3\nnum_tree_per_iteration=3\nlabel_index=0\n\
         max_feature_idx=1\nobjective=multiclass num_class:3\n\
         feature_names=f0 f1\nfeature_infos=none none\n",
    );
    let sizes = vec!["200"; num_trees].join(" ");
    text.push_str(&format!("tree_sizes={}\n\n", sizes));
    for i in 0..num_trees {
        text.push_str(&format!(
            "Tree={}\nnum_leaves=1\nnum_cat=0\nsplit_feature=\nsplit_gain=\nthreshold=\n\
             decision_type=\nleft_child=\nright_child=\nleaf_value={}\nleaf_weight=0\n\
             leaf_count=0\ninternal_value=\ninternal_weight=\ninternal_count=\n\
             is_linear=0\nshrinkage=1\n\n\n",
            i,
            2f64.powi(i as i32)
        ));
    }
    text.push_str("end of trees\n");
    text
}

/// Parse one of the fixtures.
pub fn load(text: &str) -> Arc<Ensemble> {
    Arc::new(text.parse::<Ensemble>().expect("fixture should parse"))
}

pub fn predictor(text: &str, config: PredictionConfig) -> Predictor {
    Predictor::new(load(text), config).expect("predictor should build")
}

pub fn predictor_of(kind: PredictType, text: &str) -> Predictor {
    predictor(text, PredictionConfig::default().with_predict_type(kind))
}

/// Random dense rows with a sprinkling of NaN and exact zeros.
pub fn create_test_rows(num_rows: usize, num_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut rows = Array2::zeros((num_rows, num_features));

    for i in 0..num_rows {
        for j in 0..num_features {
            rows[[i, j]] = match rng.gen_range(0..10) {
                0 => f64::NAN,
                1 => 0.0,
                _ => rng.gen_range(-1.0..4.0),
            };
        }
    }

    rows
}

/// Random rows whose categorical column (1) holds whole category ids.
pub fn create_binary_model_rows(num_rows: usize, seed: u64) -> Array2<f64> {
    let mut rows = create_test_rows(num_rows, 3, seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    for i in 0..num_rows {
        if !rows[[i, 1]].is_nan() {
            rows[[i, 1]] = rng.gen_range(0..5) as f64;
        }
    }
    rows
}

/// Same values, column-major.
pub fn to_column_major(rows: &Array2<f64>) -> Vec<f64> {
    rows.t().iter().copied().collect()
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Bitwise equality, so NaN outputs compare equal.
pub fn assert_bitwise_eq(left: &[f64], right: &[f64]) {
    assert_eq!(left.len(), right.len());
    for (i, (l, r)) in left.iter().zip(right).enumerate() {
        assert_eq!(l.to_bits(), r.to_bits(), "value {} differs: {} vs {}", i, l, r);
    }
}
