//! Leaf index prediction.

use crate::boosting::Ensemble;
use crate::core::error::EvaluationError;
use std::ops::Range;

/// Write the leaf reached in every tree of `iterations` into `out`, in tree
/// order, and return the number of values written.
///
/// `out` must hold `num_class * iterations.len()` slots.
pub fn leaf_indices(
    ensemble: &Ensemble,
    row: &[f64],
    iterations: Range<usize>,
    out: &mut [f64],
) -> Result<usize, EvaluationError> {
    let per_iteration = ensemble.num_tree_per_iteration();
    let trees = &ensemble.trees()[iterations.start * per_iteration..iterations.end * per_iteration];
    for (slot, tree) in out.iter_mut().zip(trees) {
        *slot = tree.predict_leaf_index(row)? as f64;
    }
    Ok(trees.len().min(out.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Objective;
    use crate::tree::{Node, NumericSplit, Tree};

    fn split(feature: usize) -> Tree {
        Tree::from_nodes(
            vec![
                Node::Numeric(NumericSplit::new(feature, 0.0, 1, 2)),
                Node::leaf(0.0),
                Node::leaf(1.0),
            ],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_leaf_indices_follow_tree_order() {
        let ensemble = Ensemble::builder(2, Objective::Multiclass { num_class: 2 })
            .trees(vec![split(0), split(1), split(1), split(0), Tree::stump(3.0), split(0)])
            .build()
            .unwrap();
        let mut out = vec![-1.0; 4];
        let written = leaf_indices(&ensemble, &[1.0, -1.0], 1..3, &mut out).unwrap();
        assert_eq!(written, 4);
        assert_eq!(out, vec![0.0, 1.0, 0.0, 1.0]);
    }
}
