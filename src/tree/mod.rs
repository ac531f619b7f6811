//! Decision tree representation and the per-tree evaluator.
//!
//! [`Tree`] owns a validated node arena; [`Node`] is the sum type over
//! numeric splits, categorical splits and leaves.

pub mod node;
pub mod tree;

pub use node::{
    bitset_contains, bitset_from_values, CategoricalSplit, DecisionType, Leaf, Node,
    NumericSplit, SplitStats,
};
pub use tree::Tree;
