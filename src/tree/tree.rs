//! Decision tree stored as a validated node arena.
//!
//! Nodes live in one vector with the root at index 0. Every child index is
//! strictly greater than its parent's and every non-root node has exactly
//! one parent, so a walk from the root always terminates at a leaf.
//!
//! The arena is kept in one canonical order: internal nodes first, then
//! leaves in leaf order. This is the layout the LightGBM text format
//! implies, so a tree written to text and read back is equal to itself.

use crate::core::error::{EvaluationError, ParseError};
use crate::core::types::{FeatureIndex, NodeIndex};
use crate::tree::node::{Leaf, Node};
use serde::{Deserialize, Serialize};

/// Serialized form of a tree; validated on the way back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeData {
    nodes: Vec<Node>,
    shrinkage: f64,
}

/// A single regression tree of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeData", into = "TreeData")]
pub struct Tree {
    /// Node arena, index 0 is the root
    nodes: Vec<Node>,
    /// Learning rate the leaf values were scaled with at training time
    shrinkage: f64,
    /// Arena index of each leaf, in leaf order
    leaves: Vec<NodeIndex>,
    /// Leaf order of each arena slot (meaningless for internal nodes)
    leaf_slot: Vec<usize>,
    /// Depth of the deepest leaf
    max_depth: usize,
}

impl Tree {
    /// Build a tree from a node arena, validating its shape.
    ///
    /// Any arena order that passes validation is accepted. Nodes are then
    /// renumbered into the canonical order, keeping the relative order of
    /// internal nodes and of leaves.
    ///
    /// Errors report tree index 0; the model parser re-labels them with the
    /// position of the tree in its ensemble.
    pub fn from_nodes(nodes: Vec<Node>, shrinkage: f64) -> Result<Self, ParseError> {
        Self::build(0, nodes, shrinkage)
    }

    /// Single-leaf tree returning `value` for every row.
    pub fn stump(value: f64) -> Self {
        Tree {
            nodes: vec![Node::leaf(value)],
            shrinkage: 1.0,
            leaves: vec![0],
            leaf_slot: vec![0],
            max_depth: 0,
        }
    }

    pub(crate) fn build(
        tree_index: usize,
        nodes: Vec<Node>,
        shrinkage: f64,
    ) -> Result<Self, ParseError> {
        let invalid = |node: NodeIndex, reason: String| ParseError::InvalidTree {
            tree: tree_index,
            node,
            reason,
        };

        if nodes.is_empty() {
            return Err(invalid(0, "tree has no nodes".to_string()));
        }

        let mut parent: Vec<Option<NodeIndex>> = vec![None; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            let Some((left, right)) = node.children() else {
                continue;
            };
            for child in [left, right] {
                if child >= nodes.len() {
                    return Err(invalid(
                        index,
                        format!("child {} is out of bounds for {} nodes", child, nodes.len()),
                    ));
                }
                if child == index {
                    return Err(invalid(index, "node refers to itself".to_string()));
                }
                if child < index {
                    return Err(invalid(
                        index,
                        format!("child {} does not come after its parent", child),
                    ));
                }
                if let Some(other) = parent[child] {
                    return Err(invalid(
                        index,
                        format!("child {} is already referenced by node {}", child, other),
                    ));
                }
                parent[child] = Some(index);
            }
        }

        if let Some(orphan) = (1..nodes.len()).find(|&i| parent[i].is_none()) {
            return Err(invalid(orphan, "node is unreachable from the root".to_string()));
        }

        let nodes = canonical_order(nodes);

        // Parents precede children, so one forward pass fills in depths
        let mut depth = vec![0usize; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            if let Some((left, right)) = node.children() {
                depth[left] = depth[index] + 1;
                depth[right] = depth[index] + 1;
            }
        }

        let mut leaves = Vec::with_capacity(nodes.len() / 2 + 1);
        let mut leaf_slot = vec![0usize; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            if node.is_leaf() {
                leaf_slot[index] = leaves.len();
                leaves.push(index);
            }
        }
        let max_depth = leaves.iter().map(|&i| depth[i]).max().unwrap_or(0);

        Ok(Tree {
            nodes,
            shrinkage,
            leaves,
            leaf_slot,
            max_depth,
        })
    }

    /// Node arena.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of leaves.
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Number of internal (split) nodes.
    pub fn num_internal(&self) -> usize {
        self.nodes.len() - self.leaves.len()
    }

    /// Number of categorical splits.
    pub fn num_categorical(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Categorical(_)))
            .count()
    }

    /// Learning rate recorded at training time.
    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    /// Depth of the deepest leaf (0 for a stump).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Leaves in leaf order.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> + '_ {
        self.leaves.iter().filter_map(|&index| match &self.nodes[index] {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        })
    }

    /// Largest feature index any split reads.
    pub fn max_feature_index(&self) -> Option<FeatureIndex> {
        self.nodes.iter().filter_map(Node::feature).max()
    }

    /// Split nodes with their arena index and feature.
    pub fn split_features(&self) -> impl Iterator<Item = (NodeIndex, FeatureIndex)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.feature().map(|feature| (index, feature)))
    }

    /// Leaf order of the leaf stored at arena slot `node`.
    pub(crate) fn leaf_ordinal(&self, node: NodeIndex) -> usize {
        self.leaf_slot[node]
    }

    /// Child of internal node `node` that `row` is routed to; `None` for leaves.
    #[inline]
    pub(crate) fn next_node(
        &self,
        node: NodeIndex,
        row: &[f64],
    ) -> Result<Option<NodeIndex>, EvaluationError> {
        Ok(match &self.nodes[node] {
            Node::Numeric(split) => Some(split.next(feature_value(row, split.feature)?)),
            Node::Categorical(split) => Some(split.next(feature_value(row, split.feature)?)),
            Node::Leaf(_) => None,
        })
    }

    /// Walk from the root to the leaf `row` is routed to.
    fn walk(&self, row: &[f64]) -> Result<(NodeIndex, &Leaf), EvaluationError> {
        let mut node = 0;
        loop {
            node = match &self.nodes[node] {
                Node::Leaf(leaf) => return Ok((node, leaf)),
                Node::Numeric(split) => split.next(feature_value(row, split.feature)?),
                Node::Categorical(split) => split.next(feature_value(row, split.feature)?),
            };
        }
    }

    /// Arena index of the leaf `row` ends up in.
    pub fn leaf_node(&self, row: &[f64]) -> Result<NodeIndex, EvaluationError> {
        self.walk(row).map(|(node, _)| node)
    }

    /// Evaluate the tree on one row and return the reached leaf value.
    pub fn predict(&self, row: &[f64]) -> Result<f64, EvaluationError> {
        self.walk(row).map(|(_, leaf)| leaf.value)
    }

    /// Leaf order index of the leaf `row` ends up in.
    pub fn predict_leaf_index(&self, row: &[f64]) -> Result<usize, EvaluationError> {
        Ok(self.leaf_ordinal(self.leaf_node(row)?))
    }

    /// Share of `parent`'s training rows that went to `child`, or an even
    /// split when the model recorded no counts.
    pub(crate) fn cover_fraction(&self, parent: NodeIndex, child: NodeIndex) -> f64 {
        let total = self.nodes[parent].count();
        if total == 0 {
            0.5
        } else {
            self.nodes[child].count() as f64 / total as f64
        }
    }

    /// Mean leaf value weighted by training row counts.
    pub fn expected_value(&self) -> f64 {
        let mut expected = vec![0.0; self.nodes.len()];
        // Children follow their parents, so a reverse pass sees them first
        for (index, node) in self.nodes.iter().enumerate().rev() {
            expected[index] = match node {
                Node::Leaf(leaf) => leaf.value,
                Node::Numeric(_) | Node::Categorical(_) => match node.children() {
                    Some((left, right)) => {
                        self.cover_fraction(index, left) * expected[left]
                            + self.cover_fraction(index, right) * expected[right]
                    }
                    None => 0.0,
                },
            };
        }
        expected[0]
    }
}

impl TryFrom<TreeData> for Tree {
    type Error = ParseError;

    fn try_from(data: TreeData) -> Result<Self, Self::Error> {
        Tree::from_nodes(data.nodes, data.shrinkage)
    }
}

impl From<Tree> for TreeData {
    fn from(tree: Tree) -> Self {
        TreeData {
            nodes: tree.nodes,
            shrinkage: tree.shrinkage,
        }
    }
}

/// Move internal nodes ahead of leaves and remap child indices.
///
/// Expects a validated arena: internal nodes keep their relative order, so
/// every child still comes after its parent.
fn canonical_order(nodes: Vec<Node>) -> Vec<Node> {
    let num_internal = nodes.iter().filter(|node| !node.is_leaf()).count();
    let mut slot = vec![0usize; nodes.len()];
    let (mut next_internal, mut next_leaf) = (0, num_internal);
    for (index, node) in nodes.iter().enumerate() {
        let next = if node.is_leaf() { &mut next_leaf } else { &mut next_internal };
        slot[index] = *next;
        *next += 1;
    }
    if slot.iter().enumerate().all(|(index, &new)| index == new) {
        return nodes;
    }

    let mut ordered: Vec<Option<Node>> = vec![None; nodes.len()];
    for (index, mut node) in nodes.into_iter().enumerate() {
        match &mut node {
            Node::Numeric(split) => {
                split.left = slot[split.left];
                split.right = slot[split.right];
            }
            Node::Categorical(split) => {
                split.left = slot[split.left];
                split.right = slot[split.right];
            }
            Node::Leaf(_) => {}
        }
        ordered[slot[index]] = Some(node);
    }
    ordered.into_iter().flatten().collect()
}

#[inline]
fn feature_value(row: &[f64], feature: FeatureIndex) -> Result<f64, EvaluationError> {
    row.get(feature)
        .copied()
        .ok_or(EvaluationError::FeatureIndexOutOfRange {
            feature,
            len: row.len(),
        })
}
