//! TreeSHAP feature contributions.
//!
//! Exact path-dependent SHAP values (Lundberg et al.), computed the way
//! LightGBM's `PredictContrib` does. Cover fractions come from the training
//! row counts stored in the model; trees without counts are treated as if
//! every split divided its rows evenly. For one tree the contributions plus
//! [`Tree::expected_value`] add up to the tree's prediction.

use crate::core::error::EvaluationError;
use crate::core::types::{FeatureIndex, NodeIndex};
use crate::tree::{Node, Tree};

#[derive(Debug, Clone, Copy, Default)]
struct PathElement {
    feature: Option<FeatureIndex>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Pending visit of `node`, entered with the given path fractions.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIndex,
    depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<FeatureIndex>,
}

/// Path storage for every depth of one tree walk.
///
/// Depth `d` owns the segment `[d * width, (d + 1) * width)`. A node copies
/// its parent's segment into its own before extending it, so a sibling
/// visited later still finds the parent's path untouched.
struct PathBuffer {
    elements: Vec<PathElement>,
    lengths: Vec<usize>,
    width: usize,
}

impl PathBuffer {
    fn new(tree: &Tree) -> Self {
        let levels = tree.max_depth() + 1;
        let mut features: Vec<FeatureIndex> = tree.split_features().map(|(_, f)| f).collect();
        features.sort_unstable();
        features.dedup();
        // The root element plus at most one element per distinct feature
        let width = levels.min(features.len() + 1);
        PathBuffer {
            elements: vec![PathElement::default(); levels * width],
            lengths: vec![0; levels],
            width,
        }
    }

    /// Start the path of `depth` from a copy of its parent's path and
    /// return its length with the segment.
    fn enter(&mut self, depth: usize) -> (usize, &mut [PathElement]) {
        let start = depth * self.width;
        let len = match depth.checked_sub(1) {
            Some(parent_depth) => {
                let parent = start - self.width;
                let len = self.lengths[parent_depth];
                self.elements.copy_within(parent..parent + len, start);
                len
            }
            None => 0,
        };
        (len, &mut self.elements[start..start + self.width])
    }
}

/// Add the contributions of `tree` for `row` to `phi`.
///
/// `phi` holds one slot per feature followed by the bias slot, which
/// receives the tree's expected value.
pub fn tree_contributions(
    tree: &Tree,
    row: &[f64],
    phi: &mut [f64],
) -> Result<(), EvaluationError> {
    let Some(bias) = phi.last_mut() else {
        return Ok(());
    };
    *bias += tree.expected_value();
    if tree.num_leaves() <= 1 {
        return Ok(());
    }

    let mut paths = PathBuffer::new(tree);
    let mut stack = Vec::with_capacity(tree.max_depth() + 1);
    stack.push(Frame {
        node: 0,
        depth: 0,
        zero_fraction: 1.0,
        one_fraction: 1.0,
        feature: None,
    });

    while let Some(frame) = stack.pop() {
        let (len, path) = paths.enter(frame.depth);
        let mut len = extend_path(
            path,
            len,
            frame.zero_fraction,
            frame.one_fraction,
            frame.feature,
        );
        let node = &tree.nodes()[frame.node];

        let Some(hot) = tree.next_node(frame.node, row)? else {
            if let Node::Leaf(leaf) = node {
                let path = &path[..len];
                for index in 1..len {
                    let weight = unwound_path_sum(path, index);
                    let element = path[index];
                    if let Some(slot) = element.feature.and_then(|f| phi.get_mut(f)) {
                        *slot += weight * (element.one_fraction - element.zero_fraction) * leaf.value;
                    }
                }
            }
            continue;
        };

        let (Some((left, right)), Some(split_feature)) = (node.children(), node.feature()) else {
            continue;
        };
        let cold = if hot == left { right } else { left };

        // A feature already on the path is unwound and re-split here
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(index) = path[..len].iter().position(|e| e.feature == Some(split_feature)) {
            incoming_zero = path[index].zero_fraction;
            incoming_one = path[index].one_fraction;
            len = unwind_path(path, len, index);
        }
        paths.lengths[frame.depth] = len;

        // Popped in reverse, so the hot child is visited first
        let depth = frame.depth + 1;
        stack.push(Frame {
            node: cold,
            depth,
            zero_fraction: tree.cover_fraction(frame.node, cold) * incoming_zero,
            one_fraction: 0.0,
            feature: Some(split_feature),
        });
        stack.push(Frame {
            node: hot,
            depth,
            zero_fraction: tree.cover_fraction(frame.node, hot) * incoming_zero,
            one_fraction: incoming_one,
            feature: Some(split_feature),
        });
    }
    Ok(())
}

/// Append an element to the first `len` entries of `path`; returns the new length.
fn extend_path(
    path: &mut [PathElement],
    len: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<FeatureIndex>,
) -> usize {
    let depth = len;
    path[depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    };
    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
    len + 1
}

/// Remove element `index` from the first `len` entries; returns the new length.
fn unwind_path(path: &mut [PathElement], len: usize, index: usize) -> usize {
    let depth = len - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let weight = path[i].weight;
            path[i].weight = next_one_portion * scale / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                weight - path[i].weight * zero_fraction * (depth - i) as f64 / scale;
        } else if zero_fraction != 0.0 {
            path[i].weight = path[i].weight * scale / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    depth
}

fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let share = next_one_portion * scale / ((i + 1) as f64 * one_fraction);
            total += share;
            next_one_portion = path[i].weight - share * zero_fraction * ((depth - i) as f64 / scale);
        } else if zero_fraction != 0.0 {
            total += (path[i].weight / zero_fraction) / ((depth - i) as f64 / scale);
        }
    }
    total
}
