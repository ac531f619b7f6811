//! Immutable tree ensemble loaded from a model.
//!
//! Trees are stored in serialization order: tree `i` belongs to iteration
//! `i / K` and class `i % K`, where `K` is the number of trees per
//! iteration. An [`Ensemble`] is validated once when it is built and is
//! read-only afterwards, so it can be shared across threads behind an `Arc`.

use crate::config::objective::Objective;
use crate::core::constants::MODEL_VERSION;
use crate::core::error::{Location, ParseError};
use crate::core::types::FeatureIndex;
use crate::tree::{Node, Tree};
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use std::ops::Range;

/// Feature importance measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceType {
    /// Number of splits using the feature
    Split,
    /// Total gain of splits using the feature
    Gain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnsembleData {
    version: String,
    num_class: usize,
    num_features: usize,
    label_index: usize,
    objective: Objective,
    feature_names: Vec<String>,
    feature_infos: Vec<String>,
    average_output: bool,
    base_score: f64,
    trees: Vec<Tree>,
}

/// A trained gradient boosted tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnsembleData", into = "EnsembleData")]
pub struct Ensemble {
    version: String,
    num_class: usize,
    num_features: usize,
    label_index: usize,
    objective: Objective,
    feature_names: Vec<String>,
    feature_infos: Vec<String>,
    average_output: bool,
    base_score: f64,
    trees: Vec<Tree>,
}

assert_impl_all!(Ensemble: Send, Sync);

impl Ensemble {
    /// Start building an ensemble over `num_features` features.
    pub fn builder(num_features: usize, objective: Objective) -> EnsembleBuilder {
        EnsembleBuilder::new(num_features, objective)
    }

    /// Format version tag the model was read with.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of output classes.
    pub fn num_class(&self) -> usize {
        self.num_class
    }

    /// Trees grown per boosting iteration.
    pub fn num_tree_per_iteration(&self) -> usize {
        self.num_class
    }

    /// Total number of boosting iterations.
    pub fn num_iterations(&self) -> usize {
        self.trees.len() / self.num_class
    }

    /// Number of features a row must carry.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Index of the label column in the training data.
    pub fn label_index(&self) -> usize {
        self.label_index
    }

    /// Training objective.
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Feature names; empty when the model carries none.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Per-feature value ranges or category lists as recorded by LightGBM.
    pub fn feature_infos(&self) -> &[String] {
        &self.feature_infos
    }

    /// Whether scores are averaged over iterations (random forest mode).
    pub fn average_output(&self) -> bool {
        self.average_output
    }

    /// Score every class accumulator starts from.
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// All trees in serialization order.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Tree of class `class` in iteration `iteration`.
    pub fn tree(&self, iteration: usize, class: usize) -> Option<&Tree> {
        if class >= self.num_class {
            return None;
        }
        self.trees.get(iteration * self.num_class + class)
    }

    /// Iterations used for a request, following LightGBM's clamping.
    ///
    /// `start_iteration` is clamped into `[0, total]`; a non-positive
    /// `num_iteration` selects everything from there on, a positive one is
    /// capped at what remains.
    pub fn iteration_range(&self, start_iteration: i32, num_iteration: i32) -> Range<usize> {
        let total = self.num_iterations();
        let start = usize::try_from(start_iteration).unwrap_or(0).min(total);
        let remaining = total - start;
        let count = match usize::try_from(num_iteration) {
            Ok(requested) if requested > 0 => requested.min(remaining),
            _ => remaining,
        };
        start..start + count
    }

    /// Feature importance summed over all trees.
    pub fn feature_importance(&self, kind: ImportanceType) -> Vec<f64> {
        let mut importance = vec![0.0; self.num_features];
        for tree in &self.trees {
            for node in tree.nodes() {
                let (feature, gain) = match node {
                    Node::Numeric(split) => (split.feature, split.stats.gain),
                    Node::Categorical(split) => (split.feature, split.stats.gain),
                    Node::Leaf(_) => continue,
                };
                importance[feature] += match kind {
                    ImportanceType::Split => 1.0,
                    ImportanceType::Gain => gain,
                };
            }
        }
        importance
    }

    /// Display name of a feature, `Column_<i>` when the model has none.
    pub fn feature_name(&self, feature: FeatureIndex) -> String {
        self.feature_names
            .get(feature)
            .cloned()
            .unwrap_or_else(|| format!("Column_{}", feature))
    }
}

impl TryFrom<EnsembleData> for Ensemble {
    type Error = ParseError;

    fn try_from(data: EnsembleData) -> Result<Self, Self::Error> {
        EnsembleBuilder {
            version: data.version,
            num_class: data.num_class,
            num_features: data.num_features,
            label_index: data.label_index,
            objective: data.objective,
            feature_names: data.feature_names,
            feature_infos: data.feature_infos,
            average_output: data.average_output,
            base_score: data.base_score,
            trees: data.trees,
        }
        .build()
    }
}

impl From<Ensemble> for EnsembleData {
    fn from(ensemble: Ensemble) -> Self {
        EnsembleData {
            version: ensemble.version,
            num_class: ensemble.num_class,
            num_features: ensemble.num_features,
            label_index: ensemble.label_index,
            objective: ensemble.objective,
            feature_names: ensemble.feature_names,
            feature_infos: ensemble.feature_infos,
            average_output: ensemble.average_output,
            base_score: ensemble.base_score,
            trees: ensemble.trees,
        }
    }
}

/// Builder that validates an ensemble's global invariants.
#[derive(Debug, Clone)]
pub struct EnsembleBuilder {
    version: String,
    num_class: usize,
    num_features: usize,
    label_index: usize,
    objective: Objective,
    feature_names: Vec<String>,
    feature_infos: Vec<String>,
    average_output: bool,
    base_score: f64,
    trees: Vec<Tree>,
}

impl EnsembleBuilder {
    /// Create a builder for a single-class ensemble without trees.
    pub fn new(num_features: usize, objective: Objective) -> Self {
        EnsembleBuilder {
            version: MODEL_VERSION.to_string(),
            num_class: objective.num_outputs().unwrap_or(1),
            num_features,
            label_index: 0,
            objective,
            feature_names: Vec::new(),
            feature_infos: Vec::new(),
            average_output: false,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    /// Set the format version tag
    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    /// Set the number of classes
    pub fn num_class(mut self, num_class: usize) -> Self {
        self.num_class = num_class;
        self
    }

    /// Set the label column index
    pub fn label_index(mut self, label_index: usize) -> Self {
        self.label_index = label_index;
        self
    }

    /// Set feature names
    pub fn feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// Set feature infos
    pub fn feature_infos(mut self, infos: Vec<String>) -> Self {
        self.feature_infos = infos;
        self
    }

    /// Average scores over iterations
    pub fn average_output(mut self, average_output: bool) -> Self {
        self.average_output = average_output;
        self
    }

    /// Set the starting score of every class accumulator
    pub fn base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }

    /// Append a tree
    pub fn tree(mut self, tree: Tree) -> Self {
        self.trees.push(tree);
        self
    }

    /// Replace all trees
    pub fn trees(mut self, trees: Vec<Tree>) -> Self {
        self.trees = trees;
        self
    }

    /// Validate and build the ensemble
    pub fn build(self) -> Result<Ensemble, ParseError> {
        if self.num_class == 0 {
            return Err(ParseError::invalid_value(
                Location::Header,
                "num_class",
                "must be at least 1",
            ));
        }
        if let Some(outputs) = self.objective.num_outputs() {
            if outputs != self.num_class {
                return Err(ParseError::count_mismatch(
                    Location::Header,
                    "num_class",
                    outputs,
                    self.num_class,
                ));
            }
        }
        if self.trees.len() % self.num_class != 0 {
            let expected = (self.trees.len() / self.num_class + 1) * self.num_class;
            return Err(ParseError::count_mismatch(
                Location::Header,
                "trees",
                expected,
                self.trees.len(),
            ));
        }
        if !self.feature_names.is_empty() && self.feature_names.len() != self.num_features {
            return Err(ParseError::count_mismatch(
                Location::Header,
                "feature_names",
                self.num_features,
                self.feature_names.len(),
            ));
        }
        if !self.feature_infos.is_empty() && self.feature_infos.len() != self.num_features {
            return Err(ParseError::count_mismatch(
                Location::Header,
                "feature_infos",
                self.num_features,
                self.feature_infos.len(),
            ));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            if let Some((node, feature)) = tree
                .split_features()
                .find(|&(_, feature)| feature >= self.num_features)
            {
                return Err(ParseError::InvalidTree {
                    tree: index,
                    node,
                    reason: format!(
                        "split feature {} is not below the feature count {}",
                        feature, self.num_features
                    ),
                });
            }
        }

        Ok(Ensemble {
            version: self.version,
            num_class: self.num_class,
            num_features: self.num_features,
            label_index: self.label_index,
            objective: self.objective,
            feature_names: self.feature_names,
            feature_infos: self.feature_infos,
            average_output: self.average_output,
            base_score: self.base_score,
            trees: self.trees,
        })
    }
}
