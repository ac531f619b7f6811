//! LightGBM text model format.
//!
//! The reader accepts the `key=value` layout written by LightGBM (header,
//! `Tree=N` blocks, `end of trees` and an ignored trailer) and maps every
//! tree onto the validated node arena used for evaluation: internal node
//! `i` keeps arena slot `i`, leaf `j` lands at `num_internal + j`. The
//! writer emits the same layout so saved models load back into LightGBM.

use crate::boosting::{Ensemble, ImportanceType};
use crate::config::objective::Objective;
use crate::core::constants::{END_OF_TREES, MODEL_HEADER_TAG, SUPPORTED_MODEL_VERSIONS};
use crate::core::error::{Location, ParseError};
use crate::core::types::NodeIndex;
use crate::tree::{CategoricalSplit, DecisionType, Leaf, Node, NumericSplit, SplitStats, Tree};
use std::collections::HashMap;
use std::fmt::Display;
use std::iter::Peekable;
use std::str::FromStr;

const TREE_PREFIX: &str = "Tree=";

/// Parse a model from LightGBM text.
pub fn parse_model(text: &str) -> Result<Ensemble, ParseError> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();

    match lines.next() {
        Some(MODEL_HEADER_TAG) => {}
        Some(other) => {
            return Err(ParseError::malformed_header(format!(
                "expected `{}` on the first line, found `{}`",
                MODEL_HEADER_TAG,
                preview(other)
            )))
        }
        None => return Err(ParseError::malformed_header("model source is empty")),
    }

    let header = Section::collect(Location::Header, &mut lines)?;

    let mut blocks = Vec::new();
    while let Some(line) = lines.next() {
        if line == END_OF_TREES {
            break;
        }
        let expected = blocks.len();
        let location = Location::Tree(expected);
        let Some(index) = line.strip_prefix(TREE_PREFIX) else {
            return Err(ParseError::invalid_value(
                location,
                "Tree",
                format!("expected a tree block, found `{}`", preview(line)),
            ));
        };
        let index: usize = parse_scalar(location, "Tree", index)?;
        if index != expected {
            return Err(ParseError::invalid_value(
                location,
                "Tree",
                format!("tree blocks out of order: found Tree={}", index),
            ));
        }
        blocks.push(Section::collect(location, &mut lines)?);
    }

    let ensemble = build_ensemble(&header, &blocks)?;
    log::debug!(
        "Parsed LightGBM text model: {} trees, objective {}",
        ensemble.trees().len(),
        ensemble.objective()
    );
    Ok(ensemble)
}

fn build_ensemble(header: &Section<'_>, blocks: &[Section<'_>]) -> Result<Ensemble, ParseError> {
    let version = header.required("version")?;
    if !SUPPORTED_MODEL_VERSIONS.contains(&version) {
        return Err(ParseError::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    let num_class: usize = header.required_scalar("num_class")?;
    let per_iteration: usize = header.scalar("num_tree_per_iteration")?.unwrap_or(num_class);
    if per_iteration != num_class {
        return Err(ParseError::count_mismatch(
            Location::Header,
            "num_tree_per_iteration",
            num_class,
            per_iteration,
        ));
    }

    let label_index: usize = header.scalar("label_index")?.unwrap_or(0);
    let max_feature_idx: usize = header.required_scalar("max_feature_idx")?;
    let num_features = max_feature_idx.checked_add(1).ok_or_else(|| {
        ParseError::invalid_value(Location::Header, "max_feature_idx", "value is too large")
    })?;
    let objective = Objective::parse(header.get("objective").unwrap_or(""), num_class)?;
    let base_score: f64 = header.scalar("base_score")?.unwrap_or(0.0);

    if let Some(sizes) = header.get("tree_sizes") {
        let declared = sizes.split_whitespace().count();
        if declared != blocks.len() {
            return Err(ParseError::count_mismatch(
                Location::Header,
                "tree_sizes",
                declared,
                blocks.len(),
            ));
        }
    }

    let trees = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| parse_tree(index, block))
        .collect::<Result<Vec<_>, _>>()?;

    Ensemble::builder(num_features, objective)
        .version(version)
        .num_class(num_class)
        .label_index(label_index)
        .feature_names(header.words("feature_names"))
        .feature_infos(header.words("feature_infos"))
        .average_output(header.has_flag("average_output"))
        .base_score(base_score)
        .trees(trees)
        .build()
}

fn parse_tree(index: usize, block: &Section<'_>) -> Result<Tree, ParseError> {
    let location = block.location;
    let num_leaves: usize = block.required_scalar("num_leaves")?;
    if num_leaves == 0 {
        return Err(ParseError::invalid_value(
            location,
            "num_leaves",
            "a tree needs at least one leaf",
        ));
    }
    if block.get("is_linear").is_some_and(|flag| flag != "0") {
        return Err(ParseError::Unsupported {
            location,
            feature: "linear tree leaves".to_string(),
        });
    }
    let shrinkage: f64 = block.scalar("shrinkage")?.unwrap_or(1.0);

    let leaf_value: Vec<f64> = block.array("leaf_value", num_leaves, true)?;
    let leaf_weight: Vec<f64> = block.array("leaf_weight", num_leaves, false)?;
    let leaf_count: Vec<u64> = block.array("leaf_count", num_leaves, false)?;

    let num_internal = num_leaves - 1;
    let mut nodes = Vec::with_capacity(num_internal + num_leaves);

    if num_internal > 0 {
        let split_feature: Vec<usize> = block.array("split_feature", num_internal, true)?;
        let threshold: Vec<f64> = block.array("threshold", num_internal, true)?;
        let decision_type: Vec<u8> = block.array("decision_type", num_internal, false)?;
        let left_child: Vec<i64> = block.array("left_child", num_internal, true)?;
        let right_child: Vec<i64> = block.array("right_child", num_internal, true)?;
        let split_gain: Vec<f64> = block.array("split_gain", num_internal, false)?;
        let internal_value: Vec<f64> = block.array("internal_value", num_internal, false)?;
        let internal_weight: Vec<f64> = block.array("internal_weight", num_internal, false)?;
        let internal_count: Vec<u64> = block.array("internal_count", num_internal, false)?;

        let categories = CategorySets::parse(block)?;
        let arena_child = |node: usize, child: i64| -> Result<NodeIndex, ParseError> {
            child_slot(child, num_internal, num_leaves).ok_or_else(|| ParseError::InvalidTree {
                tree: index,
                node,
                reason: format!(
                    "child {} is out of bounds for {} internal nodes and {} leaves",
                    child, num_internal, num_leaves
                ),
            })
        };

        let mut num_categorical = 0;
        for i in 0..num_internal {
            let decision = DecisionType::from_byte(decision_type[i]).ok_or_else(|| {
                ParseError::invalid_value(
                    location,
                    "decision_type",
                    format!("unknown missing type in decision byte {}", decision_type[i]),
                )
            })?;
            let left = arena_child(i, left_child[i])?;
            let right = arena_child(i, right_child[i])?;
            let stats = SplitStats {
                gain: split_gain[i],
                value: internal_value[i],
                weight: internal_weight[i],
                count: internal_count[i],
            };

            let node = if decision.categorical {
                num_categorical += 1;
                let bitset = categories.bitset(location, threshold[i])?;
                Node::Categorical(
                    CategoricalSplit::from_bitset(split_feature[i], bitset, left, right)
                        .with_missing(decision.missing_type, decision.default_left)
                        .with_stats(stats),
                )
            } else {
                Node::Numeric(
                    NumericSplit::new(split_feature[i], threshold[i], left, right)
                        .with_missing(decision.missing_type, decision.default_left)
                        .with_stats(stats),
                )
            };
            nodes.push(node);
        }

        if num_categorical != categories.len() {
            return Err(ParseError::count_mismatch(
                location,
                "num_cat",
                categories.len(),
                num_categorical,
            ));
        }
    }

    nodes.extend((0..num_leaves).map(|j| {
        Node::Leaf(Leaf {
            value: leaf_value[j],
            weight: leaf_weight[j],
            count: leaf_count[j],
        })
    }));

    Tree::build(index, nodes, shrinkage)
}

/// Arena slot of a LightGBM child reference: `c >= 0` is internal node `c`,
/// `c < 0` is leaf `!c`.
fn child_slot(child: i64, num_internal: usize, num_leaves: usize) -> Option<NodeIndex> {
    if child >= 0 {
        let node = usize::try_from(child).ok()?;
        (node < num_internal).then_some(node)
    } else {
        let leaf = usize::try_from(!child).ok()?;
        (leaf < num_leaves).then_some(num_internal + leaf)
    }
}

/// Category bitsets of one tree, sliced by `cat_boundaries`.
struct CategorySets {
    boundaries: Vec<usize>,
    words: Vec<u32>,
}

impl CategorySets {
    fn parse(block: &Section<'_>) -> Result<Self, ParseError> {
        let num_cat: usize = block.scalar("num_cat")?.unwrap_or(0);
        if num_cat == 0 {
            return Ok(CategorySets {
                boundaries: Vec::new(),
                words: Vec::new(),
            });
        }

        let boundaries: Vec<usize> = block.array("cat_boundaries", num_cat + 1, true)?;
        let words: Vec<u32> = block.parse_words("cat_threshold")?;
        let ordered = boundaries.windows(2).all(|pair| pair[0] <= pair[1]);
        if !ordered || boundaries[0] != 0 || boundaries[num_cat] != words.len() {
            return Err(ParseError::invalid_value(
                block.location,
                "cat_boundaries",
                format!(
                    "boundaries must rise from 0 to the {} cat_threshold words",
                    words.len()
                ),
            ));
        }
        Ok(CategorySets { boundaries, words })
    }

    fn len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Bitset referenced by a categorical node's threshold.
    fn bitset(&self, location: Location, threshold: f64) -> Result<Vec<u32>, ParseError> {
        let valid = threshold >= 0.0 && threshold.fract() == 0.0 && threshold < self.len() as f64;
        if !valid {
            return Err(ParseError::invalid_value(
                location,
                "threshold",
                format!(
                    "categorical threshold {} does not name one of {} category sets",
                    threshold,
                    self.len()
                ),
            ));
        }
        let set = threshold as usize;
        Ok(self.words[self.boundaries[set]..self.boundaries[set + 1]].to_vec())
    }
}

/// `key=value` lines of the header or of one tree block.
struct Section<'a> {
    location: Location,
    fields: HashMap<&'a str, &'a str>,
    flags: Vec<&'a str>,
}

impl<'a> Section<'a> {
    /// Consume lines up to the next tree block or the end of trees.
    fn collect<I>(location: Location, lines: &mut Peekable<I>) -> Result<Self, ParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut section = Section {
            location,
            fields: HashMap::new(),
            flags: Vec::new(),
        };
        while let Some(&line) = lines.peek() {
            if line == END_OF_TREES || line.starts_with(TREE_PREFIX) {
                break;
            }
            lines.next();
            match line.split_once('=') {
                Some((key, value)) => {
                    if section.fields.insert(key.trim(), value.trim()).is_some() {
                        return Err(ParseError::invalid_value(
                            location,
                            key.trim(),
                            "field appears more than once",
                        ));
                    }
                }
                None => section.flags.push(line),
            }
        }
        Ok(section)
    }

    fn get(&self, field: &str) -> Option<&'a str> {
        self.fields.get(field).copied()
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(&flag)
    }

    fn required(&self, field: &'static str) -> Result<&'a str, ParseError> {
        self.get(field).ok_or(ParseError::MissingField {
            location: self.location,
            field,
        })
    }

    fn scalar<T>(&self, field: &'static str) -> Result<Option<T>, ParseError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(field)
            .map(|value| parse_scalar(self.location, field, value))
            .transpose()
    }

    fn required_scalar<T>(&self, field: &'static str) -> Result<T, ParseError>
    where
        T: FromStr,
        T::Err: Display,
    {
        parse_scalar(self.location, field, self.required(field)?)
    }

    fn words(&self, field: &str) -> Vec<String> {
        self.get(field)
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn parse_words<T>(&self, field: &'static str) -> Result<Vec<T>, ParseError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.required(field)?
            .split_whitespace()
            .map(|token| parse_scalar(self.location, field, token))
            .collect()
    }

    /// Array of exactly `len` values. Optional arrays default to zeros.
    fn array<T>(&self, field: &'static str, len: usize, required: bool) -> Result<Vec<T>, ParseError>
    where
        T: FromStr + Default + Clone,
        T::Err: Display,
    {
        if self.get(field).is_none() && !required {
            return Ok(vec![T::default(); len]);
        }
        let values: Vec<T> = self.parse_words(field)?;
        if values.len() != len {
            return Err(ParseError::count_mismatch(
                self.location,
                field,
                len,
                values.len(),
            ));
        }
        Ok(values)
    }
}

fn parse_scalar<T>(location: Location, field: &str, value: &str) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|err: T::Err| {
        ParseError::invalid_value(location, field, format!("`{}`: {}", preview(value), err))
    })
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(40) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Render a model as LightGBM text.
pub fn write_model(ensemble: &Ensemble) -> String {
    let blocks: Vec<String> = ensemble
        .trees()
        .iter()
        .enumerate()
        .map(|(index, tree)| write_tree(index, tree))
        .collect();

    let mut out = String::new();
    out.push_str(MODEL_HEADER_TAG);
    out.push('\n');
    out.push_str(&format!("version={}\n", ensemble.version()));
    out.push_str(&format!("num_class={}\n", ensemble.num_class()));
    out.push_str(&format!(
        "num_tree_per_iteration={}\n",
        ensemble.num_tree_per_iteration()
    ));
    out.push_str(&format!("label_index={}\n", ensemble.label_index()));
    out.push_str(&format!("max_feature_idx={}\n", ensemble.num_features().saturating_sub(1)));
    if *ensemble.objective() != Objective::Custom {
        out.push_str(&format!("objective={}\n", ensemble.objective()));
    }
    if ensemble.average_output() {
        out.push_str("average_output\n");
    }
    if ensemble.base_score() != 0.0 {
        out.push_str(&format!("base_score={}\n", format_float(ensemble.base_score())));
    }
    if !ensemble.feature_names().is_empty() {
        out.push_str(&format!("feature_names={}\n", ensemble.feature_names().join(" ")));
    }
    if !ensemble.feature_infos().is_empty() {
        out.push_str(&format!("feature_infos={}\n", ensemble.feature_infos().join(" ")));
    }
    out.push_str(&format!(
        "tree_sizes={}\n\n",
        join(blocks.iter().map(String::len))
    ));

    for block in &blocks {
        out.push_str(block);
    }
    out.push_str(END_OF_TREES);
    out.push('\n');

    out.push_str("\nfeature_importances:\n");
    let counts = ensemble.feature_importance(ImportanceType::Split);
    let mut ranked: Vec<(usize, f64)> = counts
        .into_iter()
        .enumerate()
        .filter(|&(_, count)| count > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for (feature, count) in ranked {
        out.push_str(&format!("{}={}\n", ensemble.feature_name(feature), count as u64));
    }

    out.push_str("\nparameters:\nend of parameters\n");
    out.push_str("\npandas_categorical:null\n");
    out
}

fn write_tree(index: usize, tree: &Tree) -> String {
    // Internal nodes and leaves are numbered separately in arena order
    let mut internal_slot = vec![0usize; tree.nodes().len()];
    let mut internal = Vec::new();
    for (slot, node) in tree.nodes().iter().enumerate() {
        if !node.is_leaf() {
            internal_slot[slot] = internal.len();
            internal.push(node);
        }
    }
    let child_ref = |child: NodeIndex| -> i64 {
        if tree.nodes()[child].is_leaf() {
            !(tree.leaf_ordinal(child) as i64)
        } else {
            internal_slot[child] as i64
        }
    };

    let mut split_feature = Vec::with_capacity(internal.len());
    let mut split_gain = Vec::with_capacity(internal.len());
    let mut threshold = Vec::with_capacity(internal.len());
    let mut decision_type = Vec::with_capacity(internal.len());
    let mut left_child = Vec::with_capacity(internal.len());
    let mut right_child = Vec::with_capacity(internal.len());
    let mut internal_value = Vec::with_capacity(internal.len());
    let mut internal_weight = Vec::with_capacity(internal.len());
    let mut internal_count = Vec::with_capacity(internal.len());
    let mut cat_boundaries = vec![0usize];
    let mut cat_threshold: Vec<u32> = Vec::new();

    for node in &internal {
        let (feature, left, right, stats) = match node {
            Node::Numeric(split) => {
                threshold.push(format_float(split.threshold));
                (split.feature, split.left, split.right, &split.stats)
            }
            Node::Categorical(split) => {
                threshold.push((cat_boundaries.len() - 1).to_string());
                cat_threshold.extend_from_slice(&split.categories);
                cat_boundaries.push(cat_threshold.len());
                (split.feature, split.left, split.right, &split.stats)
            }
            Node::Leaf(_) => continue,
        };
        split_feature.push(feature);
        split_gain.push(format_float(stats.gain));
        decision_type.push(node.decision_type());
        left_child.push(child_ref(left));
        right_child.push(child_ref(right));
        internal_value.push(format_float(stats.value));
        internal_weight.push(format_float(stats.weight));
        internal_count.push(stats.count);
    }

    let leaves: Vec<&Leaf> = tree.leaves().collect();
    let num_cat = cat_boundaries.len() - 1;

    let mut out = String::new();
    out.push_str(&format!("{}{}\n", TREE_PREFIX, index));
    out.push_str(&format!("num_leaves={}\n", leaves.len()));
    out.push_str(&format!("num_cat={}\n", num_cat));
    out.push_str(&format!("split_feature={}\n", join(split_feature)));
    out.push_str(&format!("split_gain={}\n", split_gain.join(" ")));
    out.push_str(&format!("threshold={}\n", threshold.join(" ")));
    out.push_str(&format!("decision_type={}\n", join(decision_type)));
    out.push_str(&format!("left_child={}\n", join(left_child)));
    out.push_str(&format!("right_child={}\n", join(right_child)));
    out.push_str(&format!(
        "leaf_value={}\n",
        join(leaves.iter().map(|leaf| format_float(leaf.value)))
    ));
    out.push_str(&format!(
        "leaf_weight={}\n",
        join(leaves.iter().map(|leaf| format_float(leaf.weight)))
    ));
    out.push_str(&format!(
        "leaf_count={}\n",
        join(leaves.iter().map(|leaf| leaf.count))
    ));
    out.push_str(&format!("internal_value={}\n", internal_value.join(" ")));
    out.push_str(&format!("internal_weight={}\n", internal_weight.join(" ")));
    out.push_str(&format!("internal_count={}\n", join(internal_count)));
    if num_cat > 0 {
        out.push_str(&format!("cat_boundaries={}\n", join(cat_boundaries)));
        out.push_str(&format!("cat_threshold={}\n", join(cat_threshold)));
    }
    out.push_str("is_linear=0\n");
    out.push_str(&format!("shrinkage={}\n\n\n", format_float(tree.shrinkage())));
    out
}

/// Shortest representation that parses back to the same value.
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value)
    } else {
        format!("{:?}", value)
    }
}

fn join<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
