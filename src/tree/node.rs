//! Tree node variants and split decisions.
//!
//! A node is either a numeric split, a categorical split or a leaf. Child
//! references are indices into the owning tree's node arena.

use crate::core::constants::{CATEGORICAL_MASK, DEFAULT_LEFT_MASK, MISSING_TYPE_SHIFT, ZERO_THRESHOLD};
use crate::core::types::{FeatureIndex, MissingType, NodeIndex};
use serde::{Deserialize, Serialize};

/// Training-time statistics kept on an internal node.
///
/// They do not influence routing; `count` drives SHAP cover weights and
/// the rest is carried for faithful re-serialization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitStats {
    /// Loss reduction achieved by the split
    pub gain: f64,
    /// Output the node would have as a leaf
    pub value: f64,
    /// Sum of hessians reaching the node
    pub weight: f64,
    /// Number of training rows reaching the node
    pub count: u64,
}

/// Threshold split on a numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSplit {
    /// Feature read from the input row
    pub feature: FeatureIndex,
    /// Values `<= threshold` go left
    pub threshold: f64,
    /// Which values count as missing
    pub missing_type: MissingType,
    /// Direction taken by missing values
    pub default_left: bool,
    /// Left child
    pub left: NodeIndex,
    /// Right child
    pub right: NodeIndex,
    /// Training statistics
    pub stats: SplitStats,
}

impl NumericSplit {
    /// Create a split with no missing-value handling.
    pub fn new(feature: FeatureIndex, threshold: f64, left: NodeIndex, right: NodeIndex) -> Self {
        NumericSplit {
            feature,
            threshold,
            missing_type: MissingType::None,
            default_left: false,
            left,
            right,
            stats: SplitStats::default(),
        }
    }

    /// Set the missing type and default direction.
    pub fn with_missing(mut self, missing_type: MissingType, default_left: bool) -> Self {
        self.missing_type = missing_type;
        self.default_left = default_left;
        self
    }

    /// Attach training statistics.
    pub fn with_stats(mut self, stats: SplitStats) -> Self {
        self.stats = stats;
        self
    }

    /// Child `value` is routed to.
    #[inline]
    pub fn next(&self, value: f64) -> NodeIndex {
        if self.goes_left(value) {
            self.left
        } else {
            self.right
        }
    }

    /// Whether `value` is routed to the left child.
    #[inline]
    pub fn goes_left(&self, value: f64) -> bool {
        let value = if value.is_nan() && self.missing_type != MissingType::NaN {
            0.0
        } else {
            value
        };
        let missing = match self.missing_type {
            MissingType::None => false,
            MissingType::Zero => (-ZERO_THRESHOLD..=ZERO_THRESHOLD).contains(&value),
            MissingType::NaN => value.is_nan(),
        };
        if missing {
            self.default_left
        } else {
            value <= self.threshold
        }
    }
}

/// Set-membership split on a categorical feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSplit {
    /// Feature read from the input row
    pub feature: FeatureIndex,
    /// Bitset of categories routed left, 32 categories per word
    pub categories: Vec<u32>,
    /// Which values count as missing
    pub missing_type: MissingType,
    /// Direction taken by NaN. Only read when `missing_type` is
    /// [`MissingType::NaN`]; otherwise NaN is looked up as category 0.
    pub default_left: bool,
    /// Left child
    pub left: NodeIndex,
    /// Right child
    pub right: NodeIndex,
    /// Training statistics
    pub stats: SplitStats,
}

impl CategoricalSplit {
    /// Create a split sending the listed categories left.
    pub fn new(
        feature: FeatureIndex,
        categories: &[u32],
        left: NodeIndex,
        right: NodeIndex,
    ) -> Self {
        Self::from_bitset(feature, bitset_from_values(categories), left, right)
    }

    /// Create a split from an already packed bitset.
    pub fn from_bitset(
        feature: FeatureIndex,
        categories: Vec<u32>,
        left: NodeIndex,
        right: NodeIndex,
    ) -> Self {
        CategoricalSplit {
            feature,
            categories,
            missing_type: MissingType::None,
            default_left: false,
            left,
            right,
            stats: SplitStats::default(),
        }
    }

    /// Set the missing type and default direction.
    pub fn with_missing(mut self, missing_type: MissingType, default_left: bool) -> Self {
        self.missing_type = missing_type;
        self.default_left = default_left;
        self
    }

    /// Attach training statistics.
    pub fn with_stats(mut self, stats: SplitStats) -> Self {
        self.stats = stats;
        self
    }

    /// Whether `category` is a member of the left set.
    pub fn contains(&self, category: u32) -> bool {
        bitset_contains(&self.categories, category as usize)
    }

    /// Child `value` is routed to.
    #[inline]
    pub fn next(&self, value: f64) -> NodeIndex {
        if self.goes_left(value) {
            self.left
        } else {
            self.right
        }
    }

    /// Whether `value` is routed to the left child.
    #[inline]
    pub fn goes_left(&self, value: f64) -> bool {
        let value = if value.is_nan() {
            if self.missing_type == MissingType::NaN {
                return self.default_left;
            }
            0.0
        } else {
            value
        };
        // Truncates toward zero and saturates, so huge values miss the bitset
        let category = value as i64;
        if category < 0 {
            return false;
        }
        usize::try_from(category)
            .map(|pos| bitset_contains(&self.categories, pos))
            .unwrap_or(false)
    }
}

/// Terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Leaf {
    /// Score contributed by the tree for rows reaching this leaf
    pub value: f64,
    /// Sum of hessians reaching the leaf
    pub weight: f64,
    /// Number of training rows reaching the leaf
    pub count: u64,
}

impl Leaf {
    /// Create a leaf without training statistics.
    pub fn new(value: f64) -> Self {
        Leaf {
            value,
            ..Leaf::default()
        }
    }
}

/// A decision point or a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Threshold split
    Numeric(NumericSplit),
    /// Category set split
    Categorical(CategoricalSplit),
    /// Terminal value
    Leaf(Leaf),
}

impl Node {
    /// Shorthand for a statistics-free leaf.
    pub fn leaf(value: f64) -> Self {
        Node::Leaf(Leaf::new(value))
    }

    /// Whether this node is terminal.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// `(left, right)` children of an internal node.
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match self {
            Node::Numeric(split) => Some((split.left, split.right)),
            Node::Categorical(split) => Some((split.left, split.right)),
            Node::Leaf(_) => None,
        }
    }

    /// Split feature of an internal node.
    pub fn feature(&self) -> Option<FeatureIndex> {
        match self {
            Node::Numeric(split) => Some(split.feature),
            Node::Categorical(split) => Some(split.feature),
            Node::Leaf(_) => None,
        }
    }

    /// Number of training rows that reached this node.
    pub fn count(&self) -> u64 {
        match self {
            Node::Numeric(split) => split.stats.count,
            Node::Categorical(split) => split.stats.count,
            Node::Leaf(leaf) => leaf.count,
        }
    }

    /// LightGBM `decision_type` byte of an internal node.
    pub fn decision_type(&self) -> u8 {
        let (categorical, missing_type, default_left) = match self {
            Node::Numeric(split) => (false, split.missing_type, split.default_left),
            Node::Categorical(split) => (true, split.missing_type, split.default_left),
            Node::Leaf(_) => return 0,
        };
        let mut decision = missing_type.code() << MISSING_TYPE_SHIFT;
        if categorical {
            decision |= CATEGORICAL_MASK;
        }
        if default_left {
            decision |= DEFAULT_LEFT_MASK;
        }
        decision
    }
}

/// Unpacked `decision_type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionType {
    /// Categorical split flag
    pub categorical: bool,
    /// Default direction for missing values
    pub default_left: bool,
    /// Missing value handling
    pub missing_type: MissingType,
}

impl DecisionType {
    /// Decode a `decision_type` byte; `None` for an unknown missing type.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(DecisionType {
            categorical: byte & CATEGORICAL_MASK != 0,
            default_left: byte & DEFAULT_LEFT_MASK != 0,
            missing_type: MissingType::from_code((byte >> MISSING_TYPE_SHIFT) & 3)?,
        })
    }
}

/// Pack category values into 32-bit words.
pub fn bitset_from_values(values: &[u32]) -> Vec<u32> {
    let words = values.iter().map(|&v| v as usize / 32 + 1).max().unwrap_or(0);
    let mut bits = vec![0u32; words];
    for &value in values {
        bits[value as usize / 32] |= 1 << (value % 32);
    }
    bits
}

/// Test membership of `pos` in a packed bitset.
#[inline]
pub fn bitset_contains(bits: &[u32], pos: usize) -> bool {
    match bits.get(pos / 32) {
        Some(word) => (word >> (pos % 32)) & 1 == 1,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_threshold_tie_goes_left() {
        let split = NumericSplit::new(0, 0.5, 1, 2);
        assert!(split.goes_left(0.3));
        assert!(split.goes_left(0.5));
        assert!(!split.goes_left(0.7));
    }

    #[test]
    fn test_numeric_nan_routing() {
        let left = NumericSplit::new(0, 0.5, 1, 2).with_missing(MissingType::NaN, true);
        let right = NumericSplit::new(0, 0.5, 1, 2).with_missing(MissingType::NaN, false);
        assert!(left.goes_left(f64::NAN));
        assert!(!right.goes_left(f64::NAN));

        // Without NaN handling the value is read as zero
        let none = NumericSplit::new(0, -1.0, 1, 2).with_missing(MissingType::None, true);
        assert!(!none.goes_left(f64::NAN));
    }

    #[test]
    fn test_numeric_zero_as_missing() {
        let split = NumericSplit::new(0, -1.0, 1, 2).with_missing(MissingType::Zero, true);
        assert!(split.goes_left(0.0));
        assert!(split.goes_left(1e-36));
        assert!(split.goes_left(f64::NAN));
        assert!(!split.goes_left(0.5));
    }

    #[test]
    fn test_categorical_membership() {
        let split = CategoricalSplit::new(0, &[1, 3, 40], 1, 2);
        assert!(split.goes_left(1.0));
        assert!(split.goes_left(3.9));
        assert!(split.goes_left(40.0));
        assert!(!split.goes_left(2.0));
        assert!(!split.goes_left(-1.0));
        assert!(!split.goes_left(1e20));
        assert!(!split.goes_left(64.0));
        assert!(split.contains(40));
        assert!(!split.contains(41));
    }

    #[test]
    fn test_categorical_missing_follows_default() {
        let split = CategoricalSplit::new(0, &[2], 1, 2).with_missing(MissingType::NaN, true);
        assert!(split.goes_left(f64::NAN));
        let split = CategoricalSplit::new(0, &[0], 1, 2);
        assert!(split.goes_left(f64::NAN));
        // Without the NaN missing type the default direction is not read
        let split = CategoricalSplit::new(0, &[2], 1, 2).with_missing(MissingType::None, true);
        assert!(!split.goes_left(f64::NAN));
        let split = CategoricalSplit::new(0, &[2], 1, 2).with_missing(MissingType::Zero, true);
        assert!(!split.goes_left(f64::NAN));
    }

    #[test]
    fn test_decision_type_round_trip() {
        let node = Node::Numeric(NumericSplit::new(0, 1.0, 1, 2).with_missing(MissingType::NaN, true));
        assert_eq!(node.decision_type(), 10);
        let decoded = DecisionType::from_byte(10).unwrap();
        assert!(!decoded.categorical);
        assert!(decoded.default_left);
        assert_eq!(decoded.missing_type, MissingType::NaN);

        let node = Node::Categorical(CategoricalSplit::new(0, &[1], 1, 2));
        assert_eq!(node.decision_type(), 1);
        assert!(DecisionType::from_byte(12).is_none());
    }

    #[test]
    fn test_bitset_helpers() {
        let bits = bitset_from_values(&[0, 31, 32]);
        assert_eq!(bits, vec![0x8000_0001, 1]);
        assert!(bitset_contains(&bits, 32));
        assert!(!bitset_contains(&bits, 33));
        assert!(!bitset_contains(&bits, 1000));
    }
}
