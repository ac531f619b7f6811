//! Core data types shared by the parser, evaluator and predictor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature index type for identifying columns of a feature vector.
pub type FeatureIndex = usize;

/// Index of a node inside a tree's node arena.
pub type NodeIndex = usize;

/// How a numeric split recognises a missing value.
///
/// Stored in bits 2-3 of LightGBM's `decision_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingType {
    /// No missing handling: NaN is read as zero
    None,
    /// Values within `ZERO_THRESHOLD` of zero are missing
    Zero,
    /// NaN is missing
    NaN,
}

impl MissingType {
    /// Decode the two-bit missing type code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MissingType::None),
            1 => Some(MissingType::Zero),
            2 => Some(MissingType::NaN),
            _ => None,
        }
    }

    /// Two-bit code as written into `decision_type`.
    pub fn code(self) -> u8 {
        match self {
            MissingType::None => 0,
            MissingType::Zero => 1,
            MissingType::NaN => 2,
        }
    }
}

impl Default for MissingType {
    fn default() -> Self {
        MissingType::None
    }
}

impl fmt::Display for MissingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingType::None => write!(f, "none"),
            MissingType::Zero => write!(f, "zero"),
            MissingType::NaN => write!(f, "nan"),
        }
    }
}

/// Output kind selected for a prediction.
///
/// Numeric codes follow the LightGBM C API (`C_API_PREDICT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictType {
    /// Raw scores passed through the objective's output transform
    Normal,
    /// Summed raw scores
    RawScore,
    /// Index of the leaf reached in every used tree
    LeafIndex,
    /// Per-feature SHAP contributions followed by the expected value
    Contrib,
}

impl PredictType {
    /// Decode a C API predict type code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(PredictType::Normal),
            1 => Some(PredictType::RawScore),
            2 => Some(PredictType::LeafIndex),
            3 => Some(PredictType::Contrib),
            _ => None,
        }
    }

    /// C API code of this predict type.
    pub fn code(self) -> i32 {
        match self {
            PredictType::Normal => 0,
            PredictType::RawScore => 1,
            PredictType::LeafIndex => 2,
            PredictType::Contrib => 3,
        }
    }
}

impl Default for PredictType {
    fn default() -> Self {
        PredictType::Normal
    }
}

impl fmt::Display for PredictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictType::Normal => write!(f, "normal"),
            PredictType::RawScore => write!(f, "raw_score"),
            PredictType::LeafIndex => write!(f, "leaf_index"),
            PredictType::Contrib => write!(f, "contrib"),
        }
    }
}

impl FromStr for PredictType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "probability" | "0" => Ok(PredictType::Normal),
            "raw_score" | "raw" | "1" => Ok(PredictType::RawScore),
            "leaf_index" | "leaf" | "2" => Ok(PredictType::LeafIndex),
            "contrib" | "shap" | "3" => Ok(PredictType::Contrib),
            other => Err(format!("unknown predict type `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_type_codes() {
        for missing in [MissingType::None, MissingType::Zero, MissingType::NaN] {
            assert_eq!(MissingType::from_code(missing.code()), Some(missing));
        }
        assert_eq!(MissingType::from_code(3), None);
    }

    #[test]
    fn test_predict_type_parsing() {
        assert_eq!("raw_score".parse::<PredictType>(), Ok(PredictType::RawScore));
        assert_eq!("SHAP".parse::<PredictType>(), Ok(PredictType::Contrib));
        assert_eq!(PredictType::from_code(2), Some(PredictType::LeafIndex));
        assert!("margin".parse::<PredictType>().is_err());
        assert_eq!(PredictType::default(), PredictType::Normal);
    }

    #[test]
    fn test_serialization() {
        let serialized = serde_json::to_string(&PredictType::LeafIndex).unwrap();
        assert_eq!(serialized, "\"leaf_index\"");
        let deserialized: PredictType = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, PredictType::LeafIndex);
    }
}
