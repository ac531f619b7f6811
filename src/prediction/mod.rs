//! Prediction pipeline.
//!
//! - [`predictor`]: per-row scoring for every output kind
//! - [`batch`]: dense matrix scoring on a rayon pool
//! - [`shap`]: TreeSHAP feature contributions
//! - [`leaf_index`]: reached-leaf output

pub mod batch;
pub mod leaf_index;
pub mod predictor;
pub mod shap;

pub use crate::core::types::PredictType;
pub use predictor::Predictor;
