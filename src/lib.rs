//! # LightGBM Predict
//!
//! A pure Rust inference engine for gradient boosted decision tree models
//! trained with LightGBM. Models are loaded from LightGBM's text format (or
//! a compact binary snapshot) into an immutable ensemble that any number of
//! threads can score against concurrently.
//!
//! ## Features
//!
//! - **Model Loading**: LightGBM text models (`v2` to `v4`), optionally gzip,
//!   zstd or lz4 compressed, with diagnostics naming the tree and field
//!   that failed validation.
//! - **Exact LightGBM Semantics**: missing value routing, categorical
//!   bitsets, iteration windows, `average_output` and every objective's
//!   output transform.
//! - **Output Kinds**: transformed scores, raw scores, leaf indices and
//!   TreeSHAP feature contributions.
//! - **Parallel Batches**: rows are scored on a rayon pool and written by
//!   index, so results always come back in input order.
//! - **Round-Trip Serialization**: models can be written back in LightGBM's
//!   text format or as a bincode snapshot.
//!
//! ## Quick Start
//!
//! ```rust
//! use lightgbm_predict::{Ensemble, Node, NumericSplit, Objective, PredictionConfig, Predictor, Tree};
//! use std::sync::Arc;
//!
//! # fn main() -> lightgbm_predict::Result<()> {
//! // x[0] <= 0.5 ? -1 : 2
//! let tree = Tree::from_nodes(
//!     vec![
//!         Node::Numeric(NumericSplit::new(0, 0.5, 1, 2)),
//!         Node::leaf(-1.0),
//!         Node::leaf(2.0),
//!     ],
//!     1.0,
//! )?;
//! let ensemble = Ensemble::builder(1, Objective::default()).tree(tree).build()?;
//!
//! // Models survive a trip through LightGBM's text format
//! let reloaded: Ensemble = ensemble.to_model_string().parse()?;
//!
//! let predictor = Predictor::new(Arc::new(reloaded), PredictionConfig::default())?;
//! assert_eq!(predictor.predict_row(&[0.3])?, vec![-1.0]);
//! assert_eq!(predictor.predict_for_mat(&[0.3, 0.7], 2, 1, true)?, vec![-1.0, 2.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Loading a Model File
//!
//! ```rust,no_run
//! use lightgbm_predict::{Ensemble, PredictType, PredictionConfig, Predictor};
//! use ndarray::array;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! lightgbm_predict::init()?;
//! let ensemble = Arc::new(Ensemble::from_file("model.txt.gz")?);
//! let config = PredictionConfig::default()
//!     .with_num_iteration(100)
//!     .with_predict_type(PredictType::Contrib);
//! let predictor = Predictor::new(ensemble, config)?;
//! let contributions = predictor.predict(array![[0.1, 2.0, 3.5]].view())?;
//! println!("{:?}", contributions);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Error taxonomy, constants, shared types and initialization
//! - [`config`]: Prediction configuration and objective transforms
//! - [`tree`]: Node types and the validated tree arena
//! - [`boosting`]: The immutable tree ensemble
//! - [`io`]: Model files, compression and serialization formats
//! - [`prediction`]: Row and batch scoring, leaf indices and SHAP values

#![doc(html_root_url = "https://docs.rs/lightgbm-predict/")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Decision tree module
pub mod tree;

// Ensemble module
pub mod boosting;

// Model input/output module
pub mod io;

// Prediction module
pub mod prediction;

// Re-export core functionality for convenience
pub use self::core::{
    constants::*,
    error::{EvaluationError, InternalInconsistencyError, LightGBMError, Location, ParseError, Result},
    types::*,
    CoreCapabilities,
};

// Re-export configuration functionality
pub use self::config::{Objective, PredictionConfig, PredictionConfigBuilder, RegressionLoss};

// Re-export model structures
pub use self::boosting::{Ensemble, EnsembleBuilder, ImportanceType};
pub use self::tree::{CategoricalSplit, Leaf, Node, NumericSplit, SplitStats, Tree};

// Re-export I/O functionality
pub use self::io::{Compression, SerializationFormat};

// Re-export prediction functionality
pub use self::prediction::Predictor;

// Version information
pub use self::core::constants::LIGHTGBM_PREDICT_VERSION as VERSION;

/// Initialize the library.
///
/// Installs the `env_logger` backend (unless the application already set a
/// logger) and logs the detected capabilities. Calling it is optional and
/// repeated calls are harmless.
///
/// # Examples
///
/// ```rust
/// fn main() -> lightgbm_predict::Result<()> {
///     lightgbm_predict::init()?;
///     assert!(lightgbm_predict::is_initialized());
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Check if the library has been initialized.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}

/// Get library capabilities and feature information.
///
/// # Examples
///
/// ```rust
/// let caps = lightgbm_predict::capabilities();
/// println!("{}", caps.summary());
/// ```
pub fn capabilities() -> CoreCapabilities {
    crate::core::core_capabilities()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_initialization() {
        assert!(init().is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_capabilities() {
        let caps = capabilities();
        assert!(caps.available_threads >= 1);
        assert!(!VERSION.is_empty());
    }
}
