//! Configuration management.
//!
//! [`core`] holds the prediction configuration and its builder;
//! [`objective`] decodes the objective recorded in a model and owns the
//! output transforms.

pub mod core;
pub mod objective;

pub use self::core::{PredictionConfig, PredictionConfigBuilder};
pub use self::objective::{softmax, Objective, RegressionLoss};

/// Configuration file the command line tool looks for when none is given
pub const DEFAULT_CONFIG_FILE: &str = "lightgbm.toml";
