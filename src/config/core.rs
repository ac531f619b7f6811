//! Prediction configuration and its builder.
//!
//! [`PredictionConfig`] collects the knobs of a prediction request: the
//! iteration window, the output kind and the batch worker count. It can be
//! built in code, loaded from a JSON or TOML file and overridden from
//! `LIGHTGBM_*` environment variables.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::PredictType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Configuration for a predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Number of iterations to use; `<= 0` means all of them
    pub num_iteration: i32,
    /// First iteration to use; negative values are treated as 0
    pub start_iteration: i32,
    /// Output kind
    pub predict_type: PredictType,
    /// Batch worker threads (0 = all available cores)
    pub num_threads: usize,
    /// Accept rows whose length differs from the model's feature count
    pub disable_shape_check: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            num_iteration: 0,
            start_iteration: 0,
            predict_type: PredictType::Normal,
            num_threads: 0,
            disable_shape_check: false,
        }
    }
}

impl PredictionConfig {
    /// Create a new prediction configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration limit
    pub fn with_num_iteration(mut self, num_iteration: i32) -> Self {
        self.num_iteration = num_iteration;
        self
    }

    /// Set the first iteration
    pub fn with_start_iteration(mut self, start_iteration: i32) -> Self {
        self.start_iteration = start_iteration;
        self
    }

    /// Set the output kind
    pub fn with_predict_type(mut self, predict_type: PredictType) -> Self {
        self.predict_type = predict_type;
        self
    }

    /// Set the number of batch worker threads
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Allow rows of a different length than the model's feature count
    pub fn with_disable_shape_check(mut self, disable: bool) -> Self {
        self.disable_shape_check = disable;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.start_iteration < 0 {
            return Err(LightGBMError::invalid_parameter(
                "start_iteration",
                self.start_iteration.to_string(),
                "must be >= 0",
            ));
        }
        if self.num_threads > num_cpus::get() * 2 {
            log::warn!(
                "num_threads ({}) is much larger than available cores ({})",
                self.num_threads,
                num_cpus::get()
            );
        }
        Ok(())
    }

    /// Get the effective number of threads (0 means use all available cores)
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LightGBMError::config(format!("Failed to read config file: {}", e)))?;

        let config: PredictionConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| LightGBMError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| LightGBMError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| LightGBMError::config(format!("Failed to serialize to JSON: {}", e)))?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| LightGBMError::config(format!("Failed to serialize to TOML: {}", e)))?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| LightGBMError::config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Defaults overridden by environment variables
    pub fn load_from_environment() -> Result<Self> {
        let mut config = PredictionConfig::default();
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Apply `LIGHTGBM_*` overrides from the process environment
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `LIGHTGBM_*` overrides from key/value pairs
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "LIGHTGBM_NUM_ITERATION" => {
                    self.num_iteration = value
                        .parse()
                        .map_err(|_| LightGBMError::config("Invalid LIGHTGBM_NUM_ITERATION"))?;
                }
                "LIGHTGBM_START_ITERATION" => {
                    self.start_iteration = value
                        .parse()
                        .map_err(|_| LightGBMError::config("Invalid LIGHTGBM_START_ITERATION"))?;
                }
                "LIGHTGBM_PREDICT_TYPE" => {
                    self.predict_type = value
                        .parse()
                        .map_err(|_| LightGBMError::config("Invalid LIGHTGBM_PREDICT_TYPE"))?;
                }
                "LIGHTGBM_NUM_THREADS" => {
                    self.num_threads = value
                        .parse()
                        .map_err(|_| LightGBMError::config("Invalid LIGHTGBM_NUM_THREADS"))?;
                }
                "LIGHTGBM_DISABLE_SHAPE_CHECK" => {
                    self.disable_shape_check = matches!(value, "1" | "true" | "TRUE" | "True");
                }
                _ => {}
            }
        }
        self.validate()
    }

    /// Parameter map in LightGBM naming
    pub fn as_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("num_iteration".to_string(), self.num_iteration.to_string());
        map.insert("start_iteration".to_string(), self.start_iteration.to_string());
        map.insert("predict_type".to_string(), self.predict_type.to_string());
        map.insert("num_threads".to_string(), self.num_threads.to_string());
        map.insert(
            "predict_disable_shape_check".to_string(),
            self.disable_shape_check.to_string(),
        );
        map
    }
}

/// Configuration builder collecting validation errors until `build`
#[derive(Debug, Clone)]
pub struct PredictionConfigBuilder {
    config: PredictionConfig,
    validation_errors: Vec<String>,
}

impl PredictionConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        PredictionConfigBuilder {
            config: PredictionConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the iteration limit (`<= 0` means all)
    pub fn num_iteration(mut self, num_iteration: i32) -> Self {
        self.config.num_iteration = num_iteration;
        self
    }

    /// Set the first iteration
    pub fn start_iteration(mut self, start_iteration: i32) -> Self {
        if start_iteration < 0 {
            self.validation_errors
                .push("start_iteration must be >= 0".to_string());
        }
        self.config.start_iteration = start_iteration;
        self
    }

    /// Set the output kind
    pub fn predict_type(mut self, predict_type: PredictType) -> Self {
        self.config.predict_type = predict_type;
        self
    }

    /// Set the output kind from a C API code
    pub fn predict_type_code(mut self, code: i32) -> Self {
        match PredictType::from_code(code) {
            Some(predict_type) => self.config.predict_type = predict_type,
            None => self
                .validation_errors
                .push(format!("predict_type code {} is not in 0..=3", code)),
        }
        self
    }

    /// Set the number of batch worker threads
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    /// Allow rows of a different length than the model's feature count
    pub fn disable_shape_check(mut self, disable: bool) -> Self {
        self.config.disable_shape_check = disable;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PredictionConfig> {
        if !self.validation_errors.is_empty() {
            return Err(LightGBMError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PredictionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
