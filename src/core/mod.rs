//! Core infrastructure module.
//!
//! # Organization
//!
//! - [`types`]: Fundamental data types and enumerations
//! - [`constants`]: Model format tags and engine defaults
//! - [`error`]: Error taxonomy shared by every component
//!
//! # Usage
//!
//! ```rust
//! use lightgbm_predict::core::{
//!     constants::MODEL_VERSION,
//!     error::{EvaluationError, LightGBMError},
//!     types::PredictType,
//! };
//!
//! let err: LightGBMError = EvaluationError::FeatureCountMismatch { expected: 4, actual: 2 }.into();
//! assert_eq!(err.category(), "evaluation");
//! assert_eq!(MODEL_VERSION, "v4");
//! assert_eq!(PredictType::default(), PredictType::Normal);
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{
    EvaluationError, InternalInconsistencyError, LightGBMError, Location, ParseError, Result,
};
pub use types::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// Version information for the core module
pub const CORE_MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime capabilities of this build.
#[derive(Debug, Clone)]
pub struct CoreCapabilities {
    /// Worker threads available for batch prediction
    pub available_threads: usize,
    /// CSV input support for the command line tool
    pub csv_input: bool,
    /// Compressed model sources understood by the loader
    pub compressed_sources: Vec<&'static str>,
}

impl CoreCapabilities {
    /// Get current core capabilities
    pub fn current() -> Self {
        CoreCapabilities {
            available_threads: num_cpus::get(),
            csv_input: cfg!(feature = "csv"),
            compressed_sources: vec!["gzip", "zstd", "lz4"],
        }
    }

    /// Get a summary of available capabilities
    pub fn summary(&self) -> String {
        format!(
            "Core capabilities: {} threads, csv input {}, compressed sources [{}]",
            self.available_threads,
            if self.csv_input { "on" } else { "off" },
            self.compressed_sources.join(", ")
        )
    }
}

static CORE_INIT: Once = Once::new();
static CORE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize logging and report capabilities. Safe to call repeatedly.
pub fn initialize_core() -> Result<()> {
    CORE_INIT.call_once(|| {
        // Ignore the error when the host application already installed a logger
        let _ = env_logger::try_init();
        CORE_INITIALIZED.store(true, Ordering::Release);

        log::info!("Core module initialized successfully");
        log::debug!("{}", CoreCapabilities::current().summary());
    });
    Ok(())
}

/// Check if the core module has been initialized
pub fn is_core_initialized() -> bool {
    CORE_INITIALIZED.load(Ordering::Acquire)
}

/// Get core module capabilities
pub fn core_capabilities() -> CoreCapabilities {
    CoreCapabilities::current()
}
