//! Boosted ensemble model.

pub mod ensemble;

pub use ensemble::{Ensemble, EnsembleBuilder, ImportanceType};
