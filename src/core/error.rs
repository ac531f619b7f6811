//! Error handling and error types for the LightGBM inference engine.
//!
//! Every failure the engine can produce is returned as a value. The three
//! component taxonomies ([`ParseError`], [`EvaluationError`] and
//! [`InternalInconsistencyError`]) convert into the crate-wide
//! [`LightGBMError`] through `From`, so `?` works across module boundaries.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum LightGBMError {
    /// Malformed, inconsistent or unreadable model source
    #[error("Model parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    /// Caller-supplied features incompatible with the model
    #[error("Evaluation error: {source}")]
    Evaluation {
        #[from]
        source: EvaluationError,
    },

    /// Engine invariant violated (indicates a bug, never a caller error)
    #[error("Internal inconsistency: {source}")]
    Internal {
        #[from]
        source: InternalInconsistencyError,
    },

    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Model encoding errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Worker pool construction errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// File I/O errors outside of model loading
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },
}

/// Section of a model source an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The global header before the first tree block
    Header,
    /// The block of the tree with the given index
    Tree(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Header => write!(f, "header"),
            Location::Tree(index) => write!(f, "tree {}", index),
        }
    }
}

/// Errors raised while turning a serialized model into an ensemble.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read model source {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decompress {codec} model source: {source}")]
    Decompression {
        codec: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("unsupported model format version `{version}`")]
    UnsupportedVersion { version: String },

    #[error("missing field `{field}` in {location}")]
    MissingField {
        location: Location,
        field: &'static str,
    },

    #[error("invalid value for `{field}` in {location}: {message}")]
    InvalidValue {
        location: Location,
        field: String,
        message: String,
    },

    #[error("count mismatch for `{field}` in {location}: expected {expected}, got {actual}")]
    CountMismatch {
        location: Location,
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("inconsistent node graph in tree {tree} at node {node}: {reason}")]
    InvalidTree {
        tree: usize,
        node: usize,
        reason: String,
    },

    #[error("unsupported feature in {location}: {feature}")]
    Unsupported {
        location: Location,
        feature: String,
    },

    #[error("invalid binary snapshot: {message}")]
    Snapshot { message: String },
}

impl ParseError {
    pub(crate) fn invalid_value<F, M>(location: Location, field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        ParseError::InvalidValue {
            location,
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn count_mismatch<F: Into<String>>(
        location: Location,
        field: F,
        expected: usize,
        actual: usize,
    ) -> Self {
        ParseError::CountMismatch {
            location,
            field: field.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn malformed_header<S: Into<String>>(reason: S) -> Self {
        ParseError::MalformedHeader {
            reason: reason.into(),
        }
    }
}

/// Errors raised when a feature vector does not fit the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("feature count mismatch: model expects {expected}, row has {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("split feature {feature} is out of range for a row of {len} values")]
    FeatureIndexOutOfRange { feature: usize, len: usize },

    #[error("buffer of {len} values does not hold a {nrow} x {ncol} matrix")]
    InvalidShape { len: usize, nrow: usize, ncol: usize },
}

/// Engine self-check failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternalInconsistencyError {
    #[error("wrong length for predict results: expected {expected}, produced {actual}")]
    OutputLengthMismatch { expected: usize, actual: usize },
}

/// Type alias for Results using LightGBMError
pub type Result<T> = std::result::Result<T, LightGBMError>;

impl LightGBMError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LightGBMError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        LightGBMError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        LightGBMError::Serialization {
            message: message.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        LightGBMError::Threading {
            message: message.into(),
        }
    }

    /// Check if retrying with different input can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            LightGBMError::Parse { .. } => false,
            LightGBMError::Evaluation { .. } => true,
            LightGBMError::Internal { .. } => false,
            LightGBMError::Config { .. } => false,
            LightGBMError::InvalidParameter { .. } => false,
            LightGBMError::Serialization { .. } => false,
            LightGBMError::Threading { .. } => true,
            LightGBMError::IO { .. } => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            LightGBMError::Parse { .. } => "parse",
            LightGBMError::Evaluation { .. } => "evaluation",
            LightGBMError::Internal { .. } => "internal",
            LightGBMError::Config { .. } => "config",
            LightGBMError::InvalidParameter { .. } => "invalid_parameter",
            LightGBMError::Serialization { .. } => "serialization",
            LightGBMError::Threading { .. } => "threading",
            LightGBMError::IO { .. } => "io",
        }
    }
}

impl From<bincode::Error> for ParseError {
    fn from(err: bincode::Error) -> Self {
        ParseError::Snapshot {
            message: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for LightGBMError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        LightGBMError::threading(err.to_string())
    }
}
