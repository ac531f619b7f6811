//! Model format and engine constants.
//!
//! The text-format constants mirror the tags LightGBM writes, so files
//! produced here stay readable by the reference implementation.

/// First line of every text model file.
pub const MODEL_HEADER_TAG: &str = "tree";

/// Format version written by the serializer.
pub const MODEL_VERSION: &str = "v4";

/// Format versions the parser accepts.
pub const SUPPORTED_MODEL_VERSIONS: &[&str] = &["v2", "v3", "v4"];

/// Line that terminates the tree blocks of a text model.
pub const END_OF_TREES: &str = "end of trees";

/// Magnitude at or below which a value counts as zero for `MissingType::Zero`.
/// Matches LightGBM's `kZeroThreshold` (a 32-bit float widened to 64 bits).
pub const ZERO_THRESHOLD: f64 = 1e-35_f32 as f64;

/// `decision_type` bit marking a categorical split.
pub const CATEGORICAL_MASK: u8 = 1;

/// `decision_type` bit marking the default (missing) direction as left.
pub const DEFAULT_LEFT_MASK: u8 = 2;

/// Bit offset of the two-bit missing type inside `decision_type`.
pub const MISSING_TYPE_SHIFT: u8 = 2;

/// Leading bytes of a binary model snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 8] = b"LGBMRSNP";

/// Layout version of the binary snapshot.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Batches with fewer rows than this are scored on the calling thread.
pub const MIN_PARALLEL_ROWS: usize = 64;

/// Library version string.
pub const LIGHTGBM_PREDICT_VERSION: &str = env!("CARGO_PKG_VERSION");
