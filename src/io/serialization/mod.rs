//! Model serialization.
//!
//! Two encodings are supported: LightGBM's text format, readable by the
//! reference implementation, and a compact bincode snapshot for fast
//! reloads. [`deserialize`] tells them apart by the leading bytes.

pub mod bincode;
pub mod lightgbm;

use crate::boosting::Ensemble;
use crate::core::error::{LightGBMError, ParseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// LightGBM text format
    LightGbm,
    /// Native bincode snapshot
    Bincode,
}

impl Default for SerializationFormat {
    fn default() -> Self {
        SerializationFormat::LightGbm
    }
}

impl std::fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationFormat::LightGbm => write!(f, "lightgbm"),
            SerializationFormat::Bincode => write!(f, "bincode"),
        }
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = LightGBMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lightgbm" | "lgb" | "txt" | "text" => Ok(SerializationFormat::LightGbm),
            "bincode" | "bin" | "snapshot" => Ok(SerializationFormat::Bincode),
            _ => Err(LightGBMError::serialization(format!("Unknown format: {}", s))),
        }
    }
}

impl SerializationFormat {
    /// Detect the format of decompressed model bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if self::bincode::is_snapshot(bytes) {
            SerializationFormat::Bincode
        } else {
            SerializationFormat::LightGbm
        }
    }

    /// Guess the format from a file extension, ignoring compression suffixes.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let stem = ["gz", "zst", "lz4"]
            .iter()
            .find_map(|ext| name.strip_suffix(&format!(".{}", ext)))
            .unwrap_or(&name);
        if stem.ends_with(".bin") || stem.ends_with(".snapshot") {
            SerializationFormat::Bincode
        } else {
            SerializationFormat::LightGbm
        }
    }
}

/// Decode an ensemble from decompressed bytes of either format.
pub fn deserialize(bytes: &[u8]) -> std::result::Result<Ensemble, ParseError> {
    match SerializationFormat::detect(bytes) {
        SerializationFormat::Bincode => self::bincode::decode(bytes),
        SerializationFormat::LightGbm => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                ParseError::malformed_header(format!("model source is not UTF-8 text: {}", e))
            })?;
            lightgbm::parse_model(text)
        }
    }
}

/// Encode an ensemble in the requested format.
pub fn serialize(ensemble: &Ensemble, format: SerializationFormat) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::LightGbm => Ok(lightgbm::write_model(ensemble).into_bytes()),
        SerializationFormat::Bincode => self::bincode::encode(ensemble),
    }
}
