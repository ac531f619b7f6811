//! Binary model snapshots.
//!
//! A snapshot is the [`SNAPSHOT_MAGIC`] tag, the little-endian layout
//! version and the bincode encoding of the ensemble. Decoding runs the same
//! validation as the text parser.

use crate::boosting::Ensemble;
use crate::core::constants::{SNAPSHOT_FORMAT_VERSION, SNAPSHOT_MAGIC};
use crate::core::error::{LightGBMError, ParseError, Result};

const PREFIX_LEN: usize = SNAPSHOT_MAGIC.len() + 4;

/// Whether `bytes` starts with the snapshot tag.
pub fn is_snapshot(bytes: &[u8]) -> bool {
    bytes.starts_with(SNAPSHOT_MAGIC)
}

/// Encode an ensemble as a snapshot.
pub fn encode(ensemble: &Ensemble) -> Result<Vec<u8>> {
    let body = bincode::serialize(ensemble)
        .map_err(|e| LightGBMError::serialization(format!("Bincode encoding failed: {}", e)))?;
    let mut out = Vec::with_capacity(PREFIX_LEN + body.len());
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a snapshot produced by [`encode`].
pub fn decode(bytes: &[u8]) -> std::result::Result<Ensemble, ParseError> {
    if !is_snapshot(bytes) {
        return Err(ParseError::Snapshot {
            message: "missing snapshot tag".to_string(),
        });
    }
    let version_bytes: [u8; 4] = bytes
        .get(SNAPSHOT_MAGIC.len()..PREFIX_LEN)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| ParseError::Snapshot {
            message: "truncated snapshot header".to_string(),
        })?;
    let version = u32::from_le_bytes(version_bytes);
    if version != SNAPSHOT_FORMAT_VERSION {
        return Err(ParseError::Snapshot {
            message: format!(
                "layout version {} is not supported (expected {})",
                version, SNAPSHOT_FORMAT_VERSION
            ),
        });
    }
    Ok(bincode::deserialize(&bytes[PREFIX_LEN..])?)
}
