//! Model file operations.
//!
//! Sources may be gzip, zstd or lz4-frame compressed; the codec is detected
//! from the leading bytes on read and chosen from the file extension on
//! write. After decompression the bytes are handed to
//! [`serialization::deserialize`](crate::io::serialization::deserialize).

use crate::boosting::Ensemble;
use crate::core::error::{ParseError, Result};
use crate::io::serialization::{self, SerializationFormat};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const LZ4_FRAME_MAGIC: &[u8] = &[0x04, 0x22, 0x4d, 0x18];

/// Compression wrapped around a model source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Plain bytes
    None,
    /// gzip stream
    Gzip,
    /// Zstandard frame
    Zstd,
    /// LZ4 frame
    Lz4,
}

impl Compression {
    /// Detect the codec from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if bytes.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else if bytes.starts_with(LZ4_FRAME_MAGIC) {
            Compression::Lz4
        } else {
            Compression::None
        }
    }

    /// Codec implied by a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("zst") => Compression::Zstd,
            Some("lz4") => Compression::Lz4,
            _ => Compression::None,
        }
    }

    /// Codec name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        }
    }

    /// Undo this compression.
    pub fn decompress(self, bytes: &[u8]) -> std::result::Result<Vec<u8>, ParseError> {
        let decoded = match self {
            Compression::None => return Ok(bytes.to_vec()),
            Compression::Gzip => {
                let mut out = Vec::new();
                MultiGzDecoder::new(bytes).read_to_end(&mut out).map(|_| out)
            }
            Compression::Zstd => zstd::stream::decode_all(bytes),
            Compression::Lz4 => {
                let mut out = Vec::new();
                lz4_flex::frame::FrameDecoder::new(bytes)
                    .read_to_end(&mut out)
                    .map(|_| out)
            }
        };
        decoded.map_err(|source| ParseError::Decompression {
            codec: self.name(),
            source,
        })
    }

    /// Apply this compression.
    pub fn compress(self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(bytes.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(bytes)?;
                encoder.finish()
            }
            Compression::Zstd => zstd::stream::encode_all(bytes, 0),
            Compression::Lz4 => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
                encoder.write_all(bytes)?;
                encoder
                    .finish()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
            }
        }
    }
}

/// Read a model file into decompressed bytes.
pub fn read_model_bytes<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<u8>, ParseError> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|source| ParseError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let compression = Compression::detect(&raw);
    if compression != Compression::None {
        log::debug!("Decompressing {} model source {}", compression.name(), path.display());
    }
    compression.decompress(&raw)
}

/// Write model bytes, compressing according to the file extension.
pub fn write_model_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let data = Compression::from_path(path).compress(bytes)?;
    fs::write(path, data)?;
    Ok(())
}

impl Ensemble {
    /// Load a model from a LightGBM text file or a snapshot, optionally
    /// compressed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ParseError> {
        let path = path.as_ref();
        let bytes = read_model_bytes(path)?;
        let ensemble = serialization::deserialize(&bytes)?;
        log::info!(
            "Loaded model from {}: {} iterations, {} classes, {} features, objective {}",
            path.display(),
            ensemble.num_iterations(),
            ensemble.num_class(),
            ensemble.num_features(),
            ensemble.objective()
        );
        Ok(ensemble)
    }

    /// Load a model from in-memory bytes in any supported encoding.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        let bytes = Compression::detect(bytes).decompress(bytes)?;
        serialization::deserialize(&bytes)
    }

    /// Load a model from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> std::result::Result<Self, ParseError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|source| ParseError::SourceUnavailable {
                path: "<reader>".into(),
                source,
            })?;
        Self::from_bytes(&bytes)
    }

    /// Render the model in LightGBM text format.
    pub fn to_model_string(&self) -> String {
        serialization::lightgbm::write_model(self)
    }

    /// Encode the model as a binary snapshot.
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        serialization::bincode::encode(self)
    }

    /// Save the model; the format and compression follow the file name
    /// (`.bin`/`.snapshot` for snapshots, `.gz`/`.zst`/`.lz4` to compress).
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let format = SerializationFormat::from_path(path);
        let bytes = serialization::serialize(self, format)?;
        write_model_bytes(path, &bytes)?;
        log::info!("Saved {} model to {}", format, path.display());
        Ok(())
    }
}

impl FromStr for Ensemble {
    type Err = ParseError;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        serialization::lightgbm::parse_model(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Objective;
    use crate::tree::{Node, NumericSplit, Tree};
    use tempfile::tempdir;

    fn sample() -> Ensemble {
        let tree = Tree::from_nodes(
            vec![
                Node::Numeric(NumericSplit::new(0, 1.5, 1, 2)),
                Node::leaf(0.5),
                Node::leaf(-0.5),
            ],
            1.0,
        )
        .unwrap();
        Ensemble::builder(1, Objective::default())
            .tree(tree)
            .build()
            .unwrap()
    }

    #[test]
    fn test_compression_detection() {
        for compression in [Compression::Gzip, Compression::Zstd, Compression::Lz4] {
            let packed = compression.compress(b"tree\nversion=v4\n").unwrap();
            assert_eq!(Compression::detect(&packed), compression);
            assert_eq!(compression.decompress(&packed).unwrap(), b"tree\nversion=v4\n");
        }
        assert_eq!(Compression::detect(b"tree\n"), Compression::None);
    }

    #[test]
    fn test_corrupt_stream_reports_codec() {
        // gzip magic followed by an unknown compression method
        let packed = [0x1f, 0x8b, 0x00, 0x00, 0, 0, 0, 0, 0, 0xff, 1, 2, 3];
        match Compression::detect(&packed).decompress(&packed) {
            Err(ParseError::Decompression { codec, .. }) => assert_eq!(codec, "gzip"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load_every_encoding() {
        let dir = tempdir().unwrap();
        let ensemble = sample();
        for name in ["model.txt", "model.txt.gz", "model.bin", "model.bin.zst", "model.txt.lz4"] {
            let path = dir.path().join(name);
            ensemble.save_model(&path).unwrap();
            assert_eq!(Ensemble::from_file(&path).unwrap(), ensemble, "{}", name);
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        match Ensemble::from_file(&path) {
            Err(ParseError::SourceUnavailable { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_from_str_and_reader() {
        let text = sample().to_model_string();
        let parsed: Ensemble = text.parse().unwrap();
        assert_eq!(parsed, sample());
        let read = Ensemble::from_reader(text.as_bytes()).unwrap();
        assert_eq!(read, sample());
    }
}
