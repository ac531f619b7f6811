//! Model input and output.
//!
//! [`model_file`] reads and writes model files, handling compressed
//! sources; [`serialization`] converts between bytes and an
//! [`Ensemble`](crate::boosting::Ensemble) in LightGBM text or bincode
//! snapshot form.

pub mod model_file;
pub mod serialization;

pub use model_file::{read_model_bytes, write_model_bytes, Compression};
pub use serialization::SerializationFormat;
