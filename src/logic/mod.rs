//! Inference pipeline: decode -> preprocess -> model

pub mod decode;
pub mod model;
pub mod preprocess;

pub use decode::DecodeError;
pub use preprocess::{NormalizedTensor, PreprocessError};
