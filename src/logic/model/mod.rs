//! Model Module - load-once classifier and its inference engine
//!
//! Layout versioning, manifest verification, device selection and the
//! ONNX backend live here; the HTTP layer only sees [`ModelHolder`].

pub mod device;
pub mod holder;
pub mod inference;
pub mod layout;
pub mod manifest;

#[cfg(test)]
pub(crate) mod test_graph;

// Re-export common types
pub use device::Device;
pub use holder::{EngineStatus, LoadOptions, LoadedModel, ModelHolder, ModelLoadError};
pub use inference::{InferenceEngine, InferenceError, OnnxEngine, PredictionResult};
pub use manifest::{ManifestError, ModelManifest};
