//! Inference Engine - ONNX Runtime Integration
//!
//! Runs the digit classifier forward pass and picks the top class.
//! The backend sits behind [`InferenceEngine`] so it can be swapped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::device::Device;
use super::layout::CLASS_COUNT;
use crate::logic::preprocess::NormalizedTensor;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Prediction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub label: u8,
    pub scores: Vec<f32>,
    pub inference_time_us: u64, // Microseconds
}

/// Latency stats
#[derive(Debug, Default)]
pub struct InferenceStats {
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl InferenceStats {
    pub fn record(&self, latency_us: u64) {
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.inference_count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f32 {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.count();
        if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 }
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("onnx runtime: {0}")]
    Runtime(String),

    #[error("model produced {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("model output '{0}' missing from results")]
    MissingOutput(String),

    #[error("model produced no finite score")]
    NoFiniteScore,
}

fn runtime<E: std::fmt::Display>(err: E) -> InferenceError {
    InferenceError::Runtime(err.to_string())
}

// ============================================================================
// INFERENCE ENGINE TRAIT
// ============================================================================

/// Inference backend (ONNX, test doubles, ...)
pub trait InferenceEngine: Send + Sync {
    /// Raw class scores for a single input, no gradient, no mutation of weights
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError>;

    /// Backend description for status output
    fn name(&self) -> &str;
}

/// Forward pass + top-1 selection
pub fn predict(engine: &dyn InferenceEngine, input: &NormalizedTensor) -> Result<PredictionResult, InferenceError> {
    let start_time = Instant::now();

    let scores = engine.forward(input)?;
    if scores.len() != CLASS_COUNT {
        return Err(InferenceError::OutputShape {
            expected: CLASS_COUNT,
            actual: scores.len(),
        });
    }

    let label = argmax(&scores).ok_or(InferenceError::NoFiniteScore)? as u8;

    Ok(PredictionResult {
        label,
        scores,
        inference_time_us: start_time.elapsed().as_micros() as u64,
    })
}

/// Index of the maximum score; ties go to the first maximum, NaN never wins
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((idx, score)),
        }
    }

    best.map(|(idx, _)| idx)
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX Runtime backed classifier
pub struct OnnxEngine {
    // Session::run needs &mut, so forward passes are serialized here
    session: Mutex<Session>,
    output_name: String,
    name: String,
}

impl std::fmt::Debug for OnnxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEngine")
            .field("output_name", &self.output_name)
            .field("name", &self.name)
            .finish()
    }
}

impl OnnxEngine {
    /// Build a session from in-memory ONNX bytes on `device`
    pub fn from_bytes(
        model_bytes: &[u8],
        device: Device,
        intra_threads: Option<usize>,
    ) -> Result<Self, InferenceError> {
        tracing::info!("Creating ONNX session from memory ({} bytes) on {}", model_bytes.len(), device);

        let mut builder = Session::builder()
            .map_err(runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?;

        if let Some(threads) = intra_threads {
            builder = builder.with_intra_threads(threads).map_err(runtime)?;
        }

        let session = with_device(builder, device)?
            .commit_from_memory(model_bytes)
            .map_err(runtime)?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::MissingOutput("<none defined>".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            name: format!("ONNX Runtime ({})", device),
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
        let input_tensor = Tensor::from_array(input.as_array().clone()).map_err(runtime)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor]).map_err(runtime)?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| InferenceError::MissingOutput(self.output_name.clone()))?;

        let (_, data) = output.try_extract_tensor::<f32>().map_err(runtime)?;

        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, InferenceError> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(id) => builder
            .with_execution_providers([CUDAExecutionProvider::default().with_device_id(id).build()])
            .map_err(runtime),
    }
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, _device: Device) -> Result<SessionBuilder, InferenceError> {
    Ok(builder)
}
