//! Model Holder - load once at startup, read-only afterwards
//!
//! The holder is built before the listener binds and injected into the HTTP
//! state. It is either `Loaded` or `Unavailable` for the whole process
//! lifetime; there is no reload path.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::device::Device;
use super::inference::{predict, InferenceEngine, InferenceError, InferenceStats, OnnxEngine, PredictionResult};
use super::layout::{layout_hash, ARCHITECTURE_VERSION};
use super::manifest::{load_manifest, ManifestError};
use crate::logic::preprocess::NormalizedTensor;

/// Where and how to load the classifier
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub model_path: PathBuf,
    pub manifest_path: PathBuf,
    pub require_manifest: bool,
    pub device: Device,
    pub intra_threads: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file not found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest required but not found at '{}'", .0.display())]
    ManifestMissing(PathBuf),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("failed to load model: {0}")]
    Session(#[source] InferenceError),

    #[error("model does not match the expected architecture: {0}")]
    Probe(#[source] InferenceError),
}

// ============================================================================
// LOADED MODEL
// ============================================================================

/// A ready-to-use classifier plus its execution device
pub struct LoadedModel {
    engine: Box<dyn InferenceEngine>,
    device: Device,
    source: String,
    loaded_at: DateTime<Utc>,
    stats: InferenceStats,
}

impl LoadedModel {
    pub fn new(engine: Box<dyn InferenceEngine>, device: Device, source: impl Into<String>) -> Self {
        Self {
            engine,
            device,
            source: source.into(),
            loaded_at: Utc::now(),
            stats: InferenceStats::default(),
        }
    }

    /// Forward pass + top-1, recorded in the latency stats
    pub fn predict(&self, input: &NormalizedTensor) -> Result<PredictionResult, InferenceError> {
        let result = predict(self.engine.as_ref(), input)?;
        self.stats.record(result.inference_time_us);
        Ok(result)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

// ============================================================================
// HOLDER
// ============================================================================

pub enum ModelHolder {
    Loaded(LoadedModel),
    Unavailable { reason: String },
}

/// Engine Status for health output
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub model_source: Option<String>,
    pub backend: Option<String>,
    pub device: Option<Device>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
    pub architecture_version: u8,
    pub layout_hash: String,
    pub unavailable_reason: Option<String>,
}

impl ModelHolder {
    /// Load the classifier; never fails, a failure yields `Unavailable`
    pub fn load(options: &LoadOptions) -> Self {
        tracing::info!("Loading model from: {}", options.model_path.display());

        match load_model(options) {
            Ok(model) => {
                tracing::info!(
                    "Model '{}' loaded successfully on {}",
                    model.source(),
                    model.device()
                );
                ModelHolder::Loaded(model)
            }
            Err(e) => {
                tracing::error!("Error loading model from '{}': {}", options.model_path.display(), e);
                tracing::warn!("Classification requests will be answered with 503 until restart");
                ModelHolder::Unavailable { reason: e.to_string() }
            }
        }
    }

    pub fn loaded(model: LoadedModel) -> Self {
        ModelHolder::Loaded(model)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ModelHolder::Unavailable { reason: reason.into() }
    }

    /// Current model, or `None` when unavailable
    pub fn current(&self) -> Option<&LoadedModel> {
        match self {
            ModelHolder::Loaded(model) => Some(model),
            ModelHolder::Unavailable { .. } => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    pub fn status(&self) -> EngineStatus {
        let mut status = EngineStatus {
            model_loaded: false,
            model_source: None,
            backend: None,
            device: None,
            loaded_at: None,
            inference_count: 0,
            avg_latency_ms: 0.0,
            architecture_version: ARCHITECTURE_VERSION,
            layout_hash: format!("{:08x}", layout_hash()),
            unavailable_reason: None,
        };

        match self {
            ModelHolder::Loaded(model) => {
                status.model_loaded = true;
                status.model_source = Some(model.source.clone());
                status.backend = Some(model.engine.name().to_string());
                status.device = Some(model.device);
                status.loaded_at = Some(model.loaded_at);
                status.inference_count = model.stats.count();
                status.avg_latency_ms = model.stats.avg_latency_ms();
            }
            ModelHolder::Unavailable { reason } => {
                status.unavailable_reason = Some(reason.clone());
            }
        }

        status
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// existence -> read -> manifest -> session -> architecture probe
pub fn load_model(options: &LoadOptions) -> Result<LoadedModel, ModelLoadError> {
    let path = &options.model_path;
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.clone()));
    }

    let model_bytes = fs::read(path)?;
    verify_manifest(options, &model_bytes)?;

    let device = options.device.effective();
    let engine = OnnxEngine::from_bytes(&model_bytes, device, options.intra_threads)
        .map_err(ModelLoadError::Session)?;

    probe(&engine)?;

    Ok(LoadedModel::new(Box::new(engine), device, path.display().to_string()))
}

fn verify_manifest(options: &LoadOptions, model_bytes: &[u8]) -> Result<(), ModelLoadError> {
    let manifest_path = &options.manifest_path;

    if !manifest_path.exists() {
        if options.require_manifest {
            return Err(ModelLoadError::ManifestMissing(manifest_path.clone()));
        }
        tracing::warn!(
            "No manifest at '{}', skipping layout/checksum verification",
            manifest_path.display()
        );
        return Ok(());
    }

    let manifest = load_manifest(manifest_path)?;
    manifest.verify(model_bytes)?;

    tracing::info!(
        "Manifest verified: layout v{} ({:08x}), sha256 {}",
        manifest.architecture_version,
        manifest.layout_hash,
        manifest.sha256
    );
    Ok(())
}

/// Run a zero input through the engine and require a full score vector
pub fn probe(engine: &dyn InferenceEngine) -> Result<(), ModelLoadError> {
    predict(engine, &NormalizedTensor::zeros())
        .map(|_| ())
        .map_err(ModelLoadError::Probe)
}
