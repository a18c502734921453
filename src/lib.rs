//! Digit Classifier - MNIST inference service
//!
//! Accepts a base64 encoded image, normalizes it to the classifier's input
//! contract and answers with the predicted digit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      DIGIT CLASSIFIER                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌──────────────────────┐   │
//! │  │  HTTP     │──▶│  Decoder   │──▶│  Preprocessor        │   │
//! │  │  (Axum)   │   │  (base64)  │   │  (gray/28x28/norm)   │   │
//! │  └─────┬─────┘   └────────────┘   └──────────┬───────────┘   │
//! │        │                                     ▼               │
//! │        │          ┌──────────────────────────────────────┐   │
//! │        └─────────▶│  ModelHolder ─▶ InferenceEngine      │   │
//! │                   │  (loaded once)  (ONNX Runtime)       │   │
//! │                   └──────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

use config::{Config, ServiceMode};
use logic::model::ModelHolder;
use models::CLASSIFY_ROUTE;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub holder: Arc<ModelHolder>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, holder: ModelHolder) -> Self {
        Self {
            holder: Arc::new(holder),
            config,
        }
    }

    /// Whether classification requests can currently succeed
    pub fn is_ready(&self) -> bool {
        match self.config.mode {
            ServiceMode::Echo => true,
            ServiceMode::Predict => self.holder.is_loaded(),
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/ready", get(handlers::health::ready))
        .route(CLASSIFY_ROUTE, post(handlers::classify::classify))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
