//! Digit Classifier Server
//!
//! Loads the classifier once, then serves `POST /classify/v0`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use digit_classifier::config::{Config, ServiceMode};
use digit_classifier::logic::model::manifest::{default_manifest_path, save_manifest, ModelManifest};
use digit_classifier::logic::model::ModelHolder;
use digit_classifier::{create_router, AppState};

#[derive(Parser)]
#[command(name = "digit-classifier")]
#[command(about = "MNIST digit classification service", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the classification API (default)
    Serve,

    /// Write a manifest (layout + sha256) next to a model file
    WriteManifest {
        /// Model file, defaults to MODEL_PATH
        #[arg(long)]
        model: Option<PathBuf>,

        /// Manifest output path, defaults to <model>.json
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(&config);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::WriteManifest { model, output } => write_manifest(&config, model, output),
    }
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "digit_classifier=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Digit Classifier starting (mode: {:?})...", config.mode);

    let holder = match config.mode {
        ServiceMode::Predict => {
            let options = config.load_options();
            tracing::info!("Requested inference device: {}", options.device);
            tokio::task::spawn_blocking(move || ModelHolder::load(&options))
                .await
                .context("model loading task failed")?
        }
        ServiceMode::Echo => {
            tracing::info!("Echo mode: no model will be loaded");
            ModelHolder::unavailable("echo mode: no model configured")
        }
    };

    let addr = config.socket_addr();
    let app = create_router(AppState::new(config, holder));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn write_manifest(config: &Config, model: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let model_path = model.unwrap_or_else(|| config.model_path.clone());
    let output = output.unwrap_or_else(|| default_manifest_path(&model_path));

    let model_bytes = std::fs::read(&model_path)
        .with_context(|| format!("failed to read model file {}", model_path.display()))?;

    let manifest = ModelManifest::for_model_bytes(&model_bytes);
    save_manifest(&manifest, &output)?;

    tracing::info!(
        "Manifest written to {} (layout v{}, sha256 {})",
        output.display(),
        manifest.architecture_version,
        manifest.sha256
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
