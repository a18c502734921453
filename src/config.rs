//! Configuration module

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::logic::model::manifest::default_manifest_path;
use crate::logic::model::{Device, LoadOptions};

/// Mount path of the provisioned parameter file
pub const DEFAULT_MODEL_PATH: &str = "/mnt/model/mnist_classifier.onnx";

pub const DEFAULT_PORT: u16 = 8081;

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Accelerator when built with CUDA support, CPU otherwise
#[cfg(feature = "cuda")]
pub const DEFAULT_DEVICE: &str = "cuda";
#[cfg(not(feature = "cuda"))]
pub const DEFAULT_DEVICE: &str = "cpu";

/// What `POST /classify/v0` answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Run the digit classifier
    Predict,
    /// No model, return the decoded bytes as hex
    Echo,
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "predict" | "model" => Ok(ServiceMode::Predict),
            "echo" => Ok(ServiceMode::Echo),
            other => Err(format!("unknown service mode '{}'", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Predict or echo
    pub mode: ServiceMode,

    /// ONNX parameter file, read once at startup
    pub model_path: PathBuf,

    /// Sidecar manifest (layout + checksum)
    pub manifest_path: PathBuf,

    /// Refuse to serve when the manifest is absent
    pub require_manifest: bool,

    /// Execution device string (cpu, cuda, cuda:N)
    pub device: String,

    /// ONNX Runtime intra-op threads
    pub intra_threads: Option<usize>,

    /// Request body limit in bytes
    pub max_body_bytes: usize,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let manifest_path = lookup("MODEL_MANIFEST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_manifest_path(&model_path));

        Self {
            host: lookup("HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),

            mode: lookup("SERVICE_MODE")
                .and_then(|m| m.parse().ok())
                .unwrap_or(ServiceMode::Predict),

            model_path,
            manifest_path,

            require_manifest: lookup("REQUIRE_MANIFEST")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),

            device: lookup("DEVICE").unwrap_or_else(|| DEFAULT_DEVICE.to_string()),

            intra_threads: lookup("INTRA_THREADS")
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0),

            max_body_bytes: lookup("MAX_BODY_BYTES")
                .and_then(|b| b.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),

            environment: lookup("ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Model loading parameters for the holder
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            model_path: self.model_path.clone(),
            manifest_path: self.manifest_path.clone(),
            require_manifest: self.require_manifest,
            device: Device::parse_or_cpu(&self.device),
            intra_threads: self.intra_threads,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8081);
        assert_eq!(config.mode, ServiceMode::Predict);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.manifest_path, PathBuf::from("/mnt/model/mnist_classifier.json"));
        assert!(!config.require_manifest);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(!config.is_production());
    }

    #[test]
    fn test_default_device_follows_cuda_feature() {
        let config = Config::default();
        if cfg!(feature = "cuda") {
            assert_eq!(config.device, "cuda");
            assert_eq!(config.load_options().device, Device::Cuda(0));
        } else {
            assert_eq!(config.device, "cpu");
            assert_eq!(config.load_options().device, Device::Cpu);
        }
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("SERVICE_MODE", "echo"),
            ("MODEL_PATH", "/models/digits.onnx"),
            ("REQUIRE_MANIFEST", "true"),
            ("DEVICE", "cuda:1"),
            ("INTRA_THREADS", "4"),
            ("ENVIRONMENT", "production"),
        ]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.mode, ServiceMode::Echo);
        assert_eq!(config.manifest_path, PathBuf::from("/models/digits.json"));
        assert!(config.require_manifest);
        assert_eq!(config.intra_threads, Some(4));
        assert!(config.is_production());

        let opts = config.load_options();
        assert_eq!(opts.device, Device::Cuda(1));
        assert_eq!(opts.model_path, PathBuf::from("/models/digits.onnx"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("SERVICE_MODE", "banana"),
            ("INTRA_THREADS", "0"),
            ("DEVICE", "tpu"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.mode, ServiceMode::Predict);
        assert_eq!(config.intra_threads, None);
        assert_eq!(config.load_options().device, Device::Cpu);
    }

    #[test]
    fn test_explicit_manifest_path() {
        let config = config_from(&[("MODEL_MANIFEST_PATH", "/etc/digits/manifest.json")]);
        assert_eq!(config.manifest_path, PathBuf::from("/etc/digits/manifest.json"));
    }
}
