//! Model Manifest - sidecar binding a parameter file to a layout
//!
//! The manifest pins the architecture layout (version + CRC32) the weights
//! were exported for and the SHA-256 of the parameter file itself.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::layout::{layout_hash, validate_layout, LayoutMismatchError, ARCHITECTURE_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub architecture_version: u8,
    pub layout_hash: u32,
    /// Lowercase hex SHA-256 of the parameter file
    pub sha256: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest parse error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("manifest {0}")]
    LayoutMismatch(#[from] LayoutMismatchError),

    #[error("model checksum mismatch: manifest {expected}, file {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl ModelManifest {
    /// Manifest describing `model_bytes` under the current layout
    pub fn for_model_bytes(model_bytes: &[u8]) -> Self {
        Self {
            architecture_version: ARCHITECTURE_VERSION,
            layout_hash: layout_hash(),
            sha256: sha256_hex(model_bytes),
            created_at: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// Check layout compatibility, then the parameter file checksum
    pub fn verify(&self, model_bytes: &[u8]) -> Result<(), ManifestError> {
        validate_layout(self.architecture_version, self.layout_hash)?;

        let actual = sha256_hex(model_bytes);
        if !actual.eq_ignore_ascii_case(self.sha256.trim()) {
            return Err(ManifestError::ChecksumMismatch {
                expected: self.sha256.clone(),
                actual,
            });
        }

        Ok(())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `<model>.json` next to the parameter file
pub fn default_manifest_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

pub fn save_manifest(manifest: &ModelManifest, path: &Path) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(manifest)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<ModelManifest, ManifestError> {
    let data = fs::read(path)?;
    let manifest: ModelManifest = serde_json::from_slice(&data)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS: &[u8] = b"pretend these are onnx weights";

    #[test]
    fn test_manifest_verifies_own_bytes() {
        let manifest = ModelManifest::for_model_bytes(WEIGHTS);
        assert_eq!(manifest.sha256.len(), 64);
        assert!(manifest.verify(WEIGHTS).is_ok());
    }

    #[test]
    fn test_reject_checksum_mismatch() {
        let manifest = ModelManifest::for_model_bytes(WEIGHTS);

        match manifest.verify(b"different weights") {
            Err(ManifestError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, manifest.sha256);
                assert_ne!(actual, expected);
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_layout_mismatch() {
        let mut manifest = ModelManifest::for_model_bytes(WEIGHTS);
        manifest.layout_hash = !layout_hash();

        match manifest.verify(WEIGHTS) {
            Err(ManifestError::LayoutMismatch(err)) => {
                assert_eq!(err.actual_hash, !layout_hash());
                assert!(ManifestError::LayoutMismatch(err)
                    .to_string()
                    .starts_with("manifest architecture layout mismatch"));
            }
            other => panic!("Expected LayoutMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_uppercase_checksum_accepted() {
        let mut manifest = ModelManifest::for_model_bytes(WEIGHTS);
        manifest.sha256 = manifest.sha256.to_uppercase();
        assert!(manifest.verify(WEIGHTS).is_ok());
    }

    #[test]
    fn test_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mnist_classifier.json");

        let original = ModelManifest::for_model_bytes(WEIGHTS);
        save_manifest(&original, &path).unwrap();

        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded, original);
        assert!(loaded.verify(WEIGHTS).is_ok());
    }

    #[test]
    fn test_load_garbage_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(load_manifest(&path), Err(ManifestError::Serialization(_))));
    }

    #[test]
    fn test_default_manifest_path() {
        let path = default_manifest_path(Path::new("/mnt/model/mnist_classifier.onnx"));
        assert_eq!(path, PathBuf::from("/mnt/model/mnist_classifier.json"));
    }
}
