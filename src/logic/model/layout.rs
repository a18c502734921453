//! Architecture Layout - Centralized Model Contract
//!
//! **CRITICAL: This file controls the weights/architecture contract**
//!
//! ## Rules (NEVER break these):
//! 1. Add, remove or resize a layer → increment ARCHITECTURE_VERSION
//! 2. Change input shape → increment ARCHITECTURE_VERSION
//! 3. Change normalization statistics → increment ARCHITECTURE_VERSION
//!
//! A parameter file whose manifest was produced for a different layout is
//! refused at startup instead of producing meaningless predictions.

use crc32fast::Hasher;
use thiserror::Error;

// ============================================================================
// ARCHITECTURE VERSION
// ============================================================================

/// Current architecture layout version
/// MUST be incremented when layout changes
pub const ARCHITECTURE_VERSION: u8 = 1;

// ============================================================================
// INPUT / OUTPUT CONTRACT
// ============================================================================

pub const INPUT_CHANNELS: usize = 1;
pub const INPUT_HEIGHT: usize = 28;
pub const INPUT_WIDTH: usize = 28;

/// NCHW, batch of one
pub const INPUT_SHAPE: (usize, usize, usize, usize) = (1, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH);

/// Number of class scores produced per input (digits 0-9)
pub const CLASS_COUNT: usize = 10;

/// Training-set statistics of the [0, 1] scaled pixels
pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;

// ============================================================================
// ARCHITECTURE LAYOUT (Authoritative source)
// ============================================================================

/// Network skeleton in forward order
/// This is the SINGLE SOURCE OF TRUTH the manifest hash is computed from
pub const ARCHITECTURE_LAYOUT: &[&str] = &[
    "input:1x28x28",
    "normalize:0.1307/0.3081",
    "conv1:conv2d(1,32,k3,p1)",
    "relu",
    "pool:maxpool(2,2)",
    "conv2:conv2d(32,64,k3,p1)",
    "relu",
    "pool:maxpool(2,2)",
    "dropout1:0.25",
    "flatten:3136",
    "fc1:linear(3136,128)",
    "relu",
    "dropout2:0.5",
    "fc2:linear(128,10)",
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the version byte and every layer descriptor
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[ARCHITECTURE_VERSION]);

    for layer in ARCHITECTURE_LAYOUT {
        hasher.update(layer.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// A manifest's layout doesn't match this build
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "architecture layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
     got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

/// Validate that a persisted layout matches the current one
pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if version != ARCHITECTURE_VERSION || hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: ARCHITECTURE_VERSION,
            expected_hash: current_hash,
            actual_version: version,
            actual_hash: hash,
        });
    }

    Ok(())
}
