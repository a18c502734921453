//! Execution device selection

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Processing unit the ONNX session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
}

impl Device {
    /// Device actually usable by this build.
    ///
    /// Without the `cuda` feature a CUDA request falls back to CPU.
    pub fn effective(self) -> Device {
        match self {
            Device::Cpu => Device::Cpu,
            #[cfg(feature = "cuda")]
            Device::Cuda(id) => Device::Cuda(id),
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => {
                tracing::warn!("CUDA requested but cuda feature not enabled. Falling back to CPU.");
                Device::Cpu
            }
        }
    }

    /// Parse a device string, falling back to CPU on anything unrecognized
    pub fn parse_or_cpu(value: &str) -> Device {
        value.parse().unwrap_or_else(|e| {
            tracing::warn!("{}, using cpu", e);
            Device::Cpu
        })
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let device = s.trim().to_lowercase();

        if device == "cpu" {
            Ok(Device::Cpu)
        } else if device == "cuda" || device == "gpu" {
            Ok(Device::Cuda(0))
        } else if let Some(id) = device.strip_prefix("cuda:") {
            id.parse::<i32>()
                .ok()
                .filter(|id| *id >= 0)
                .map(Device::Cuda)
                .ok_or_else(|| format!("invalid CUDA device id '{}'", id))
        } else {
            Err(format!("unknown device '{}'", s))
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
