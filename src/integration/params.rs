//! Integration parameters and compute device selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Per-frame integration parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegrationParams {
    /// Truncation band half-width in meters
    pub truncation_distance: f32,
    /// Multiplier from raw depth units to meters (0.001 for millimeters)
    pub depth_scale: f32,
    /// Samples farther than this (meters) are ignored
    pub depth_max: f32,
    /// Also fuse voxels more than one truncation distance in front of the
    /// surface, clamped to +1
    pub integrate_free_space: bool,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            truncation_distance: 0.04,
            depth_scale: 0.001,
            depth_max: 3.0,
            integrate_free_space: false,
        }
    }
}

impl IntegrationParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("truncation_distance", self.truncation_distance),
            ("depth_scale", self.depth_scale),
            ("depth_max", self.depth_max),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Convert a raw depth sample to meters, or None if invalid
    /// (zero, negative, NaN, or beyond `depth_max`)
    #[inline]
    pub fn metric_depth(&self, raw: f32) -> Option<f32> {
        if !raw.is_finite() || raw <= 0.0 {
            return None;
        }
        let depth = raw * self.depth_scale;
        (depth <= self.depth_max).then_some(depth)
    }
}

/// Where voxel updates run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComputeDevice {
    /// Single-threaded, block after block
    #[default]
    Serial,
    /// Blocks of one frame updated concurrently on a rayon pool.
    /// `threads == 0` lets rayon pick.
    Parallel { threads: usize },
}

impl FromStr for ComputeDevice {
    type Err = Error;

    /// Accepts `CPU:0` / `cpu` (serial) and `CPU:PARALLEL` / `parallel`.
    /// Any other device (e.g. `CUDA:0`) is unavailable.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "cpu:0" | "serial" => Ok(ComputeDevice::Serial),
            "parallel" | "cpu:parallel" => Ok(ComputeDevice::Parallel { threads: 0 }),
            other => Err(Error::Configuration(format!(
                "compute device {:?} is not available",
                other
            ))),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Serial => write!(f, "CPU:0"),
            ComputeDevice::Parallel { threads: 0 } => write!(f, "CPU:PARALLEL"),
            ComputeDevice::Parallel { threads } => write!(f, "CPU:PARALLEL ({} threads)", threads),
        }
    }
}
