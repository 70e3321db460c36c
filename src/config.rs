//! Run configuration loaded from JSON

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voxfuse_io::DatasetLayout;

use crate::core::camera::CameraIntrinsics;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::extraction::SurfacePolicy;
use crate::integration::{ComputeDevice, IntegrationParams};
use crate::voxel::VoxelBlockHashMap;

/// Voxel grid and integration settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Voxel edge length in meters
    pub voxel_size: f32,
    /// Voxels per block side (power of two, 2..=64)
    pub block_resolution: u32,
    /// Truncation distance in voxels
    pub trunc_voxel_multiplier: f32,
    /// Raw depth units to meters
    pub depth_scale: f32,
    /// Depth cutoff in meters
    pub depth_max: f32,
    /// `CPU:0` or `CPU:PARALLEL`
    pub device: String,
    /// Worker threads for `CPU:PARALLEL` (0 = one per core)
    pub threads: usize,
    /// Block budget; None leaves allocation bounded by memory only
    pub max_blocks: Option<usize>,
    /// Fuse free space in front of the truncation band as +1
    pub integrate_free_space: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.01,
            block_resolution: 8,
            trunc_voxel_multiplier: 8.0,
            depth_scale: 0.001,
            depth_max: 3.0,
            device: "CPU:0".to_string(),
            threads: 0,
            max_blocks: None,
            integrate_free_space: false,
        }
    }
}

/// Everything a fusion run needs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Directory holding the `{source}-depth-images` etc. folders
    pub data_dir: PathBuf,
    /// Camera source prefix used in directory and file names
    pub camera_source: String,
    /// Where snapshot, point cloud and manifest are written
    pub output_dir: PathBuf,
    pub intrinsics: CameraIntrinsics,
    pub volume: VolumeConfig,
    /// Minimum accumulated weight for extracted points
    pub weight_threshold: f32,
    /// Surface test for extraction; None means one voxel either side of zero
    pub surface_policy: Option<SurfacePolicy>,
    /// Never integrate the last frame of the sequence
    pub skip_final_frame: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            camera_source: "kinect".to_string(),
            output_dir: PathBuf::from("output"),
            intrinsics: CameraIntrinsics::default(),
            volume: VolumeConfig::default(),
            weight_threshold: 3.0,
            surface_policy: None,
            skip_final_frame: true,
        }
    }
}

impl FusionConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject anything that would fail later, before a frame is read
    pub fn validate(&self) -> Result<()> {
        let v = &self.volume;
        for (name, value) in [
            ("voxel_size", v.voxel_size),
            ("trunc_voxel_multiplier", v.trunc_voxel_multiplier),
            ("depth_scale", v.depth_scale),
            ("depth_max", v.depth_max),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Configuration(format!(
                    "volume.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.weight_threshold.is_finite() || self.weight_threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "weight_threshold must be non-negative, got {}",
                self.weight_threshold
            )));
        }
        if !self.intrinsics.is_valid() {
            return Err(Error::Configuration(format!(
                "invalid intrinsics {:?}",
                self.intrinsics
            )));
        }
        if v.max_blocks == Some(0) {
            return Err(Error::Configuration("volume.max_blocks must be at least 1".into()));
        }
        if let Some(SurfacePolicy::Band { max_abs_tsdf }) = self.surface_policy {
            if !(max_abs_tsdf > 0.0 && max_abs_tsdf <= 1.0) {
                return Err(Error::Configuration(format!(
                    "surface band must be in (0, 1], got {}",
                    max_abs_tsdf
                )));
            }
        }

        self.device()?;
        self.integration_params().validate()?;
        VoxelBlockHashMap::new(v.voxel_size, v.block_resolution)?;
        Ok(())
    }

    /// `trunc_voxel_multiplier * voxel_size`
    pub fn truncation_distance(&self) -> f32 {
        self.volume.trunc_voxel_multiplier * self.volume.voxel_size
    }

    pub fn integration_params(&self) -> IntegrationParams {
        IntegrationParams {
            truncation_distance: self.truncation_distance(),
            depth_scale: self.volume.depth_scale,
            depth_max: self.volume.depth_max,
            integrate_free_space: self.volume.integrate_free_space,
        }
    }

    /// Parsed device with the configured thread count applied
    pub fn device(&self) -> Result<ComputeDevice> {
        Ok(match self.volume.device.parse::<ComputeDevice>()? {
            ComputeDevice::Parallel { .. } => ComputeDevice::Parallel {
                threads: self.volume.threads,
            },
            serial => serial,
        })
    }

    pub fn surface_policy(&self) -> SurfacePolicy {
        self.surface_policy
            .unwrap_or_else(|| SurfacePolicy::one_voxel_band(self.volume.trunc_voxel_multiplier))
    }

    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout::new(&self.data_dir, &self.camera_source)
    }

    /// Empty grid with the configured geometry and block budget
    pub fn build_grid(&self) -> Result<VoxelBlockHashMap> {
        Ok(VoxelBlockHashMap::new(self.volume.voxel_size, self.volume.block_resolution)?
            .with_max_blocks(self.volume.max_blocks))
    }
}
