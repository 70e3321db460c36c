//! Voxfuse - volumetric TSDF fusion of RGB-D sequences
//!
//! Depth frames with known camera poses are fused into a sparse grid of
//! voxel blocks holding a truncated signed distance field, from which a
//! colored surface point cloud can be extracted at any time.

pub mod core;
pub mod math;
pub mod voxel;
pub mod integration;
pub mod extraction;
pub mod storage;
pub mod sequence;
pub mod config;
