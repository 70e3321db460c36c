//! Sparse TSDF voxel storage

pub mod voxel;
pub mod block;
pub mod block_map;

pub use voxel::TsdfVoxel;
pub use block::{BlockCoord, VoxelBlock};
pub use block_map::{BlockId, VoxelBlockHashMap};
