//! Surface extraction from fused voxels

pub mod point_cloud;
pub mod ply;

pub use point_cloud::{Extractor, PointCloud, SurfacePolicy};
pub use ply::{PlyFormat, write_ply, write_ply_file};
