//! Point cloud extraction

use serde::{Deserialize, Serialize};

use crate::core::types::{IVec3, Vec3};
use crate::voxel::{TsdfVoxel, VoxelBlock, VoxelBlockHashMap};

/// Which voxels count as surface
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfacePolicy {
    /// Voxel centers whose |tsdf| is at most `max_abs_tsdf` (truncation units)
    Band { max_abs_tsdf: f32 },
    /// Points interpolated where tsdf changes sign between a voxel and its
    /// +x, +y or +z neighbor
    ZeroCrossing,
}

impl SurfacePolicy {
    /// One voxel either side of zero, for a band of `trunc_voxel_multiplier` voxels
    pub fn one_voxel_band(trunc_voxel_multiplier: f32) -> Self {
        SurfacePolicy::Band {
            max_abs_tsdf: 1.0 / trunc_voxel_multiplier,
        }
    }
}

impl Default for SurfacePolicy {
    fn default() -> Self {
        Self::one_voxel_band(3.0)
    }
}

/// Colored points in world space
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    pub colors: Vec<[u8; 3]>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Vec3, color: [u8; 3]) {
        self.positions.push(position);
        self.colors.push(color);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append another cloud
    pub fn extend(&mut self, other: PointCloud) {
        self.positions.extend(other.positions);
        self.colors.extend(other.colors);
    }

    /// Points sorted lexicographically by position, for order-insensitive comparison
    pub fn sorted(mut self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.positions[a]
                .to_array()
                .partial_cmp(&self.positions[b].to_array())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.positions = order.iter().map(|&i| self.positions[i]).collect();
        self.colors = order.iter().map(|&i| self.colors[i]).collect();
        self
    }
}

/// Read-only walk over a grid's allocated voxels
#[derive(Clone, Copy, Debug, Default)]
pub struct Extractor {
    policy: SurfacePolicy,
}

impl Extractor {
    pub fn new(policy: SurfacePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SurfacePolicy {
        self.policy
    }

    /// Emit surface points from every voxel with `weight >= weight_threshold`.
    ///
    /// Blocks are visited in coordinate order, so repeated calls on unchanged
    /// storage return identical clouds.
    pub fn extract_point_cloud(&self, grid: &VoxelBlockHashMap, weight_threshold: f32) -> PointCloud {
        let mut blocks: Vec<&VoxelBlock> = grid.blocks().collect();
        blocks.sort_unstable_by_key(|b| b.coord());

        let mut cloud = PointCloud::new();
        for block in blocks {
            match self.policy {
                SurfacePolicy::Band { max_abs_tsdf } => {
                    band_points(grid, block, weight_threshold, max_abs_tsdf, &mut cloud)
                }
                SurfacePolicy::ZeroCrossing => {
                    zero_crossing_points(grid, block, weight_threshold, &mut cloud)
                }
            }
        }

        log::debug!(
            "Extracted {} points from {} blocks (threshold {})",
            cloud.len(),
            grid.block_count(),
            weight_threshold
        );
        cloud
    }
}

#[inline]
fn passes(voxel: &TsdfVoxel, weight_threshold: f32) -> bool {
    voxel.is_observed() && voxel.weight >= weight_threshold
}

fn band_points(
    grid: &VoxelBlockHashMap,
    block: &VoxelBlock,
    weight_threshold: f32,
    max_abs_tsdf: f32,
    cloud: &mut PointCloud,
) {
    let n = block.resolution();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let voxel = block.get(x, y, z);
                if passes(voxel, weight_threshold) && voxel.tsdf.abs() <= max_abs_tsdf {
                    cloud.push(block.voxel_center(x, y, z, grid.voxel_size()), voxel.rgb());
                }
            }
        }
    }
}

fn zero_crossing_points(
    grid: &VoxelBlockHashMap,
    block: &VoxelBlock,
    weight_threshold: f32,
    cloud: &mut PointCloud,
) {
    let n = block.resolution();
    let voxel_size = grid.voxel_size();

    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let a = block.get(x, y, z);
                if !passes(a, weight_threshold) {
                    continue;
                }
                let global = block.global_index(x, y, z);
                let center = block.voxel_center(x, y, z, voxel_size);

                for axis in [IVec3::X, IVec3::Y, IVec3::Z] {
                    // Neighbors may live in the next block over
                    let Some(b) = grid.voxel(global + axis) else {
                        continue;
                    };
                    if !passes(b, weight_threshold) || (a.tsdf > 0.0) == (b.tsdf > 0.0) {
                        continue;
                    }

                    let t = a.tsdf / (a.tsdf - b.tsdf);
                    let position = center + axis.as_vec3() * (t * voxel_size);
                    let color = lerp_color(a.color, b.color, t);
                    cloud.push(position, color);
                }
            }
        }
    }
}

fn lerp_color(a: [f32; 3], b: [f32; 3], t: f32) -> [u8; 3] {
    [0, 1, 2].map(|i| (a[i] + (b[i] - a[i]) * t).round().clamp(0.0, 255.0) as u8)
}

impl VoxelBlockHashMap {
    /// Shorthand for [`Extractor::extract_point_cloud`]
    pub fn extract_point_cloud(&self, policy: SurfacePolicy, weight_threshold: f32) -> PointCloud {
        Extractor::new(policy).extract_point_cloud(self, weight_threshold)
    }
}
