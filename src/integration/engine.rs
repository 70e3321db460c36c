//! Projective TSDF integration of depth frames into a block map

use std::collections::HashSet;

use rayon::prelude::*;

use crate::core::camera::CameraIntrinsics;
use crate::core::error::Error;
use crate::core::types::{Affine3A, Result};
use crate::math::{Aabb, Frustum};
use crate::voxel::{BlockCoord, VoxelBlock, VoxelBlockHashMap};
use super::frame::Frame;
use super::params::{ComputeDevice, IntegrationParams};

/// Weight given to every accepted sample
const SAMPLE_WEIGHT: f32 = 1.0;

/// Counters for one integrated frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    /// Depth pixels with a usable sample
    pub valid_pixels: usize,
    /// Blocks touched by this frame
    pub candidate_blocks: usize,
    /// Blocks newly allocated by this frame
    pub allocated_blocks: usize,
    /// Voxels whose running average changed
    pub updated_voxels: usize,
}

impl IntegrationStats {
    /// True if the frame did not change the volume
    pub fn is_noop(&self) -> bool {
        self.updated_voxels == 0 && self.allocated_blocks == 0
    }
}

/// Fuses frames into a [`VoxelBlockHashMap`]
///
/// Each call allocates every block the frame needs before touching a voxel,
/// then updates blocks independently (optionally on a rayon pool). A failed
/// allocation therefore never leaves a half-fused frame behind.
#[derive(Debug)]
pub struct IntegrationEngine {
    params: IntegrationParams,
    device: ComputeDevice,
    pool: Option<rayon::ThreadPool>,
}

impl IntegrationEngine {
    pub fn new(params: IntegrationParams, device: ComputeDevice) -> Result<Self> {
        params.validate()?;

        let pool = match device {
            ComputeDevice::Serial => None,
            ComputeDevice::Parallel { threads } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("voxfuse-integrate-{}", i))
                    .build()
                    .map_err(|e| Error::Configuration(format!("thread pool: {}", e)))?,
            ),
        };

        Ok(Self { params, device, pool })
    }

    pub fn params(&self) -> &IntegrationParams {
        &self.params
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Integrate one frame.
    ///
    /// A frame without a single valid depth sample is a no-op. Fails with
    /// `MalformedInput` for inconsistent shapes or a non-rigid pose, and with
    /// `OutOfMemory` if the blocks it needs cannot be allocated; in both
    /// cases no voxel is modified.
    pub fn integrate(&self, grid: &mut VoxelBlockHashMap, frame: &Frame) -> Result<IntegrationStats> {
        let camera_to_world = frame.validate()?;
        let frustum = Frustum::from_camera(&frame.intrinsics, &camera_to_world, self.params.depth_max);

        let (candidates, valid_pixels) = self.candidate_blocks(grid, frame, &camera_to_world, &frustum);
        let mut stats = IntegrationStats {
            valid_pixels,
            candidate_blocks: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            log::debug!("Frame has no valid depth inside the frustum, nothing to integrate");
            return Ok(stats);
        }

        // Fail before allocating anything if the new blocks cannot all fit
        let new_blocks = candidates.iter().filter(|c| !grid.contains(**c)).count();
        if let Some(max) = grid.max_blocks() {
            if grid.block_count() + new_blocks > max {
                return Err(Error::OutOfMemory(format!(
                    "frame needs {} new blocks, {} of {} in use",
                    new_blocks,
                    grid.block_count(),
                    max
                )));
            }
        }

        let mut selected = vec![false; grid.block_count() + new_blocks];
        for &coord in &candidates {
            let id = grid.allocate(coord)?;
            selected[id] = true;
        }
        stats.allocated_blocks = new_blocks;
        if let Some(max) = grid.max_blocks() {
            if new_blocks > 0 && grid.block_count() * 10 >= max * 9 {
                log::warn!("Block budget nearly exhausted: {}/{}", grid.block_count(), max);
            }
        }

        let ctx = FrameContext {
            params: self.params,
            intrinsics: frame.intrinsics,
            world_to_camera: camera_to_world.inverse(),
            voxel_size: grid.voxel_size(),
            frame,
        };

        let targets: Vec<&mut VoxelBlock> = grid
            .blocks_mut()
            .iter_mut()
            .zip(selected)
            .filter_map(|(block, hit)| hit.then_some(block))
            .collect();

        stats.updated_voxels = match &self.pool {
            Some(pool) => pool.install(|| {
                targets
                    .into_par_iter()
                    .map(|block| ctx.integrate_block(block))
                    .sum::<usize>()
            }),
            None => targets
                .into_iter()
                .map(|block| ctx.integrate_block(block))
                .sum::<usize>(),
        };

        log::debug!(
            "Integrated frame: {} valid pixels, {} blocks ({} new), {} voxels updated",
            stats.valid_pixels,
            stats.candidate_blocks,
            stats.allocated_blocks,
            stats.updated_voxels
        );
        Ok(stats)
    }

    /// Blocks within one truncation distance of a back-projected depth
    /// sample and inside the camera frustum, sorted by coordinate.
    /// Also returns the number of valid depth pixels.
    fn candidate_blocks(
        &self,
        grid: &VoxelBlockHashMap,
        frame: &Frame,
        camera_to_world: &Affine3A,
        frustum: &Frustum,
    ) -> (Vec<BlockCoord>, usize) {
        let trunc = self.params.truncation_distance;
        let block_size = grid.block_size();
        let depth = &frame.depth;

        let mut touched = HashSet::new();
        let mut valid_pixels = 0;

        for v in 0..depth.height {
            for u in 0..depth.width {
                let Some(z) = self.params.metric_depth(depth.get(u, v)) else {
                    continue;
                };
                valid_pixels += 1;

                let p = camera_to_world
                    .transform_point3(frame.intrinsics.unproject(u as f32, v as f32, z));
                let reach = Aabb::new(p, p).inflated(trunc);
                let lo = BlockCoord::from_world_pos(reach.min, block_size);
                let hi = BlockCoord::from_world_pos(reach.max, block_size);
                for x in lo.x..=hi.x {
                    for y in lo.y..=hi.y {
                        for z in lo.z..=hi.z {
                            touched.insert(BlockCoord::new(x, y, z));
                        }
                    }
                }
            }
        }

        let mut candidates: Vec<BlockCoord> = touched
            .into_iter()
            .filter(|c| frustum.intersects_aabb(&c.bounds(block_size)))
            .collect();
        candidates.sort_unstable();
        (candidates, valid_pixels)
    }
}

/// Read-only per-frame state shared by block workers
struct FrameContext<'a> {
    params: IntegrationParams,
    intrinsics: CameraIntrinsics,
    world_to_camera: Affine3A,
    voxel_size: f32,
    frame: &'a Frame,
}

impl FrameContext<'_> {
    /// Fuse the frame into every voxel of one block, returning how many changed
    fn integrate_block(&self, block: &mut VoxelBlock) -> usize {
        let trunc = self.params.truncation_distance;
        let n = block.resolution();
        let mut updated = 0;

        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let world = block.voxel_center(x, y, z, self.voxel_size);
                    let cam = self.world_to_camera.transform_point3(world);

                    let Some(uv) = self.intrinsics.project(cam) else {
                        continue;
                    };
                    let Some((u, v)) = self.intrinsics.nearest_pixel(uv) else {
                        continue;
                    };
                    let Some(depth) = self.params.metric_depth(self.frame.depth.get(u, v)) else {
                        continue;
                    };

                    // Positive in front of the surface, negative behind it
                    let sdf = depth - cam.z;
                    if sdf < -trunc {
                        continue;
                    }
                    if sdf > trunc && !self.params.integrate_free_space {
                        continue;
                    }

                    let tsdf = sdf.clamp(-trunc, trunc) / trunc;
                    let color = self
                        .frame
                        .color
                        .as_ref()
                        .map(|img| img.get(u, v).map(f32::from));

                    block.get_mut(x, y, z).fuse(tsdf, SAMPLE_WEIGHT, color);
                    updated += 1;
                }
            }
        }
        updated
    }
}
