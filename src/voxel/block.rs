//! Voxel blocks: the unit of sparse allocation

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec3};
use crate::math::Aabb;
use super::voxel::TsdfVoxel;

/// Integer coordinate identifying a block in the block grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    /// Create a new block coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert world position to the coordinate of the containing block
    pub fn from_world_pos(pos: Vec3, block_size: f32) -> Self {
        Self {
            x: (pos.x / block_size).floor() as i32,
            y: (pos.y / block_size).floor() as i32,
            z: (pos.z / block_size).floor() as i32,
        }
    }

    /// World-space origin (minimum corner) of this block
    pub fn world_origin(&self, block_size: f32) -> Vec3 {
        Vec3::new(
            self.x as f32 * block_size,
            self.y as f32 * block_size,
            self.z as f32 * block_size,
        )
    }

    /// World-space bounding box of this block
    pub fn bounds(&self, block_size: f32) -> Aabb {
        let origin = self.world_origin(block_size);
        Aabb::new(origin, origin + Vec3::splat(block_size))
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for BlockCoord {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Cubic tile of `resolution`^3 voxels stored contiguously (x fastest)
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelBlock {
    coord: BlockCoord,
    resolution: u32,
    voxels: Vec<TsdfVoxel>,
}

impl VoxelBlock {
    /// Allocate a zero-initialized block. Fails with `OutOfMemory` if the
    /// voxel storage cannot be reserved.
    pub fn new(coord: BlockCoord, resolution: u32) -> Result<Self> {
        let count = (resolution as usize).pow(3);
        let mut voxels = Vec::new();
        voxels.try_reserve_exact(count).map_err(|e| {
            Error::OutOfMemory(format!("voxel block {:?}: {}", coord, e))
        })?;
        voxels.resize(count, TsdfVoxel::EMPTY);
        Ok(Self { coord, resolution, voxels })
    }

    /// Rebuild a block from stored voxels
    pub fn from_voxels(coord: BlockCoord, resolution: u32, voxels: Vec<TsdfVoxel>) -> Result<Self> {
        let expected = (resolution as usize).pow(3);
        if voxels.len() != expected {
            return Err(Error::MalformedInput(format!(
                "block {:?} holds {} voxels, expected {}",
                coord,
                voxels.len(),
                expected
            )));
        }
        Ok(Self { coord, resolution, voxels })
    }

    pub fn coord(&self) -> BlockCoord {
        self.coord
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Linear index of local voxel (x, y, z)
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        debug_assert!(x < self.resolution && y < self.resolution && z < self.resolution);
        let n = self.resolution as usize;
        (z as usize * n + y as usize) * n + x as usize
    }

    /// Local (x, y, z) of a linear index
    #[inline]
    pub fn local_coords(&self, index: usize) -> (u32, u32, u32) {
        let n = self.resolution as usize;
        ((index % n) as u32, ((index / n) % n) as u32, (index / (n * n)) as u32)
    }

    /// Get voxel at local coordinates
    pub fn get(&self, x: u32, y: u32, z: u32) -> &TsdfVoxel {
        &self.voxels[self.index(x, y, z)]
    }

    /// Get mutable voxel at local coordinates
    pub fn get_mut(&mut self, x: u32, y: u32, z: u32) -> &mut TsdfVoxel {
        let i = self.index(x, y, z);
        &mut self.voxels[i]
    }

    pub fn voxels(&self) -> &[TsdfVoxel] {
        &self.voxels
    }

    pub fn voxels_mut(&mut self) -> &mut [TsdfVoxel] {
        &mut self.voxels
    }

    /// Global voxel-grid index of local voxel (x, y, z)
    pub fn global_index(&self, x: u32, y: u32, z: u32) -> IVec3 {
        self.coord.as_ivec3() * self.resolution as i32 + IVec3::new(x as i32, y as i32, z as i32)
    }

    /// World-space center of local voxel (x, y, z)
    #[inline]
    pub fn voxel_center(&self, x: u32, y: u32, z: u32, voxel_size: f32) -> Vec3 {
        (self.global_index(x, y, z).as_vec3() + Vec3::splat(0.5)) * voxel_size
    }

    /// Number of voxels with positive weight
    pub fn observed_count(&self) -> usize {
        self.voxels.iter().filter(|v| v.is_observed()).count()
    }
}
