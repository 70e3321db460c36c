//! VoxelBlockHashMap - sparse block storage indexed by block coordinate

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec3};
use super::block::{BlockCoord, VoxelBlock};
use super::voxel::TsdfVoxel;

/// Index of a block inside the map's arena
pub type BlockId = usize;

/// Sparse voxel grid: an arena of blocks plus a coordinate index.
///
/// Blocks are allocated on first touch and never removed; the map owns every
/// block it allocates.
#[derive(Clone, Debug)]
pub struct VoxelBlockHashMap {
    /// Edge length of one voxel in meters
    voxel_size: f32,
    /// Voxels per block side
    resolution: u32,
    /// Maximum number of blocks (None = bounded only by memory)
    max_blocks: Option<usize>,
    /// Block storage, in allocation order
    blocks: Vec<VoxelBlock>,
    /// Block coordinate -> arena index
    index: HashMap<BlockCoord, BlockId>,
}

impl VoxelBlockHashMap {
    /// Create an empty map. `resolution` must be a power of two in 2..=64.
    pub fn new(voxel_size: f32, resolution: u32) -> Result<Self> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(Error::Configuration(format!(
                "voxel_size must be positive, got {}",
                voxel_size
            )));
        }
        if !(2..=64).contains(&resolution) || !resolution.is_power_of_two() {
            return Err(Error::Configuration(format!(
                "block resolution must be a power of two in 2..=64, got {}",
                resolution
            )));
        }

        Ok(Self {
            voxel_size,
            resolution,
            max_blocks: None,
            blocks: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Limit the number of blocks; allocating beyond it fails with `OutOfMemory`
    pub fn with_max_blocks(mut self, max_blocks: Option<usize>) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn max_blocks(&self) -> Option<usize> {
        self.max_blocks
    }

    /// Edge length of one block in meters
    pub fn block_size(&self) -> f32 {
        self.voxel_size * self.resolution as f32
    }

    /// Number of allocated blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Approximate heap footprint of the voxel storage in bytes
    pub fn memory_bytes(&self) -> usize {
        self.blocks.len() * (self.resolution as usize).pow(3) * std::mem::size_of::<TsdfVoxel>()
    }

    /// Block containing a world position
    pub fn block_coord_of(&self, pos: Vec3) -> BlockCoord {
        BlockCoord::from_world_pos(pos, self.block_size())
    }

    /// Arena index of the block at `coord`, allocating a zeroed block if absent
    pub fn allocate(&mut self, coord: BlockCoord) -> Result<BlockId> {
        if let Some(&id) = self.index.get(&coord) {
            return Ok(id);
        }

        if let Some(max) = self.max_blocks {
            if self.blocks.len() >= max {
                return Err(Error::OutOfMemory(format!(
                    "block capacity of {} exhausted allocating {:?}",
                    max, coord
                )));
            }
        }

        self.blocks.try_reserve(1).map_err(|e| {
            Error::OutOfMemory(format!("block arena: {}", e))
        })?;
        self.index.try_reserve(1).map_err(|e| {
            Error::OutOfMemory(format!("block index: {}", e))
        })?;

        let block = VoxelBlock::new(coord, self.resolution)?;
        let id = self.blocks.len();
        self.blocks.push(block);
        self.index.insert(coord, id);
        Ok(id)
    }

    /// Existing block at `coord`, or a newly allocated zeroed one
    pub fn get_or_allocate(&mut self, coord: BlockCoord) -> Result<&mut VoxelBlock> {
        let id = self.allocate(coord)?;
        Ok(&mut self.blocks[id])
    }

    /// Non-allocating lookup
    pub fn lookup(&self, coord: BlockCoord) -> Option<&VoxelBlock> {
        self.index.get(&coord).map(|&id| &self.blocks[id])
    }

    /// Non-allocating mutable lookup
    pub fn lookup_mut(&mut self, coord: BlockCoord) -> Option<&mut VoxelBlock> {
        match self.index.get(&coord) {
            Some(&id) => Some(&mut self.blocks[id]),
            None => None,
        }
    }

    pub fn contains(&self, coord: BlockCoord) -> bool {
        self.index.contains_key(&coord)
    }

    /// Arena index of an allocated block
    pub fn block_id(&self, coord: BlockCoord) -> Option<BlockId> {
        self.index.get(&coord).copied()
    }

    /// Visit every allocated block. Order is unspecified.
    pub fn for_each_allocated_block(&self, mut visitor: impl FnMut(&VoxelBlock)) {
        for block in &self.blocks {
            visitor(block);
        }
    }

    /// Iterate allocated blocks
    pub fn blocks(&self) -> impl Iterator<Item = &VoxelBlock> {
        self.blocks.iter()
    }

    /// Mutable access to the arena, for per-block parallel updates
    pub(crate) fn blocks_mut(&mut self) -> &mut [VoxelBlock] {
        &mut self.blocks
    }

    /// Iterate allocated block coordinates
    pub fn allocated_coords(&self) -> impl Iterator<Item = &BlockCoord> {
        self.index.keys()
    }

    /// Insert a fully built block (used when restoring snapshots)
    pub fn insert_block(&mut self, block: VoxelBlock) -> Result<BlockId> {
        if block.resolution() != self.resolution {
            return Err(Error::MalformedInput(format!(
                "block {:?} has resolution {}, map uses {}",
                block.coord(),
                block.resolution(),
                self.resolution
            )));
        }
        if self.index.contains_key(&block.coord()) {
            return Err(Error::MalformedInput(format!(
                "duplicate block {:?}",
                block.coord()
            )));
        }

        let id = self.blocks.len();
        self.index.insert(block.coord(), id);
        self.blocks.push(block);
        Ok(id)
    }

    /// Voxel at a global voxel-grid index, if its block is allocated
    pub fn voxel(&self, global: IVec3) -> Option<&TsdfVoxel> {
        let n = self.resolution as i32;
        let coord = BlockCoord::new(
            global.x.div_euclid(n),
            global.y.div_euclid(n),
            global.z.div_euclid(n),
        );
        let block = self.lookup(coord)?;
        Some(block.get(
            global.x.rem_euclid(n) as u32,
            global.y.rem_euclid(n) as u32,
            global.z.rem_euclid(n) as u32,
        ))
    }

    /// Global voxel-grid index containing a world position
    pub fn voxel_index_of(&self, pos: Vec3) -> IVec3 {
        (pos / self.voxel_size).floor().as_ivec3()
    }

    /// Voxel containing a world position, if its block is allocated
    pub fn voxel_at(&self, pos: Vec3) -> Option<&TsdfVoxel> {
        self.voxel(self.voxel_index_of(pos))
    }
}
