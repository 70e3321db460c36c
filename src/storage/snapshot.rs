//! Voxel grid serialization and async disk I/O
//!
//! A snapshot holds everything needed to rebuild a [`VoxelBlockHashMap`]:
//! grid geometry plus the coordinate and voxels of every allocated block.
//! Bytes are rkyv-archived then LZ4 compressed with a size prefix.

use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::{BlockCoord, TsdfVoxel, VoxelBlock, VoxelBlockHashMap};

/// File extension for compressed snapshots
pub const SNAPSHOT_EXTENSION: &str = "vbg";

/// Serializable block
#[derive(Archive, Deserialize, Serialize)]
pub struct BlockData {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Voxels in block order (x fastest), already Pod-compatible
    pub voxels: Vec<TsdfVoxel>,
}

/// Serializable grid
#[derive(Archive, Deserialize, Serialize)]
pub struct SnapshotData {
    pub voxel_size: f32,
    pub block_resolution: u32,
    pub blocks: Vec<BlockData>,
}

/// Serialize a grid to bytes (uncompressed)
pub fn serialize_grid(grid: &VoxelBlockHashMap) -> Result<Vec<u8>> {
    let mut blocks = Vec::with_capacity(grid.block_count());
    grid.for_each_allocated_block(|block| {
        let coord = block.coord();
        blocks.push(BlockData {
            x: coord.x,
            y: coord.y,
            z: coord.z,
            voxels: block.voxels().to_vec(),
        });
    });

    let data = SnapshotData {
        voxel_size: grid.voxel_size(),
        block_resolution: grid.resolution(),
        blocks,
    };

    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&data)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Rebuild a grid from bytes produced by [`serialize_grid`]
pub fn deserialize_grid(data: &[u8]) -> Result<VoxelBlockHashMap> {
    // Archived data must be aligned; decompressed buffers are not
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(data.len());
    aligned.extend_from_slice(data);

    let archived = rkyv::access::<ArchivedSnapshotData, rkyv::rancor::Error>(&aligned)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    let snapshot: SnapshotData = rkyv::deserialize::<SnapshotData, rkyv::rancor::Error>(archived)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    let mut grid = VoxelBlockHashMap::new(snapshot.voxel_size, snapshot.block_resolution)
        .map_err(|e| Error::Serialization(format!("snapshot header: {}", e)))?;
    for block in snapshot.blocks {
        let coord = BlockCoord::new(block.x, block.y, block.z);
        grid.insert_block(VoxelBlock::from_voxels(coord, snapshot.block_resolution, block.voxels)?)?;
    }
    Ok(grid)
}

/// Serialize and compress a grid using LZ4
pub fn compress_grid(grid: &VoxelBlockHashMap) -> Result<Vec<u8>> {
    let serialized = serialize_grid(grid)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize a grid
pub fn decompress_grid(data: &[u8]) -> Result<VoxelBlockHashMap> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| Error::Serialization(format!("LZ4 decompression failed: {}", e)))?;
    deserialize_grid(&decompressed)
}

/// Save a compressed snapshot, creating parent directories as needed
pub async fn save_snapshot(path: &Path, grid: &VoxelBlockHashMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let compressed = compress_grid(grid)?;
    tokio::fs::write(path, &compressed).await?;

    log::info!(
        "Saved {} blocks to {} ({:.1} MB)",
        grid.block_count(),
        path.display(),
        compressed.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

/// Load a compressed snapshot
pub async fn load_snapshot(path: &Path) -> Result<VoxelBlockHashMap> {
    if !path.exists() {
        return Err(Error::MissingInput(format!("snapshot {}", path.display())));
    }

    let compressed = tokio::fs::read(path).await?;
    let grid = decompress_grid(&compressed)?;
    log::info!("Loaded {} blocks from {}", grid.block_count(), path.display());
    Ok(grid)
}
