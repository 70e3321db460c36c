//! Voxel grid snapshots on disk

pub mod snapshot;

pub use snapshot::{
    SNAPSHOT_EXTENSION, compress_grid, decompress_grid, deserialize_grid, load_snapshot,
    save_snapshot, serialize_grid,
};
