//! Re-extracts a point cloud from a saved grid snapshot, without re-integrating.
//!
//! Usage: cargo run --release --bin extract_cloud -- --snapshot <PATH> [OPTIONS]
//!
//! Options:
//!   --snapshot <PATH>    Grid snapshot written by fuse_depth (required)
//!   --threshold <W>      Minimum voxel weight (default: as fuse_depth)
//!   --band <T>           Surface band in truncation units (default: as fuse_depth)
//!   --zero-crossing      Interpolate zero crossings instead of using a band
//!   --output <PATH>      Output PLY (default: next to the snapshot)
//!   --ascii              Write ASCII PLY

use std::path::PathBuf;

use voxfuse::config::FusionConfig;
use voxfuse::core::error::Error;
use voxfuse::core::logging;
use voxfuse::core::types::Result;
use voxfuse::extraction::{Extractor, PlyFormat, SurfacePolicy, write_ply_file};
use voxfuse::storage;

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let snapshot = parse_str_arg(&args, "--snapshot")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Configuration("--snapshot <PATH> is required".into()))?;
    let defaults = FusionConfig::default();
    let threshold = parse_f32_arg(&args, "--threshold").unwrap_or(defaults.weight_threshold);
    let policy = if args.iter().any(|a| a == "--zero-crossing") {
        SurfacePolicy::ZeroCrossing
    } else if let Some(band) = parse_f32_arg(&args, "--band") {
        SurfacePolicy::Band { max_abs_tsdf: band }
    } else {
        defaults.surface_policy()
    };
    let output = parse_str_arg(&args, "--output")
        .map(PathBuf::from)
        .unwrap_or_else(|| snapshot.with_file_name(format!("pointcloud_w{}.ply", threshold)));
    let format = if args.iter().any(|a| a == "--ascii") {
        PlyFormat::Ascii
    } else {
        PlyFormat::BinaryLittleEndian
    };

    println!("=== Voxfuse Point Cloud Extraction ===");
    println!("Snapshot:  {}", snapshot.display());
    println!("Threshold: {}", threshold);
    println!("Policy:    {:?}", policy);
    println!();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let grid = rt.block_on(storage::load_snapshot(&snapshot))?;

    let cloud = Extractor::new(policy).extract_point_cloud(&grid, threshold);
    write_ply_file(&output, &cloud, format)?;

    println!("Blocks: {}", grid.block_count());
    println!("Points: {}", cloud.len());
    println!("Output: {}", output.display());
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
