//! Depth fusion binary - integrates an RGB-D sequence into a TSDF grid.
//!
//! Usage: cargo run --release --bin fuse_depth -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>      JSON config (default: config.json if present)
//!   --data <DIR>         Dataset directory (overrides config)
//!   --source <NAME>      Camera source prefix (overrides config)
//!   --output <DIR>       Output directory (overrides config)
//!   --device <DEV>       CPU:0 or CPU:PARALLEL (overrides config)
//!   --threads <N>        Worker threads for CPU:PARALLEL
//!   --threshold <W>      Extraction weight threshold (overrides config)
//!   --ascii              Write the point cloud as ASCII PLY
//!
//! Output structure:
//!   <output>/
//!     manifest.json        # Run metadata and artifact list
//!     grid.vbg             # Compressed voxel grid snapshot
//!     pointcloud.ply       # Extracted surface points
//!     trajectory.json      # Poses of integrated frames
//!
//! A run stopped by a fatal error (e.g. block budget exhausted) still writes
//! every artifact from the frames integrated so far, then exits non-zero.

use std::path::{Path, PathBuf};

use serde_json::json;

use voxfuse::config::FusionConfig;
use voxfuse::core::error::Error;
use voxfuse::core::logging;
use voxfuse::core::types::Result;
use voxfuse::extraction::{Extractor, PlyFormat, write_ply_file};
use voxfuse::integration::IntegrationEngine;
use voxfuse::sequence::{DatasetSource, SequenceDriver};
use voxfuse::storage::{self, SNAPSHOT_EXTENSION};

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = load_config(&args)?;

    if let Some(data) = parse_str_arg(&args, "--data") {
        config.data_dir = PathBuf::from(data);
    }
    if let Some(source) = parse_str_arg(&args, "--source") {
        config.camera_source = source;
    }
    if let Some(output) = parse_str_arg(&args, "--output") {
        config.output_dir = PathBuf::from(output);
    }
    if let Some(device) = parse_str_arg(&args, "--device") {
        config.volume.device = device;
    }
    if let Some(threads) = parse_usize_arg(&args, "--threads") {
        config.volume.threads = threads;
    }
    if let Some(threshold) = parse_f32_arg(&args, "--threshold") {
        config.weight_threshold = threshold;
    }
    let ply_format = if args.iter().any(|a| a == "--ascii") {
        PlyFormat::Ascii
    } else {
        PlyFormat::BinaryLittleEndian
    };

    config.validate()?;
    let device = config.device()?;

    println!("=== Voxfuse Depth Fusion ===");
    println!("Data:      {}", config.data_dir.display());
    println!("Source:    {}", config.camera_source);
    println!("Voxel:     {} m, {}^3 blocks", config.volume.voxel_size, config.volume.block_resolution);
    println!("Trunc:     {:.3} m ({} voxels)", config.truncation_distance(), config.volume.trunc_voxel_multiplier);
    println!("Depth:     scale {}, max {} m", config.volume.depth_scale, config.volume.depth_max);
    println!("Device:    {}", device);
    println!("Output:    {}", config.output_dir.display());
    println!();

    let source = DatasetSource::open(config.layout(), config.intrinsics)?;
    let mut grid = config.build_grid()?;
    let engine = IntegrationEngine::new(config.integration_params(), device)?;
    let mut driver = SequenceDriver::new(engine).with_skip_final_frame(config.skip_final_frame);

    let mut summary = driver.run(&source, &mut grid);

    println!();
    println!("Time taken (s): {:.3}", summary.elapsed.as_secs_f64());
    println!("FPS: {:.2}", summary.fps);
    for skipped in &summary.skipped {
        println!("  skipped frame {}: {}", skipped.frame, skipped.reason);
    }
    if let Some((frame, e)) = &summary.fatal {
        println!("  stopped at frame {}: {}", frame, e);
        println!("  saving the {} frames integrated so far", summary.integrated);
    }

    std::fs::create_dir_all(&config.output_dir)?;

    let snapshot_name = format!("grid.{}", SNAPSHOT_EXTENSION);
    let snapshot_path = config.output_dir.join(&snapshot_name);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(storage::save_snapshot(&snapshot_path, &grid))?;

    let policy = config.surface_policy();
    let cloud = Extractor::new(policy).extract_point_cloud(&grid, config.weight_threshold);
    let cloud_path = config.output_dir.join("pointcloud.ply");
    write_ply_file(&cloud_path, &cloud, ply_format)?;

    let trajectory_path = config.output_dir.join("trajectory.json");
    driver.trajectory().save_json(&trajectory_path)?;

    let manifest = json!({
        "source": config.camera_source,
        "data_dir": config.data_dir.display().to_string(),
        "config": config,
        "frames": {
            "integrated": summary.integrated,
            "skipped": summary.skipped.iter().map(|s| {
                json!({"frame": s.frame, "reason": s.reason})
            }).collect::<Vec<_>>(),
            "aborted": summary.aborted,
            "fatal": summary.fatal.as_ref().map(|(frame, e)| {
                json!({"frame": frame, "error": e.to_string()})
            }),
        },
        "complete": summary.is_complete(),
        "elapsed_secs": summary.elapsed.as_secs_f64(),
        "fps": summary.fps,
        "updated_voxels": summary.updated_voxels,
        "grid": {
            "voxel_size": grid.voxel_size(),
            "block_resolution": grid.resolution(),
            "block_count": grid.block_count(),
            "memory_bytes": grid.memory_bytes(),
        },
        "point_count": cloud.len(),
        "camera_path_length": driver.trajectory().path_length(),
        "artifacts": {
            "snapshot": snapshot_name,
            "point_cloud": "pointcloud.ply",
            "trajectory": "trajectory.json",
        },
    });

    let manifest_path = config.output_dir.join("manifest.json");
    let manifest_text = serde_json::to_string_pretty(&manifest)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    std::fs::write(&manifest_path, manifest_text)?;

    println!();
    if summary.fatal.is_some() {
        println!("=== Fusion Stopped Early ===");
    } else {
        println!("=== Fusion Complete ===");
    }
    println!("Frames: {} integrated, {} skipped", summary.integrated, summary.skipped.len());
    println!("Blocks: {} ({:.1} MB)", grid.block_count(), grid.memory_bytes() as f64 / (1024.0 * 1024.0));
    println!("Points: {} (weight >= {})", cloud.len(), config.weight_threshold);
    println!("Output: {}", config.output_dir.display());
    println!();
    println!("To re-extract at another threshold:");
    println!(
        "  cargo run --release --bin extract_cloud -- --snapshot {} --threshold <W>",
        snapshot_path.display()
    );

    match summary.fatal.take() {
        Some((_, e)) => Err(e),
        None => Ok(()),
    }
}

fn load_config(args: &[String]) -> Result<FusionConfig> {
    match parse_str_arg(args, "--config") {
        Some(path) => FusionConfig::load(Path::new(&path)),
        None if Path::new("config.json").exists() => FusionConfig::load(Path::new("config.json")),
        None => {
            log::info!("No config file, using defaults");
            Ok(FusionConfig::default())
        }
    }
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
