//! Frame-by-frame fusion run loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::error::Error;
use crate::integration::IntegrationEngine;
use crate::voxel::VoxelBlockHashMap;
use super::source::FrameSource;
use super::trajectory::PoseTrajectory;

/// A frame that was not integrated, and why
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFrame {
    pub frame: u32,
    pub reason: String,
}

/// Outcome of [`SequenceDriver::run`]
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Frames fused into the grid
    pub integrated: usize,
    pub skipped: Vec<SkippedFrame>,
    pub elapsed: Duration,
    /// Integrated frames per second of wall time
    pub fps: f64,
    /// Voxel updates summed over all frames
    pub updated_voxels: usize,
    /// Stopped early through the cancel flag
    pub aborted: bool,
    /// Error that stopped the run, with the frame it happened on. The grid
    /// still holds every frame integrated before it.
    pub fatal: Option<(u32, Error)>,
}

impl RunSummary {
    /// Every frame was either integrated or skipped
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.fatal.is_none()
    }
}

/// Feeds a [`FrameSource`] to an [`IntegrationEngine`] in id order
///
/// Frame-local failures (missing or malformed inputs) are logged and the
/// frame skipped. Anything else stops the run and is reported in
/// [`RunSummary::fatal`]; frames integrated before the failure stay in the
/// grid and trajectory.
#[derive(Debug)]
pub struct SequenceDriver {
    engine: IntegrationEngine,
    skip_final_frame: bool,
    cancel: Arc<AtomicBool>,
    trajectory: PoseTrajectory,
}

impl SequenceDriver {
    pub fn new(engine: IntegrationEngine) -> Self {
        Self {
            engine,
            skip_final_frame: true,
            cancel: Arc::new(AtomicBool::new(false)),
            trajectory: PoseTrajectory::new(),
        }
    }

    /// Whether the last frame id is always left out. When false it is still
    /// left out if it has no pose.
    pub fn with_skip_final_frame(mut self, skip: bool) -> Self {
        self.skip_final_frame = skip;
        self
    }

    /// Set to true from any thread to stop after the current frame
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn engine(&self) -> &IntegrationEngine {
        &self.engine
    }

    /// Poses of every frame integrated so far
    pub fn trajectory(&self) -> &PoseTrajectory {
        &self.trajectory
    }

    pub fn into_trajectory(self) -> PoseTrajectory {
        self.trajectory
    }

    /// Integrate every frame of `source` into `grid`
    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &S,
        grid: &mut VoxelBlockHashMap,
    ) -> RunSummary {
        let ids = source.frame_ids();
        let last = ids.last().copied();
        let start = Instant::now();
        let mut summary = RunSummary::default();

        log::info!(
            "Fusing {} frames on {} (truncation {:.3} m)",
            ids.len(),
            self.engine.device(),
            self.engine.params().truncation_distance
        );

        for &id in &ids {
            if self.cancel.load(Ordering::Relaxed) {
                log::warn!("Cancelled before frame {}", id);
                summary.aborted = true;
                break;
            }

            if Some(id) == last && (self.skip_final_frame || !source.has_pose(id)) {
                log::info!("Skipping final frame {}", id);
                summary.skipped.push(SkippedFrame {
                    frame: id,
                    reason: "final frame".to_string(),
                });
                continue;
            }

            log::info!("Integrating frame {}/{}", id, last.unwrap_or(id));

            let outcome = source
                .load(id)
                .and_then(|frame| Ok((self.engine.integrate(grid, &frame)?, frame.camera_to_world)));

            match outcome {
                Ok((stats, pose)) => {
                    self.trajectory.push(id, pose);
                    summary.integrated += 1;
                    summary.updated_voxels += stats.updated_voxels;
                }
                Err(e) if e.is_frame_local() => {
                    log::warn!("Skipping frame {}: {}", id, e);
                    summary.skipped.push(SkippedFrame {
                        frame: id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    log::error!(
                        "Frame {} failed, stopping with {} frames integrated: {}",
                        id,
                        summary.integrated,
                        e
                    );
                    summary.fatal = Some((id, e));
                    break;
                }
            }
        }

        summary.elapsed = start.elapsed();
        let secs = summary.elapsed.as_secs_f64();
        summary.fps = if secs > 0.0 {
            summary.integrated as f64 / secs
        } else {
            0.0
        };

        log::info!(
            "Integrated {} frames ({} skipped) in {:.2}s, {:.1} frames/sec, {} blocks",
            summary.integrated,
            summary.skipped.len(),
            secs,
            summary.fps,
            grid.block_count()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    use voxfuse_io::{DatasetLayout, DepthImage};

    use crate::core::camera::CameraIntrinsics;
    use crate::core::types::{Mat4, Result, Vec3};
    use crate::integration::{ComputeDevice, Frame, IntegrationParams};
    use crate::sequence::source::{DatasetSource, test_data};

    /// In-memory frames; ids in `missing` fail to load
    struct MockSource {
        frames: BTreeMap<u32, Frame>,
        missing: HashSet<u32>,
        cancel_on_load: Option<(u32, Arc<AtomicBool>)>,
    }

    impl MockSource {
        fn new(ids: impl IntoIterator<Item = u32>) -> Self {
            let frames = ids
                .into_iter()
                .map(|id| {
                    let pose = Mat4::from_translation(Vec3::new(0.01 * id as f32, 0.0, 0.0));
                    (id, plane_frame(pose))
                })
                .collect();
            Self {
                frames,
                missing: HashSet::new(),
                cancel_on_load: None,
            }
        }
    }

    impl FrameSource for MockSource {
        fn frame_ids(&self) -> Vec<u32> {
            self.frames.keys().copied().collect()
        }

        fn has_pose(&self, id: u32) -> bool {
            !self.missing.contains(&id)
        }

        fn load(&self, id: u32) -> Result<Frame> {
            if let Some((at, flag)) = &self.cancel_on_load {
                if *at == id {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            if self.missing.contains(&id) {
                return Err(Error::MissingInput(format!("pose for frame {}", id)));
            }
            Ok(self.frames[&id].clone())
        }
    }

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(20.0, 20.0, 7.5, 5.5, 16, 12)
    }

    fn plane_frame(pose: Mat4) -> Frame {
        let k = intrinsics();
        Frame::new(DepthImage::filled(k.width, k.height, 1500.0), k, pose)
    }

    fn driver() -> SequenceDriver {
        let params = IntegrationParams {
            truncation_distance: 0.15,
            ..Default::default()
        };
        SequenceDriver::new(IntegrationEngine::new(params, ComputeDevice::Serial).unwrap())
    }

    fn grid() -> VoxelBlockHashMap {
        VoxelBlockHashMap::new(0.05, 8).unwrap()
    }

    #[test]
    fn test_final_frame_is_skipped() {
        let source = MockSource::new(0..4);
        let mut grid = grid();
        let mut driver = driver();
        let summary = driver.run(&source, &mut grid);

        assert_eq!(summary.integrated, 3);
        assert_eq!(summary.skipped, vec![SkippedFrame { frame: 3, reason: "final frame".into() }]);
        assert!(!summary.aborted);
        assert!(summary.updated_voxels > 0);
        assert!(grid.block_count() > 0);

        let frames: Vec<u32> = driver.trajectory().entries().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn test_final_frame_kept_when_posed() {
        let source = MockSource::new(0..3);
        let mut driver = driver().with_skip_final_frame(false);
        let summary = driver.run(&source, &mut grid());
        assert_eq!(summary.integrated, 3);
        assert!(summary.skipped.is_empty());

        // Without a pose the final frame is dropped regardless
        let mut source = MockSource::new(0..3);
        source.missing.insert(2);
        let mut driver = self::driver().with_skip_final_frame(false);
        let summary = driver.run(&source, &mut grid());
        assert_eq!(summary.integrated, 2);
        assert_eq!(summary.skipped[0].reason, "final frame");
    }

    #[test]
    fn test_bad_frames_are_isolated() {
        let mut source = MockSource::new(0..6);
        source.missing.insert(1);
        // Depth that does not match the intrinsics
        let k = intrinsics();
        source.frames.insert(
            3,
            Frame::new(DepthImage::filled(4, 4, 1500.0), k, Mat4::IDENTITY),
        );

        let mut driver = driver();
        let summary = driver.run(&source, &mut grid());

        assert_eq!(summary.integrated, 3);
        let skipped: Vec<u32> = summary.skipped.iter().map(|s| s.frame).collect();
        assert_eq!(skipped, vec![1, 3, 5]);
        assert!(summary.skipped[0].reason.contains("Missing input"));
        assert!(summary.skipped[1].reason.contains("Malformed input"));

        let frames: Vec<u32> = driver.trajectory().entries().iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![0, 2, 4]);
    }

    #[test]
    fn test_cancel_before_run() {
        let source = MockSource::new(0..3);
        let mut grid = grid();
        let mut driver = driver();
        driver.cancel_flag().store(true, Ordering::Relaxed);

        let summary = driver.run(&source, &mut grid);
        assert!(summary.aborted);
        assert_eq!(summary.integrated, 0);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_cancel_at_frame_boundary() {
        let mut driver = driver();
        let mut source = MockSource::new(0..5);
        source.cancel_on_load = Some((1, driver.cancel_flag()));

        let mut grid = grid();
        let summary = driver.run(&source, &mut grid);

        // Frame 1 completes, frame 2 never starts
        assert!(summary.aborted);
        assert_eq!(summary.integrated, 2);
        assert_eq!(driver.trajectory().len(), 2);
    }

    #[test]
    fn test_out_of_memory_stops_run() {
        let source = MockSource::new(0..3);
        let mut grid = grid().with_max_blocks(Some(2));
        let mut driver = driver();

        let summary = driver.run(&source, &mut grid);
        assert!(matches!(summary.fatal, Some((0, Error::OutOfMemory(_)))));
        assert!(!summary.is_complete());
        assert_eq!(summary.integrated, 0);
        assert_eq!(grid.block_count(), 0);
        assert!(driver.trajectory().is_empty());
    }

    #[test]
    fn test_out_of_memory_preserves_earlier_frames() {
        let source = MockSource::new(0..3);
        let mut reference = grid();
        driver().engine().integrate(&mut reference, &source.frames[&0]).unwrap();

        // Room for frame 0 only; frame 1 shifts the footprint into new blocks
        let mut grid = grid().with_max_blocks(Some(reference.block_count()));
        let mut source = source;
        source.frames.insert(
            1,
            plane_frame(Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))),
        );

        let mut driver = driver();
        let summary = driver.run(&source, &mut grid);
        assert!(matches!(summary.fatal, Some((1, Error::OutOfMemory(_)))));
        assert_eq!(summary.integrated, 1);
        assert!(summary.updated_voxels > 0);
        assert!(summary.skipped.is_empty());

        assert_eq!(grid.block_count(), reference.block_count());
        for block in reference.blocks() {
            assert_eq!(block.voxels(), grid.lookup(block.coord()).unwrap().voxels());
        }
        assert_eq!(driver.trajectory().len(), 1);
        assert_eq!(driver.trajectory().entries()[0].frame, 0);

        // The partial grid still extracts
        let cloud = grid.extract_point_cloud(crate::extraction::SurfacePolicy::default(), 1.0);
        assert!(!cloud.is_empty());
    }

    #[test]
    fn test_dataset_run() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        for i in 0..4 {
            test_data::write_depth(&layout, i, 1500);
            if i != 1 {
                test_data::write_pose(&layout, i, &Mat4::IDENTITY);
            }
        }
        test_data::write_color(&layout, 0, [50, 60, 70]);

        let source = DatasetSource::open(layout, test_data::intrinsics()).unwrap();
        let mut grid = grid();
        let mut driver = driver();
        let summary = driver.run(&source, &mut grid);

        assert_eq!(summary.integrated, 2);
        let skipped: Vec<u32> = summary.skipped.iter().map(|s| s.frame).collect();
        assert_eq!(skipped, vec![1, 3]);

        // Only frame 0 carried color; frame 2 adds weight without changing it
        let v = grid.voxel_at(Vec3::new(0.0, 0.0, 1.49)).unwrap();
        assert_eq!(v.weight, 2.0);
        assert_eq!(v.rgb(), [50, 60, 70]);
    }
}
