//! Ordered frame sequences and the fusion run loop

pub mod source;
pub mod trajectory;
pub mod driver;

pub use source::{DatasetSource, FrameSource};
pub use trajectory::{PoseTrajectory, TrajectoryEntry};
pub use driver::{RunSummary, SequenceDriver, SkippedFrame};
