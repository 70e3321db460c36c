//! Frame I/O for voxfuse - decodes depth arrays, color images and camera poses
//!
//! This crate is the array/image boundary of the fusion pipeline. It knows
//! how RGB-D sequences are laid out on disk and how to turn those files into
//! plain in-memory arrays; it knows nothing about voxels.
//!
//! ```ignore
//! let layout = DatasetLayout::new("data", "kinect");
//! for frame in layout.list_frames()? {
//!     let depth = read_depth(&frame.path)?;
//!     let pose = read_pose(&layout.pose_file(frame.index))?;
//! }
//! ```

pub mod error;
pub mod raster;
pub mod naming;
pub mod npy;
pub mod pose;

pub use error::ReadError;
pub use raster::{ColorImage, DepthImage, read_color, read_depth, read_depth_png};
pub use naming::{DatasetLayout, FrameFile};
pub use npy::{parse_npy_depth, read_npy_depth};
pub use pose::{format_pose, parse_pose, read_pose};
