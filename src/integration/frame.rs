//! One RGB-D integration input

use voxfuse_io::{ColorImage, DepthImage};

use crate::core::camera::CameraIntrinsics;
use crate::core::error::Error;
use crate::core::types::{Affine3A, Mat4, Result, Vec4};

/// Tolerance for rigid-transform checks on incoming poses
const POSE_TOLERANCE: f32 = 1e-3;

/// Depth map, optional aligned color, intrinsics and camera-to-world pose
#[derive(Clone, Debug)]
pub struct Frame {
    /// Depth in raw sensor units
    pub depth: DepthImage,
    /// Color aligned pixel-for-pixel with `depth`
    pub color: Option<ColorImage>,
    pub intrinsics: CameraIntrinsics,
    /// Rigid camera-to-world transform
    pub camera_to_world: Mat4,
}

impl Frame {
    pub fn new(depth: DepthImage, intrinsics: CameraIntrinsics, camera_to_world: Mat4) -> Self {
        Self {
            depth,
            color: None,
            intrinsics,
            camera_to_world,
        }
    }

    pub fn with_color(mut self, color: ColorImage) -> Self {
        self.color = Some(color);
        self
    }

    /// Check shapes and pose, returning the pose as an affine transform
    pub fn validate(&self) -> Result<Affine3A> {
        let k = &self.intrinsics;
        if self.depth.width != k.width || self.depth.height != k.height {
            return Err(Error::MalformedInput(format!(
                "depth is {}x{}, intrinsics expect {}x{}",
                self.depth.width, self.depth.height, k.width, k.height
            )));
        }
        if let Some(color) = &self.color {
            if color.width != self.depth.width || color.height != self.depth.height {
                return Err(Error::MalformedInput(format!(
                    "color is {}x{}, depth is {}x{}",
                    color.width, color.height, self.depth.width, self.depth.height
                )));
            }
        }
        validate_pose(&self.camera_to_world)
    }
}

/// Reject non-finite, projective or non-rigid poses
pub fn validate_pose(pose: &Mat4) -> Result<Affine3A> {
    if !pose.is_finite() {
        return Err(Error::MalformedInput("pose contains non-finite values".into()));
    }
    if !pose.row(3).abs_diff_eq(Vec4::W, POSE_TOLERANCE) {
        return Err(Error::MalformedInput(format!(
            "pose bottom row is {:?}, expected [0, 0, 0, 1]",
            pose.row(3)
        )));
    }

    let affine = Affine3A::from_mat4(*pose);
    let rotation = glam::Mat3::from(affine.matrix3);
    let should_be_identity = rotation.transpose() * rotation;
    if !should_be_identity.abs_diff_eq(glam::Mat3::IDENTITY, POSE_TOLERANCE)
        || (rotation.determinant() - 1.0).abs() > POSE_TOLERANCE
    {
        return Err(Error::MalformedInput("pose rotation is not orthonormal".into()));
    }
    Ok(affine)
}
