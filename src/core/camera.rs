//! Pinhole camera model for RGB-D frames

use serde::{Deserialize, Serialize};

use crate::core::types::{Mat3, Vec2, Vec3};

/// Pinhole intrinsics, fixed across a sequence
///
/// Camera space follows the usual vision convention: +X right, +Y down,
/// +Z forward along the optical axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along X in pixels
    pub fx: f32,
    /// Focal length along Y in pixels
    pub fy: f32,
    /// Principal point X in pixels
    pub cx: f32,
    /// Principal point Y in pixels
    pub cy: f32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Default for CameraIntrinsics {
    /// PrimeSense / Kinect v1 defaults at 640x480
    fn default() -> Self {
        Self {
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
            width: 640,
            height: 480,
        }
    }
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, width: u32, height: u32) -> Self {
        Self { fx, fy, cx, cy, width, height }
    }

    /// Intrinsics as the 3x3 matrix K
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(self.fx, 0.0, 0.0),
            Vec3::new(0.0, self.fy, 0.0),
            Vec3::new(self.cx, self.cy, 1.0),
        )
    }

    /// Project a camera-space point to continuous pixel coordinates.
    /// Returns None for points on or behind the image plane.
    #[inline]
    pub fn project(&self, p: Vec3) -> Option<Vec2> {
        if p.z <= 0.0 {
            return None;
        }
        Some(Vec2::new(
            self.fx * p.x / p.z + self.cx,
            self.fy * p.y / p.z + self.cy,
        ))
    }

    /// Nearest pixel for continuous pixel coordinates, if inside the image
    #[inline]
    pub fn nearest_pixel(&self, uv: Vec2) -> Option<(u32, u32)> {
        let u = (uv.x + 0.5).floor();
        let v = (uv.y + 0.5).floor();
        if u < 0.0 || v < 0.0 || u >= self.width as f32 || v >= self.height as f32 {
            return None;
        }
        Some((u as u32, v as u32))
    }

    /// Back-project pixel (u, v) at depth `z` into camera space
    #[inline]
    pub fn unproject(&self, u: f32, v: f32, z: f32) -> Vec3 {
        Vec3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Check all parameters are usable
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx > 0.0
            && self.fy > 0.0
            && self.width > 0
            && self.height > 0
    }
}
