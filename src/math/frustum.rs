//! Camera view frustum for block culling

use crate::core::camera::CameraIntrinsics;
use crate::core::types::{Affine3A, Vec3};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane through three points, oriented so `inside` lies in front
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3, inside: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let plane = Self::new(normal, -normal.dot(a));
        if plane.distance_to_point(inside) < 0.0 {
            Self::new(-plane.normal, -plane.distance)
        } else {
            plane
        }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Depth-camera view volume: a pyramid from the camera center out to
/// `depth_max`, bounded by the image borders (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
    /// World-space bounds of `corners`
    pub bounds: Aabb,
}

impl Frustum {
    /// Build the world-space frustum of a camera at `camera_to_world`
    pub fn from_camera(
        intrinsics: &CameraIntrinsics,
        camera_to_world: &Affine3A,
        depth_max: f32,
    ) -> Self {
        // Pixel extents, including the outer half of border pixels
        let u0 = -0.5;
        let v0 = -0.5;
        let u1 = intrinsics.width as f32 - 0.5;
        let v1 = intrinsics.height as f32 - 0.5;

        let origin = camera_to_world.transform_point3(Vec3::ZERO);
        let far = |u: f32, v: f32| {
            camera_to_world.transform_point3(intrinsics.unproject(u, v, depth_max))
        };
        let top_left = far(u0, v0);
        let top_right = far(u1, v0);
        let bottom_right = far(u1, v1);
        let bottom_left = far(u0, v1);

        let forward = camera_to_world.transform_vector3(Vec3::Z).normalize_or_zero();
        let inside = camera_to_world.transform_point3(intrinsics.unproject(
            intrinsics.cx,
            intrinsics.cy,
            depth_max * 0.5,
        ));

        let near = Plane::new(forward, -forward.dot(origin));
        let far_plane = Plane::new(-forward, forward.dot(origin) + depth_max);
        let left = Plane::from_points(origin, top_left, bottom_left, inside);
        let right = Plane::from_points(origin, bottom_right, top_right, inside);
        let top = Plane::from_points(origin, top_right, top_left, inside);
        let bottom = Plane::from_points(origin, bottom_left, bottom_right, inside);

        // Camera center plus the four far corners
        let bounds = Aabb::from_points([origin, top_left, top_right, bottom_right, bottom_left])
            .unwrap_or_default();

        Self {
            planes: [near, far_plane, left, right, top, bottom],
            bounds,
        }
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if !self.bounds.intersects(aabb) {
            return false;
        }
        for plane in &self.planes {
            // Find the corner most aligned with plane normal (p-vertex)
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            // If p-vertex is outside, AABB is completely outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum(pose: Affine3A) -> Frustum {
        let k = CameraIntrinsics::new(50.0, 50.0, 31.5, 23.5, 64, 48);
        Frustum::from_camera(&k, &pose, 3.0)
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0); // XZ plane
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_plane_from_points_orientation() {
        let plane = Plane::from_points(Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::new(0.0, -2.0, 0.0));
        assert!(plane.distance_to_point(Vec3::new(0.0, -1.0, 0.0)) > 0.0);
        assert!(plane.distance_to_point(Vec3::new(0.0, 1.0, 0.0)) < 0.0);
    }

    #[test]
    fn test_identity_camera_sees_axis() {
        let frustum = test_frustum(Affine3A::IDENTITY);
        let sees = |p: Vec3| frustum.intersects_aabb(&Aabb::new(p, p));

        assert!(sees(Vec3::new(0.0, 0.0, 1.0)));
        assert!(sees(Vec3::new(0.5, 0.3, 2.0)));
        // Behind camera and beyond depth_max
        assert!(!sees(Vec3::new(0.0, 0.0, -0.5)));
        assert!(!sees(Vec3::new(0.0, 0.0, 3.5)));
        // Far outside the horizontal field of view
        assert!(!sees(Vec3::new(5.0, 0.0, 1.0)));
    }

    #[test]
    fn test_bounds_cover_far_plane() {
        let frustum = test_frustum(Affine3A::IDENTITY);
        assert_eq!(frustum.bounds.min.z, 0.0);
        assert!((frustum.bounds.max.z - 3.0).abs() < 1e-5);
        // u = -0.5 -> x = (-0.5 - 31.5) * 3 / 50
        assert!((frustum.bounds.min.x + 1.92).abs() < 1e-4);
    }

    #[test]
    fn test_intersects_aabb() {
        let frustum = test_frustum(Affine3A::IDENTITY);
        let inside = Aabb::new(Vec3::new(-0.1, -0.1, 1.0), Vec3::new(0.1, 0.1, 1.2));
        let behind = Aabb::new(Vec3::new(-0.1, -0.1, -2.0), Vec3::new(0.1, 0.1, -1.0));
        let straddling = Aabb::new(Vec3::new(-0.1, -0.1, -0.1), Vec3::new(0.1, 0.1, 0.1));
        assert!(frustum.intersects_aabb(&inside));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(frustum.intersects_aabb(&straddling));
    }

    #[test]
    fn test_translated_camera() {
        let pose = Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let frustum = test_frustum(pose);
        let block = |x: f32| Aabb::new(Vec3::new(x, 0.0, 1.0), Vec3::new(x + 0.1, 0.1, 1.1));
        assert!(frustum.intersects_aabb(&block(10.0)));
        assert!(!frustum.intersects_aabb(&block(0.0)));
    }
}
