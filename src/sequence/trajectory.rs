//! Camera poses of integrated frames, kept for visualization

use std::path::Path;

use serde_json::{Value, json};

use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec3};

/// Pose of one integrated frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryEntry {
    pub frame: u32,
    /// Camera-to-world transform
    pub pose: Mat4,
}

impl TrajectoryEntry {
    /// Camera center in world space
    pub fn position(&self) -> Vec3 {
        self.pose.w_axis.truncate()
    }
}

/// Ordered list of integrated frame poses
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseTrajectory {
    entries: Vec<TrajectoryEntry>,
}

impl PoseTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: u32, pose: Mat4) {
        self.entries.push(TrajectoryEntry { frame, pose });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn poses(&self) -> impl Iterator<Item = &Mat4> {
        self.entries.iter().map(|e| &e.pose)
    }

    /// Total distance travelled by the camera center
    pub fn path_length(&self) -> f32 {
        self.entries
            .windows(2)
            .map(|w| w[0].position().distance(w[1].position()))
            .sum()
    }

    /// `[{"frame": n, "pose": [[row0], [row1], [row2], [row3]]}, ...]`
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|e| {
                    json!({
                        "frame": e.frame,
                        "pose": e.pose.transpose().to_cols_array_2d(),
                    })
                })
                .collect(),
        )
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_row_major() {
        let mut trajectory = PoseTrajectory::new();
        trajectory.push(4, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        let value = trajectory.to_json();
        assert_eq!(value[0]["frame"], 4);
        assert_eq!(value[0]["pose"][0], json!([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(value[0]["pose"][2], json!([0.0, 0.0, 1.0, 3.0]));
        assert_eq!(value[0]["pose"][3], json!([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_path_length() {
        let mut trajectory = PoseTrajectory::new();
        assert_eq!(trajectory.path_length(), 0.0);
        trajectory.push(0, Mat4::IDENTITY);
        trajectory.push(1, Mat4::from_translation(Vec3::new(3.0, 4.0, 0.0)));
        trajectory.push(2, Mat4::from_translation(Vec3::new(3.0, 4.0, 1.0)));
        assert!((trajectory.path_length() - 6.0).abs() < 1e-6);
        assert_eq!(trajectory.entries()[1].position(), Vec3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.json");
        let mut trajectory = PoseTrajectory::new();
        trajectory.push(0, Mat4::IDENTITY);
        trajectory.save_json(&path).unwrap();

        let loaded: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, trajectory.to_json());
    }
}
