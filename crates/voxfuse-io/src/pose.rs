//! Plain-text camera pose files
//!
//! A pose file holds a 4x4 camera-to-world transform, one matrix row per
//! line, values separated by whitespace or commas. Lines starting with `#`
//! are ignored.

use std::path::Path;

use glam::Mat4;

use crate::error::ReadError;

/// Read a 4x4 pose matrix from disk
pub fn read_pose(path: &Path) -> Result<Mat4, ReadError> {
    if !path.exists() {
        return Err(ReadError::Missing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    parse_pose(&text).map_err(|e| e.in_file(path))
}

/// Parse row-major pose text into a column-major `Mat4`
pub fn parse_pose(text: &str) -> Result<Mat4, ReadError> {
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    if rows.len() != 4 {
        return Err(ReadError::Malformed(format!(
            "pose must have 4 rows, found {}",
            rows.len()
        )));
    }

    let mut m = [[0.0f32; 4]; 4];
    for (r, line) in rows.iter().enumerate() {
        let values: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        if values.len() != 4 {
            return Err(ReadError::Malformed(format!(
                "pose row {} has {} values, expected 4",
                r,
                values.len()
            )));
        }
        for (c, token) in values.iter().enumerate() {
            let v: f64 = token
                .parse()
                .map_err(|_| ReadError::Malformed(format!("bad pose value {token:?}")))?;
            if !v.is_finite() {
                return Err(ReadError::Malformed(format!("non-finite pose value {token:?}")));
            }
            m[r][c] = v as f32;
        }
    }

    // Rows on disk, columns in glam
    Ok(Mat4::from_cols_array_2d(&m).transpose())
}

/// Format a pose as row-major text, the inverse of [`parse_pose`]
pub fn format_pose(pose: &Mat4) -> String {
    let rows = pose.transpose().to_cols_array_2d();
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|v| format!("{:.9e}", v))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_parse_identity() {
        let text = "1 0 0 0\n0 1 0 0\n0 0 1 0\n0 0 0 1\n";
        assert_eq!(parse_pose(text).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_parse_translation_is_last_column() {
        let text = "# camera 3\n1 0 0 0.5\n0 1 0 -1.0\n0 0 1 2.0\n0 0 0 1\n";
        let pose = parse_pose(text).unwrap();
        assert_eq!(pose.transform_point3(Vec3::ZERO), Vec3::new(0.5, -1.0, 2.0));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(matches!(parse_pose("1 0 0\n0 1 0\n0 0 1\n"), Err(ReadError::Malformed(_))));
        assert!(matches!(
            parse_pose("1 0 0 0\n0 1 0 0\n0 0 1 0\n0 0 0\n"),
            Err(ReadError::Malformed(_))
        ));
        assert!(matches!(
            parse_pose("1 0 0 0\n0 1 0 0\n0 0 x 0\n0 0 0 1\n"),
            Err(ReadError::Malformed(_))
        ));
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let pose = Mat4::from_rotation_y(0.3) * Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let parsed = parse_pose(&format_pose(&pose)).unwrap();
        assert!(parsed.abs_diff_eq(pose, 1e-6));
    }

    #[test]
    fn test_read_missing_pose() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_pose(&dir.path().join("frame-000000.pose.txt")),
            Err(ReadError::Missing(_))
        ));
    }
}
