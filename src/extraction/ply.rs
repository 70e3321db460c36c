//! PLY point cloud writer

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::point_cloud::PointCloud;

/// PLY body encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlyFormat {
    #[default]
    BinaryLittleEndian,
    Ascii,
}

impl PlyFormat {
    fn header_name(self) -> &'static str {
        match self {
            PlyFormat::BinaryLittleEndian => "binary_little_endian",
            PlyFormat::Ascii => "ascii",
        }
    }
}

/// Write a cloud as PLY with float `x y z` and uchar `red green blue`
pub fn write_ply<W: Write>(writer: &mut W, cloud: &PointCloud, format: PlyFormat) -> io::Result<()> {
    if cloud.positions.len() != cloud.colors.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} positions but {} colors",
                cloud.positions.len(),
                cloud.colors.len()
            ),
        ));
    }

    writeln!(writer, "ply")?;
    writeln!(writer, "format {} 1.0", format.header_name())?;
    writeln!(writer, "comment voxfuse TSDF extraction")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property float {}", axis)?;
    }
    for channel in ["red", "green", "blue"] {
        writeln!(writer, "property uchar {}", channel)?;
    }
    writeln!(writer, "end_header")?;

    for (p, c) in cloud.positions.iter().zip(&cloud.colors) {
        match format {
            PlyFormat::BinaryLittleEndian => {
                for v in p.to_array() {
                    writer.write_all(&v.to_le_bytes())?;
                }
                writer.write_all(c)?;
            }
            PlyFormat::Ascii => {
                writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, c[0], c[1], c[2])?;
            }
        }
    }
    Ok(())
}

/// Write a cloud to a `.ply` file
pub fn write_ply_file(path: &Path, cloud: &PointCloud, format: PlyFormat) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_ply(&mut writer, cloud, format)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;

    fn cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        cloud.push(Vec3::new(1.0, 2.0, 3.0), [255, 0, 10]);
        cloud.push(Vec3::new(-0.5, 0.25, 2.0), [1, 2, 3]);
        cloud
    }

    fn split_header(bytes: &[u8]) -> (String, &[u8]) {
        let marker = b"end_header\n";
        let end = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .expect("no end_header")
            + marker.len();
        (String::from_utf8(bytes[..end].to_vec()).unwrap(), &bytes[end..])
    }

    #[test]
    fn test_binary_layout() {
        let mut bytes = Vec::new();
        write_ply(&mut bytes, &cloud(), PlyFormat::BinaryLittleEndian).unwrap();

        let (header, body) = split_header(&bytes);
        assert!(header.starts_with("ply\nformat binary_little_endian 1.0\n"));
        assert!(header.contains("element vertex 2\n"));
        assert!(header.contains("property uchar blue\n"));

        // 3 floats + 3 bytes per vertex
        assert_eq!(body.len(), 2 * 15);
        assert_eq!(&body[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&body[8..12], &3.0f32.to_le_bytes());
        assert_eq!(&body[12..15], &[255, 0, 10]);
        assert_eq!(&body[15..19], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_ascii() {
        let mut bytes = Vec::new();
        write_ply(&mut bytes, &cloud(), PlyFormat::Ascii).unwrap();

        let (header, body) = split_header(&bytes);
        assert!(header.contains("format ascii 1.0"));
        let body = std::str::from_utf8(body).unwrap();
        assert_eq!(body.lines().collect::<Vec<_>>(), vec!["1 2 3 255 0 10", "-0.5 0.25 2 1 2 3"]);
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");
        write_ply_file(&path, &PointCloud::new(), PlyFormat::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let (header, body) = split_header(&bytes);
        assert!(header.contains("element vertex 0"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_mismatched_cloud_is_rejected() {
        let mut bad = cloud();
        bad.colors.pop();
        assert!(write_ply(&mut Vec::new(), &bad, PlyFormat::Ascii).is_err());
    }
}
