//! Dataset directory layout and frame file naming
//!
//! Layout for camera source `kinect` under `data/`:
//!   data/kinect-depth-images/kinect_frame-000000.depth.npy
//!   data/kinect-rgb-images/kinect_frame-000000.rgb.jpg
//!   data/kinect-poses/kinect_frame-000000.pose.txt

use std::io;
use std::path::{Path, PathBuf};

/// Extensions accepted for depth frames, in lookup order
pub const DEPTH_EXTENSIONS: [&str; 2] = ["npy", "png"];

/// Extensions accepted for color frames, in lookup order
pub const COLOR_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// A depth frame found on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFile {
    /// Zero-based frame index parsed from the filename
    pub index: u32,
    /// Path of the depth file
    pub path: PathBuf,
}

/// Naming convention for one camera source inside a data directory
#[derive(Clone, Debug)]
pub struct DatasetLayout {
    data_dir: PathBuf,
    source: String,
}

impl DatasetLayout {
    pub fn new(data_dir: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            source: source.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn depth_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{}-depth-images", self.source))
    }

    pub fn color_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{}-rgb-images", self.source))
    }

    pub fn pose_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{}-poses", self.source))
    }

    fn stem(&self, index: u32) -> String {
        format!("{}_frame-{:06}", self.source, index)
    }

    /// Depth file path for `index` with the given extension
    pub fn depth_file(&self, index: u32, extension: &str) -> PathBuf {
        self.depth_dir().join(format!("{}.depth.{}", self.stem(index), extension))
    }

    /// Color file path for `index` with the given extension
    pub fn color_file(&self, index: u32, extension: &str) -> PathBuf {
        self.color_dir().join(format!("{}.rgb.{}", self.stem(index), extension))
    }

    pub fn pose_file(&self, index: u32) -> PathBuf {
        self.pose_dir().join(format!("{}.pose.txt", self.stem(index)))
    }

    /// First existing color file for `index`, if any
    pub fn find_color_file(&self, index: u32) -> Option<PathBuf> {
        COLOR_EXTENSIONS
            .iter()
            .map(|ext| self.color_file(index, ext))
            .find(|p| p.exists())
    }

    /// Parse the frame index out of a depth filename of this source
    pub fn parse_depth_index(&self, file_name: &str) -> Option<u32> {
        let prefix = format!("{}_frame-", self.source);
        let rest = file_name.strip_prefix(&prefix)?;
        let (digits, ext) = rest.split_once(".depth.")?;
        if !DEPTH_EXTENSIONS.contains(&ext) || digits.is_empty() {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Enumerate depth frames, sorted by index. Duplicate indices (same frame
    /// stored in two formats) keep the first extension in [`DEPTH_EXTENSIONS`].
    pub fn list_frames(&self) -> io::Result<Vec<FrameFile>> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(self.depth_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.parse_depth_index(name) {
                Some(index) => frames.push(FrameFile { index, path: entry.path() }),
                None => log::debug!("Ignoring non-frame file {}", name),
            }
        }

        frames.sort_by(|a, b| {
            a.index
                .cmp(&b.index)
                .then_with(|| extension_rank(&a.path).cmp(&extension_rank(&b.path)))
        });
        frames.dedup_by_key(|f| f.index);
        Ok(frames)
    }
}

fn extension_rank(path: &Path) -> usize {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| DEPTH_EXTENSIONS.iter().position(|d| *d == e))
        .unwrap_or(DEPTH_EXTENSIONS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = DatasetLayout::new("/data", "kinect");
        assert_eq!(
            layout.depth_file(7, "npy"),
            PathBuf::from("/data/kinect-depth-images/kinect_frame-000007.depth.npy")
        );
        assert_eq!(
            layout.color_file(7, "jpg"),
            PathBuf::from("/data/kinect-rgb-images/kinect_frame-000007.rgb.jpg")
        );
        assert_eq!(
            layout.pose_file(12),
            PathBuf::from("/data/kinect-poses/kinect_frame-000012.pose.txt")
        );
    }

    #[test]
    fn test_parse_depth_index() {
        let layout = DatasetLayout::new("/data", "crazyflie");
        assert_eq!(layout.parse_depth_index("crazyflie_frame-000042.depth.npy"), Some(42));
        assert_eq!(layout.parse_depth_index("crazyflie_frame-000042.depth.png"), Some(42));
        assert_eq!(layout.parse_depth_index("crazyflie_frame-000042.depth.jpg"), None);
        assert_eq!(layout.parse_depth_index("kinect_frame-000042.depth.npy"), None);
        assert_eq!(layout.parse_depth_index("crazyflie_frame-00a042.depth.npy"), None);
        assert_eq!(layout.parse_depth_index("crazyflie_frame-.depth.npy"), None);
    }

    #[test]
    fn test_list_frames_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        std::fs::create_dir_all(layout.depth_dir()).unwrap();

        for (index, ext) in [(10, "npy"), (2, "npy"), (2, "png"), (0, "png")] {
            std::fs::write(layout.depth_file(index, ext), b"").unwrap();
        }
        std::fs::write(layout.depth_dir().join("notes.txt"), b"").unwrap();

        let frames = layout.list_frames().unwrap();
        let indices: Vec<u32> = frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2, 10]);
        assert_eq!(frames[1].path, layout.depth_file(2, "npy"));
    }

    #[test]
    fn test_find_color_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        std::fs::create_dir_all(layout.color_dir()).unwrap();
        std::fs::write(layout.color_file(3, "png"), b"").unwrap();

        assert_eq!(layout.find_color_file(3), Some(layout.color_file(3, "png")));
        assert_eq!(layout.find_color_file(4), None);
    }
}
