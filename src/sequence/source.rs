//! Where frames come from

use voxfuse_io::{DatasetLayout, FrameFile, read_color, read_depth, read_pose};

use crate::core::camera::CameraIntrinsics;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::integration::Frame;

/// An ordered, random-access set of frames
pub trait FrameSource {
    /// Frame ids in integration order (strictly increasing)
    fn frame_ids(&self) -> Vec<u32>;

    /// Whether a pose exists for `id`, without loading it
    fn has_pose(&self, id: u32) -> bool;

    /// Load depth, optional color and pose for `id`.
    ///
    /// Missing files are `MissingInput`, undecodable ones `MalformedInput`.
    fn load(&self, id: u32) -> Result<Frame>;
}

/// Frames stored on disk following a [`DatasetLayout`]
#[derive(Debug)]
pub struct DatasetSource {
    layout: DatasetLayout,
    intrinsics: CameraIntrinsics,
    frames: Vec<FrameFile>,
}

impl DatasetSource {
    /// Scan the depth directory for frames
    pub fn open(layout: DatasetLayout, intrinsics: CameraIntrinsics) -> Result<Self> {
        let depth_dir = layout.depth_dir();
        if !depth_dir.is_dir() {
            return Err(Error::MissingInput(format!(
                "depth directory {}",
                depth_dir.display()
            )));
        }

        let frames = layout.list_frames()?;
        log::info!(
            "Found {} depth frames for source '{}' in {}",
            frames.len(),
            layout.source(),
            layout.data_dir().display()
        );
        Ok(Self { layout, intrinsics, frames })
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for DatasetSource {
    fn frame_ids(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.index).collect()
    }

    fn has_pose(&self, id: u32) -> bool {
        self.layout.pose_file(id).is_file()
    }

    fn load(&self, id: u32) -> Result<Frame> {
        let file = self
            .frames
            .iter()
            .find(|f| f.index == id)
            .ok_or_else(|| Error::MissingInput(format!("frame {}", id)))?;

        let pose = read_pose(&self.layout.pose_file(id))?;
        let depth = read_depth(&file.path)?;
        let mut frame = Frame::new(depth, self.intrinsics, pose);

        match self.layout.find_color_file(id) {
            Some(path) => frame = frame.with_color(read_color(&path)?),
            None => log::debug!("Frame {} has no color image", id),
        }
        Ok(frame)
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    //! Synthetic on-disk sequences

    use std::path::Path;

    use voxfuse_io::{DatasetLayout, format_pose, npy::encode_npy};

    use crate::core::camera::CameraIntrinsics;
    use crate::core::types::Mat4;

    pub fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(20.0, 20.0, 7.5, 5.5, 16, 12)
    }

    /// Write a flat `depth_mm` depth map as `<u2` npy
    pub fn write_depth(layout: &DatasetLayout, index: u32, depth_mm: u16) {
        let k = intrinsics();
        let data: Vec<u8> = std::iter::repeat(depth_mm.to_le_bytes())
            .take((k.width * k.height) as usize)
            .flatten()
            .collect();
        let bytes = encode_npy("<u2", &[k.height as usize, k.width as usize], &data);
        write(&layout.depth_file(index, "npy"), &bytes);
    }

    pub fn write_pose(layout: &DatasetLayout, index: u32, pose: &Mat4) {
        write(&layout.pose_file(index), format_pose(pose).as_bytes());
    }

    pub fn write_color(layout: &DatasetLayout, index: u32, rgb: [u8; 3]) {
        let k = intrinsics();
        let path = layout.color_file(index, "png");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::from_pixel(k.width, k.height, image::Rgb(rgb))
            .save(&path)
            .unwrap();
    }

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_data::*;
    use super::*;
    use crate::core::types::{Mat4, Vec3};

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        assert!(matches!(
            DatasetSource::open(layout, intrinsics()),
            Err(Error::MissingInput(_))
        ));
    }

    #[test]
    fn test_load_frame() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        let pose = Mat4::from_translation(Vec3::new(0.5, 0.0, -1.0));
        for i in [2, 0, 1] {
            write_depth(&layout, i, 1500);
            write_pose(&layout, i, &pose);
        }
        write_color(&layout, 1, [9, 8, 7]);

        let source = DatasetSource::open(layout, intrinsics()).unwrap();
        assert_eq!(source.frame_ids(), vec![0, 1, 2]);
        assert!(source.has_pose(0));
        assert!(!source.has_pose(3));

        let frame = source.load(1).unwrap();
        assert_eq!(frame.depth.get(3, 4), 1500.0);
        assert_eq!(frame.color.as_ref().unwrap().get(0, 0), [9, 8, 7]);
        assert!(frame.camera_to_world.abs_diff_eq(pose, 1e-6));

        assert!(source.load(0).unwrap().color.is_none());
    }

    #[test]
    fn test_missing_and_malformed_pose() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path(), "kinect");
        write_depth(&layout, 0, 1000);
        write_depth(&layout, 1, 1000);
        std::fs::create_dir_all(layout.pose_dir()).unwrap();
        std::fs::write(layout.pose_file(1), "1 0 0\n0 1 0\n").unwrap();

        let source = DatasetSource::open(layout, intrinsics()).unwrap();
        assert!(matches!(source.load(0), Err(Error::MissingInput(_))));
        assert!(matches!(source.load(1), Err(Error::MalformedInput(_))));
        assert!(matches!(source.load(7), Err(Error::MissingInput(_))));
    }
}
