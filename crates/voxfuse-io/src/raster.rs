//! In-memory depth and color rasters

use std::path::Path;

use crate::error::ReadError;
use crate::npy::read_npy_depth;

/// Single-channel depth raster in raw sensor units (row-major)
///
/// Values are stored exactly as read from disk; zero or NaN marks an
/// invalid sample. Scaling to meters is the consumer's job.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DepthImage {
    /// Wrap a row-major buffer. Fails if the buffer size does not match.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, ReadError> {
        if data.len() != width as usize * height as usize {
            return Err(ReadError::Malformed(format!(
                "depth buffer holds {} samples, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Depth image with every pixel set to `value`
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Raw sample at pixel (x, y)
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set raw sample at pixel (x, y)
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.data[y as usize * self.width as usize + x as usize] = value;
    }
}

/// 8-bit RGB raster (row-major)
#[derive(Clone, Debug, PartialEq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<[u8; 3]>,
}

impl ColorImage {
    /// Color image with every pixel set to `rgb`
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            width,
            height,
            data: vec![rgb; width as usize * height as usize],
        }
    }

    /// Color at pixel (x, y)
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Read a depth map, dispatching on extension (`.npy` or 16-bit `.png`)
pub fn read_depth(path: &Path) -> Result<DepthImage, ReadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => read_npy_depth(path),
        Some("png") => read_depth_png(path),
        other => Err(ReadError::Malformed(format!(
            "{}: unsupported depth format {:?}",
            path.display(),
            other
        ))),
    }
}

/// Read a 16-bit grayscale PNG depth map
pub fn read_depth_png(path: &Path) -> Result<DepthImage, ReadError> {
    if !path.exists() {
        return Err(ReadError::Missing(path.to_path_buf()));
    }

    let luma = ::image::open(path)?.into_luma16();
    let (width, height) = luma.dimensions();
    let data = luma.into_raw().into_iter().map(f32::from).collect();

    DepthImage::new(width, height, data).map_err(|e| e.in_file(path))
}

/// Read a color image (any format the `image` crate decodes) as RGB8
pub fn read_color(path: &Path) -> Result<ColorImage, ReadError> {
    if !path.exists() {
        return Err(ReadError::Missing(path.to_path_buf()));
    }

    let rgb = ::image::open(path)?.into_rgb8();
    let (width, height) = rgb.dimensions();
    let data = rgb.pixels().map(|p| p.0).collect();

    Ok(ColorImage { width, height, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_new_rejects_wrong_size() {
        assert!(DepthImage::new(4, 4, vec![0.0; 15]).is_err());
        assert!(DepthImage::new(4, 4, vec![0.0; 16]).is_ok());
    }

    #[test]
    fn test_depth_get_set() {
        let mut depth = DepthImage::filled(3, 2, 0.0);
        depth.set(2, 1, 1500.0);
        assert_eq!(depth.get(2, 1), 1500.0);
        assert_eq!(depth.data[5], 1500.0);
    }

    #[test]
    fn test_read_depth_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.depth.png");

        let mut img = ::image::ImageBuffer::<::image::Luma<u16>, Vec<u16>>::new(4, 3);
        img.put_pixel(1, 2, ::image::Luma([2000]));
        img.save(&path).unwrap();

        let depth = read_depth(&path).unwrap();
        assert_eq!((depth.width, depth.height), (4, 3));
        assert_eq!(depth.get(1, 2), 2000.0);
        assert_eq!(depth.get(0, 0), 0.0);
    }

    #[test]
    fn test_read_color_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.rgb.png");

        let img = ::image::RgbImage::from_pixel(2, 2, ::image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let color = read_color(&path).unwrap();
        assert_eq!(color.width, 2);
        assert_eq!(color.get(1, 1), [10, 20, 30]);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_color(&dir.path().join("nope.jpg")),
            Err(ReadError::Missing(_))
        ));
        assert!(matches!(
            read_depth(&dir.path().join("nope.depth.npy")),
            Err(ReadError::Missing(_))
        ));
    }

    #[test]
    fn test_unsupported_depth_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.depth.jpg");
        assert!(matches!(read_depth(&path), Err(ReadError::Malformed(_))));
    }
}
