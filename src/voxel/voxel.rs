//! TSDF voxel data type

use bytemuck::{Pod, Zeroable};
use rkyv::{Archive, Deserialize, Serialize};

/// Single TSDF voxel - exactly 24 bytes
///
/// `tsdf` is normalized by the truncation distance and lives in [-1, 1].
/// It is only meaningful once `weight > 0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Archive, Deserialize, Serialize)]
pub struct TsdfVoxel {
    /// Signed distance to the nearest surface, in truncation units
    pub tsdf: f32,
    /// Accumulated confidence, never negative
    pub weight: f32,
    /// Running-mean RGB in 0-255
    pub color: [f32; 3],
    /// Weight of the color samples only; frames without color add none
    pub color_weight: f32,
}

impl TsdfVoxel {
    /// Unobserved voxel
    pub const EMPTY: TsdfVoxel = TsdfVoxel {
        tsdf: 0.0,
        weight: 0.0,
        color: [0.0; 3],
        color_weight: 0.0,
    };

    /// Check if any frame has updated this voxel
    #[inline]
    pub fn is_observed(&self) -> bool {
        self.weight > 0.0
    }

    /// Fold one observation into the running weighted mean.
    ///
    /// `color` is averaged over color samples only, so passing None leaves
    /// both the stored color and `color_weight` untouched.
    #[inline]
    pub fn fuse(&mut self, tsdf_sample: f32, sample_weight: f32, color: Option<[f32; 3]>) {
        let old_weight = self.weight;
        let new_weight = old_weight + sample_weight;
        if new_weight <= 0.0 {
            return;
        }

        self.tsdf = (self.tsdf * old_weight + tsdf_sample * sample_weight) / new_weight;
        if let Some(rgb) = color {
            let old_color_weight = self.color_weight;
            let new_color_weight = old_color_weight + sample_weight;
            for (stored, sample) in self.color.iter_mut().zip(rgb) {
                *stored = (*stored * old_color_weight + sample * sample_weight) / new_color_weight;
            }
            self.color_weight = new_color_weight;
        }
        self.weight = new_weight;
    }

    /// Stored color quantized to RGB888
    pub fn rgb(&self) -> [u8; 3] {
        self.color.map(|c| c.round().clamp(0.0, 255.0) as u8)
    }
}
