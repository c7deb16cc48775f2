use bevy::math::Vec3;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    camera::source_to_world,
    error::LoadError,
};

pub mod rand;


pub const DEFAULT_FEATURE_WIDTH: usize = 32;


#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
)]
pub struct LevelInfo {
    pub voxel_size: f32,
    pub standard_distance: f32,
}


/// Raw flat buffers as they are stored on disk, source frame.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
)]
pub struct AnchorBuffers {
    pub positions: Vec<f32>,
    pub scales: Vec<f32>,
    pub features: Vec<f32>,
    pub levels: Vec<f32>,
    pub extra_levels: Vec<f32>,
    pub info: Vec<f32>,
    pub base_offsets: Vec<f32>,
}


#[derive(Clone, Copy, Debug)]
pub struct Anchor<'a> {
    pub index: usize,
    pub position: Vec3,
    pub scale: Vec3,
    pub features: &'a [f32],
    pub level: f32,
    pub extra_level: f32,
}


/// Immutable per-anchor source data, world frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorStore {
    positions: Vec<Vec3>,
    scales: Vec<Vec3>,
    features: Vec<f32>,
    feature_width: usize,
    levels: Vec<f32>,
    extra_levels: Vec<f32>,
    level_info: LevelInfo,
    base_offsets: Vec<Vec3>,
    fan_out: usize,
}

impl AnchorStore {
    pub fn from_buffers(
        buffers: AnchorBuffers,
        feature_width: usize,
    ) -> Result<Self, LoadError> {
        if feature_width == 0 || buffers.features.is_empty() {
            return Err(LoadError::Empty);
        }

        if buffers.features.len() % feature_width != 0 {
            return Err(LoadError::LengthMismatch {
                name: "anchor_features",
                expected: buffers.features.len().next_multiple_of(feature_width),
                actual: buffers.features.len(),
            });
        }
        let count = buffers.features.len() / feature_width;

        expect_len("anchor_positions", &buffers.positions, count * 3)?;
        expect_len("anchor_scales", &buffers.scales, count * 3)?;
        expect_len("anchor_levels", &buffers.levels, count)?;
        expect_len("anchor_extra_levels", &buffers.extra_levels, count)?;

        if buffers.info.len() < 2 {
            return Err(LoadError::LengthMismatch {
                name: "anchor_info",
                expected: 2,
                actual: buffers.info.len(),
            });
        }

        if buffers.base_offsets.is_empty() || buffers.base_offsets.len() % (count * 3) != 0 {
            return Err(LoadError::LengthMismatch {
                name: "gsplat_positions",
                expected: buffers.base_offsets.len().max(1).next_multiple_of(count * 3),
                actual: buffers.base_offsets.len(),
            });
        }
        let fan_out = buffers.base_offsets.len() / (count * 3);

        expect_finite("anchor_positions", &buffers.positions)?;
        expect_finite("anchor_scales", &buffers.scales)?;
        expect_finite("gsplat_positions", &buffers.base_offsets)?;

        let to_world = |values: &[f32]| -> Vec<Vec3> {
            values
                .chunks_exact(3)
                .map(|xyz| source_to_world(Vec3::from_slice(xyz)))
                .collect()
        };

        Ok(Self {
            positions: to_world(&buffers.positions),
            scales: buffers.scales
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect(),
            features: buffers.features,
            feature_width,
            levels: buffers.levels,
            extra_levels: buffers.extra_levels,
            level_info: LevelInfo {
                voxel_size: buffers.info[0],
                standard_distance: buffers.info[1],
            },
            base_offsets: to_world(&buffers.base_offsets),
            fan_out,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    pub fn primitive_count(&self) -> usize {
        self.len() * self.fan_out
    }

    pub fn level_info(&self) -> LevelInfo {
        self.level_info
    }

    pub fn position(&self, index: usize) -> Vec3 {
        self.positions[index]
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn scale(&self, index: usize) -> Vec3 {
        self.scales[index]
    }

    pub fn features(&self, index: usize) -> &[f32] {
        let start = index * self.feature_width;
        &self.features[start..start + self.feature_width]
    }

    pub fn level(&self, index: usize) -> f32 {
        self.levels[index]
    }

    pub fn extra_level(&self, index: usize) -> f32 {
        self.extra_levels[index]
    }

    /// Precomputed world position of sub-primitive `sub_index` of `index`.
    pub fn base_offset(&self, index: usize, sub_index: usize) -> Vec3 {
        self.base_offsets[index * self.fan_out + sub_index]
    }

    pub fn anchor(&self, index: usize) -> Anchor<'_> {
        Anchor {
            index,
            position: self.position(index),
            scale: self.scale(index),
            features: self.features(index),
            level: self.level(index),
            extra_level: self.extra_level(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Anchor<'_>> + '_ {
        (0..self.len()).map(|index| self.anchor(index))
    }
}


fn expect_len(
    name: &'static str,
    values: &[f32],
    expected: usize,
) -> Result<(), LoadError> {
    if values.len() != expected {
        return Err(LoadError::LengthMismatch {
            name,
            expected,
            actual: values.len(),
        });
    }

    Ok(())
}

fn expect_finite(
    name: &'static str,
    values: &[f32],
) -> Result<(), LoadError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(LoadError::NonFinite { name, index }),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn two_anchor_buffers() -> AnchorBuffers {
        AnchorBuffers {
            positions: vec![0.0, 0.0, 1.0, 2.0, 0.0, -1.0],
            scales: vec![1.0, 1.0, 1.0, 0.5, 0.5, 0.5],
            features: vec![0.25; 8],
            levels: vec![0.0, 1.0],
            extra_levels: vec![0.0, 0.5],
            info: vec![0.01, 4.0],
            base_offsets: vec![
                0.0, 0.0, 1.0,
                0.1, 0.0, 1.0,
                2.0, 0.0, -1.0,
                2.1, 0.0, -1.0,
            ],
        }
    }

    #[test]
    fn ingests_into_world_frame() {
        let store = AnchorStore::from_buffers(two_anchor_buffers(), 4).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.fan_out(), 2);
        assert_eq!(store.primitive_count(), 4);
        assert_eq!(store.position(0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(store.base_offset(1, 1), Vec3::new(2.1, 0.0, 1.0));
        assert_eq!(store.scale(1), Vec3::splat(0.5));
        assert_eq!(store.level_info().standard_distance, 4.0);
        assert_eq!(store.anchor(1).extra_level, 0.5);
        assert_eq!(store.features(1).len(), 4);
    }

    #[test]
    fn rejects_inconsistent_lengths() {
        let mut buffers = two_anchor_buffers();
        buffers.levels.pop();

        assert!(matches!(
            AnchorStore::from_buffers(buffers, 4),
            Err(LoadError::LengthMismatch { name: "anchor_levels", expected: 2, actual: 1 }),
        ));

        let mut buffers = two_anchor_buffers();
        buffers.base_offsets.truncate(9);
        assert!(matches!(
            AnchorStore::from_buffers(buffers, 4),
            Err(LoadError::LengthMismatch { name: "gsplat_positions", .. }),
        ));
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(matches!(
            AnchorStore::from_buffers(AnchorBuffers::default(), 4),
            Err(LoadError::Empty),
        ));

        let mut buffers = two_anchor_buffers();
        buffers.positions[4] = f32::NAN;
        assert!(matches!(
            AnchorStore::from_buffers(buffers, 4),
            Err(LoadError::NonFinite { name: "anchor_positions", index: 4 }),
        ));
    }
}
