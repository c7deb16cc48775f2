use bevy::math::{
    Mat4,
    Vec3,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    anchor::AnchorStore,
    camera::Viewpoint,
    math::round_half_up,
};


pub const DEFAULT_FRUSTUM_BOUNDS: f32 = 1.2;


/// Frustum and level-of-detail filter over the anchor store.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
)]
pub struct AnchorSelector {
    pub bounds_multiplier: f32,
}

impl Default for AnchorSelector {
    fn default() -> Self {
        Self {
            bounds_multiplier: DEFAULT_FRUSTUM_BOUNDS,
        }
    }
}

impl AnchorSelector {
    pub fn new(bounds_multiplier: f32) -> Self {
        Self { bounds_multiplier }
    }

    /// Perspective-correct clip test, `|x|, |y| <= bounds * w` and `z >= -w`.
    pub fn in_frustum(&self, clip_from_world: &Mat4, position: Vec3) -> bool {
        let clip = *clip_from_world * position.extend(1.0);
        let bounds = self.bounds_multiplier * clip.w;

        !(clip.z < -clip.w
            || clip.x < -bounds
            || clip.x > bounds
            || clip.y < -bounds
            || clip.y > bounds)
    }

    pub fn predicted_level(
        store: &AnchorStore,
        index: usize,
        camera_position: Vec3,
    ) -> f32 {
        let distance = store.position(index).distance(camera_position);
        (store.level_info().standard_distance / distance).log2() + store.extra_level(index)
    }

    /// Coarser anchors (lower level) stay accepted further away.
    pub fn accepts_level(
        store: &AnchorStore,
        index: usize,
        camera_position: Vec3,
    ) -> bool {
        let predicted = round_half_up(Self::predicted_level(store, index, camera_position));
        store.level(index) <= predicted
    }

    pub fn accepts(
        &self,
        store: &AnchorStore,
        index: usize,
        clip_from_world: &Mat4,
        camera_position: Vec3,
    ) -> bool {
        self.in_frustum(clip_from_world, store.position(index))
            && Self::accepts_level(store, index, camera_position)
    }

    /// Surviving anchor indices, ascending.
    pub fn select(&self, store: &AnchorStore, viewpoint: &Viewpoint) -> Vec<usize> {
        let clip_from_world = viewpoint.clip_from_world();

        #[cfg(feature = "parallel")]
        {
            (0..store.len())
                .into_par_iter()
                .filter(|&index| self.accepts(store, index, &clip_from_world, viewpoint.position))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            (0..store.len())
                .filter(|&index| self.accepts(store, index, &clip_from_world, viewpoint.position))
                .collect()
        }
    }
}
