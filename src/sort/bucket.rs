use bevy::math::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    gaussian::packed::{
        PackedPrimitive,
        PrimitiveBuffer,
    },
    sort::BlendOrder,
};


pub const SORT_BUCKETS: usize = 256 * 256;


#[inline]
pub fn blend_key(order: BlendOrder, forward: Vec3, translation: Vec3) -> f32 {
    let depth = forward.dot(translation);
    match order {
        BlendOrder::BackToFront => -depth,
        BlendOrder::FrontToBack => depth,
    }
}


/// Single-pass stable counting sort over quantized view depth.
///
/// Keys are `dot(forward, translation)`, negated for back-to-front output so
/// ascending buckets always match the requested blend order. Scratch storage
/// is kept between calls.
#[derive(Clone, Debug)]
pub struct DepthSorter {
    order: BlendOrder,
    keys: Vec<f32>,
    buckets: Vec<u32>,
    offsets: Vec<u32>,
}

impl Default for DepthSorter {
    fn default() -> Self {
        Self::new(BlendOrder::default())
    }
}

impl DepthSorter {
    pub fn new(order: BlendOrder) -> Self {
        Self {
            order,
            keys: Vec::new(),
            buckets: Vec::new(),
            offsets: vec![0; SORT_BUCKETS],
        }
    }

    pub fn order(&self) -> BlendOrder {
        self.order
    }

    fn compute_keys(&mut self, primitives: &[PackedPrimitive], forward: Vec3) {
        let order = self.order;
        let key = |primitive: &PackedPrimitive| blend_key(order, forward, primitive.translation());

        self.keys.clear();

        #[cfg(feature = "parallel")]
        primitives
            .par_iter()
            .map(key)
            .collect_into_vec(&mut self.keys);

        #[cfg(not(feature = "parallel"))]
        self.keys.extend(primitives.iter().map(key));
    }

    /// Permutation of `0..primitives.len()` in blend order.
    pub fn sort_indices(
        &mut self,
        primitives: &[PackedPrimitive],
        forward: Vec3,
    ) -> Vec<u32> {
        if primitives.is_empty() {
            return Vec::new();
        }

        self.compute_keys(primitives, forward);

        let (min, max) = self.keys
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &key| {
                (min.min(key), max.max(key))
            });

        let range = max - min;
        let scale = if range > 0.0 && range.is_finite() {
            (SORT_BUCKETS - 1) as f32 / range
        } else {
            0.0
        };

        let last_bucket = (SORT_BUCKETS - 1) as u32;
        self.buckets.clear();
        self.buckets.extend(self.keys.iter().map(|&key| {
            // saturating cast, NaN lands in bucket 0
            (((key - min) * scale) as u32).min(last_bucket)
        }));

        self.offsets.fill(0);
        for &bucket in &self.buckets {
            self.offsets[bucket as usize] += 1;
        }

        let mut running = 0u32;
        for offset in self.offsets.iter_mut() {
            let count = *offset;
            *offset = running;
            running += count;
        }

        let mut sorted = vec![0u32; primitives.len()];
        for (index, &bucket) in self.buckets.iter().enumerate() {
            let slot = &mut self.offsets[bucket as usize];
            sorted[*slot as usize] = index as u32;
            *slot += 1;
        }

        sorted
    }

    pub fn sort(
        &mut self,
        primitives: &[PackedPrimitive],
        forward: Vec3,
    ) -> PrimitiveBuffer {
        self.sort_indices(primitives, forward)
            .into_iter()
            .map(|index| primitives[index as usize])
            .collect()
    }
}
