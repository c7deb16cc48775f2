use std::ops::Deref;

use bevy::math::{
    Mat3,
    Vec3,
};
use bytemuck::{
    Pod,
    Zeroable,
};
use static_assertions::const_assert_eq;


/// Transport layout consumed by the rendering surface, column-major 4x4:
/// the upper 3x3 block holds the covariance basis, column 3 the
/// translation, row 3 the color and cell (3, 3) the opacity.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Pod,
    Zeroable,
)]
#[repr(C)]
pub struct PackedPrimitive {
    pub matrix: [f32; 16],
}

const_assert_eq!(std::mem::size_of::<PackedPrimitive>(), 64);

impl PackedPrimitive {
    pub fn new(
        covariance: Mat3,
        translation: Vec3,
        color: Vec3,
        opacity: f32,
    ) -> Self {
        let x = covariance.x_axis;
        let y = covariance.y_axis;
        let z = covariance.z_axis;

        Self {
            matrix: [
                x.x, x.y, x.z, color.x,
                y.x, y.y, y.z, color.y,
                z.x, z.y, z.z, color.z,
                translation.x, translation.y, translation.z, opacity,
            ],
        }
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.matrix[12], self.matrix[13], self.matrix[14])
    }

    pub fn color(&self) -> Vec3 {
        Vec3::new(self.matrix[3], self.matrix[7], self.matrix[11])
    }

    pub fn opacity(&self) -> f32 {
        self.matrix[15]
    }

    pub fn covariance(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::from_slice(&self.matrix[0..3]),
            Vec3::from_slice(&self.matrix[4..7]),
            Vec3::from_slice(&self.matrix[8..11]),
        )
    }
}


/// Ordered primitive transforms; the unit handed between pipeline stages
/// and published to the renderer.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
)]
pub struct PrimitiveBuffer {
    primitives: Vec<PackedPrimitive>,
}

impl PrimitiveBuffer {
    pub fn new(primitives: Vec<PackedPrimitive>) -> Self {
        Self { primitives }
    }

    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(self.primitives.as_slice())
    }

    pub fn into_inner(self) -> Vec<PackedPrimitive> {
        self.primitives
    }
}

impl Deref for PrimitiveBuffer {
    type Target = [PackedPrimitive];

    fn deref(&self) -> &Self::Target {
        &self.primitives
    }
}

impl From<Vec<PackedPrimitive>> for PrimitiveBuffer {
    fn from(primitives: Vec<PackedPrimitive>) -> Self {
        Self::new(primitives)
    }
}

impl FromIterator<PackedPrimitive> for PrimitiveBuffer {
    fn from_iter<I: IntoIterator<Item = PackedPrimitive>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}


#[cfg(test)]
mod tests {
    use bevy::math::Quat;

    use crate::gaussian::Primitive;

    use super::*;

    #[test]
    fn packs_at_the_transport_slots() {
        let primitive = Primitive {
            position: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(0.5, 0.25, 2.0),
            rotation: Quat::from_rotation_y(0.4),
            color: Vec3::new(0.1, 0.2, 0.3),
            opacity: 0.75,
        };

        let packed = primitive.pack();

        assert_eq!(packed.translation(), primitive.position);
        assert_eq!(packed.color(), primitive.color);
        assert_eq!(packed.opacity(), 0.75);
        assert!(packed.covariance().abs_diff_eq(primitive.covariance(), 1e-6));
        assert_eq!(&packed.matrix[12..16], &[1.0, 2.0, 3.0, 0.75]);
    }

    #[test]
    fn flat_view_is_sixteen_floats_per_primitive() {
        let buffer: PrimitiveBuffer = (0..3)
            .map(|i| PackedPrimitive { matrix: [i as f32; 16] })
            .collect();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.as_floats().len(), 48);
        assert_eq!(buffer.as_floats()[16], 1.0);
    }
}
