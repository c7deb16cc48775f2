use bevy::math::{
    Mat3,
    Quat,
    Vec3,
};

use crate::gaussian::{
    covariance::compute_covariance_3d,
    packed::PackedPrimitive,
};

pub mod covariance;
pub mod packed;


/// One synthesized splat, world frame.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
)]
pub struct Primitive {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub color: Vec3,
    pub opacity: f32,
}

impl Primitive {
    pub fn covariance(&self) -> Mat3 {
        compute_covariance_3d(self.rotation, self.scale)
    }

    pub fn pack(&self) -> PackedPrimitive {
        PackedPrimitive::new(
            self.covariance(),
            self.position,
            self.color,
            self.opacity,
        )
    }
}
