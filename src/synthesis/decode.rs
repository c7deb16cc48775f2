use bevy::math::{
    Quat,
    Vec3,
    Vec4,
};

use crate::{
    camera::reflect_rotation,
    math::sigmoid,
    pipeline::settings::OpacityActivation,
};


pub const DEFAULT_QUATERNION_EPSILON: f32 = 1e-12;


pub fn decode_color(raw: &[f32]) -> Vec3 {
    Vec3::from_slice(&raw[..3])
}

/// Logistic scale logits modulated by the anchor scale.
pub fn decode_scale(raw: &[f32], anchor_scale: Vec3) -> Vec3 {
    Vec3::new(
        sigmoid(raw[0]),
        sigmoid(raw[1]),
        sigmoid(raw[2]),
    ) * anchor_scale
}

pub fn normalize_quaternion(raw: Vec4, epsilon: f32) -> Vec4 {
    raw / raw.length().max(epsilon)
}

/// Raw network output is `(w, x, y, z)` in the source frame.
pub fn decode_rotation(raw: &[f32], epsilon: f32) -> Quat {
    let wxyz = normalize_quaternion(Vec4::from_slice(&raw[..4]), epsilon);
    reflect_rotation(Quat::from_xyzw(wxyz.y, wxyz.z, wxyz.w, wxyz.x))
}

/// Negative opacity never contributes coverage.
pub fn decode_opacity(raw: f32, activation: OpacityActivation) -> f32 {
    let opacity = match activation {
        OpacityActivation::Identity => raw,
        OpacityActivation::Logistic => sigmoid(raw),
    };

    opacity.max(0.0)
}
