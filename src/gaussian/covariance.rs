use bevy::math::{Mat3, Quat, Vec3};

/// `Mᵗ·M` with `M = S·Rᵗ`, which equals `R·S²·Rᵗ`.
#[allow(non_snake_case)]
pub fn compute_covariance_3d(rotation: Quat, scale: Vec3) -> Mat3 {
    let S = Mat3::from_diagonal(scale);
    let R = Mat3::from_quat(rotation).transpose();

    let M = S * R;
    M.transpose() * M
}
