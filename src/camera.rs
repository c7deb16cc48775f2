use bevy::{
    prelude::*,
    math::{
        Mat4,
        Quat,
        Vec3,
    },
};


#[derive(
    Clone,
    Component,
    Debug,
    Default,
)]
pub struct NeuralCamera;


/// Anchor data is authored in a frame mirrored along z relative to the world
/// frame. The flip is applied once when buffers are ingested and once more
/// wherever data leaves the crate in source coordinates.
pub const SOURCE_AXIS_FLIP: Vec3 = Vec3::new(1.0, 1.0, -1.0);

#[inline]
pub fn source_to_world(v: Vec3) -> Vec3 {
    v * SOURCE_AXIS_FLIP
}

#[inline]
pub fn world_to_source(v: Vec3) -> Vec3 {
    v * SOURCE_AXIS_FLIP
}

/// Conjugates a rotation by the z mirror, `F * R(q) * F`.
#[inline]
pub fn reflect_rotation(rotation: Quat) -> Quat {
    Quat::from_xyzw(-rotation.x, -rotation.y, rotation.z, rotation.w)
}


/// Camera state sampled once per scheduler tick, world frame.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
)]
pub struct Viewpoint {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub forward: Vec3,
}

impl Viewpoint {
    pub fn new(
        position: Vec3,
        view: Mat4,
        projection: Mat4,
        forward: Vec3,
    ) -> Self {
        Self {
            position,
            view,
            projection,
            forward,
        }
    }

    pub fn from_transform(transform: &GlobalTransform, projection: Mat4) -> Self {
        Self {
            position: transform.translation(),
            view: transform.compute_matrix().inverse(),
            projection,
            forward: transform.forward().as_vec3(),
        }
    }

    /// OpenGL-style clip space (`-w <= z <= w`), right handed, +y up.
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position: eye,
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh_gl(fov_y_radians, aspect_ratio, near, far),
            forward: (target - eye).normalize_or_zero(),
        }
    }

    pub fn clip_from_world(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.forward.is_finite()
            && self.view.is_finite()
            && self.projection.is_finite()
    }
}
