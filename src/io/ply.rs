use std::io::Write;

use bevy::math::Vec3;
use ply_rs::{
    ply::{
        Addable,
        DefaultElement,
        ElementDef,
        Encoding,
        Ply,
        Property,
        PropertyDef,
        PropertyType,
        ScalarType,
    },
    writer::Writer,
};

use crate::{
    camera::{
        reflect_rotation,
        world_to_source,
    },
    gaussian::Primitive,
    math::logit,
};


pub const SH_C0: f32 = 0.282_094_8;

/// Opacity written for primitives that never contribute coverage.
pub const TRANSPARENT_LOGIT: f32 = -100.0;

const VERTEX_PROPERTIES: [&str; 17] = [
    "x", "y", "z",
    "nx", "ny", "nz",
    "f_dc_0", "f_dc_1", "f_dc_2",
    "opacity",
    "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];


/// Standard 3DGS vertex values: source-frame position, zero normal, DC
/// color, logit opacity, log scale, `(w, x, y, z)` rotation.
pub fn vertex_values(primitive: &Primitive) -> [f32; 17] {
    let position = world_to_source(primitive.position);
    let rotation = reflect_rotation(primitive.rotation).normalize();
    let color = (primitive.color - 0.5) / SH_C0;
    let scale = primitive.scale.max(Vec3::splat(f32::MIN_POSITIVE)).to_array().map(f32::ln);

    let opacity = if primitive.opacity <= 0.0 {
        TRANSPARENT_LOGIT
    } else {
        logit(primitive.opacity.min(1.0 - f32::EPSILON))
    };

    [
        position.x, position.y, position.z,
        0.0, 0.0, 0.0,
        color.x, color.y, color.z,
        opacity,
        scale[0], scale[1], scale[2],
        rotation.w, rotation.x, rotation.y, rotation.z,
    ]
}

pub fn write_ply_3d<'a, W: Write>(
    writer: &mut W,
    primitives: impl IntoIterator<Item = &'a Primitive>,
) -> Result<usize, std::io::Error> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::BinaryLittleEndian;

    let mut vertex = ElementDef::new("vertex".to_string());
    for name in VERTEX_PROPERTIES {
        vertex.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    ply.header.elements.add(vertex);

    let vertices = primitives
        .into_iter()
        .map(|primitive| {
            let mut element = DefaultElement::new();
            for (name, value) in VERTEX_PROPERTIES.iter().zip(vertex_values(primitive)) {
                element.insert(name.to_string(), Property::Float(value));
            }
            element
        })
        .collect::<Vec<_>>();
    ply.payload.insert("vertex".to_string(), vertices);

    ply.make_consistent().map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{err:?}"))
    })?;

    Writer::new().write_ply(writer, &mut ply)
}


#[cfg(test)]
mod tests {
    use bevy::math::Quat;

    use super::*;

    #[test]
    fn vertex_values_leave_world_frame() {
        let primitive = Primitive {
            position: Vec3::new(1.0, 2.0, -3.0),
            scale: Vec3::new(1.0, std::f32::consts::E, 0.0),
            rotation: Quat::IDENTITY,
            color: Vec3::splat(0.5),
            opacity: 0.5,
        };

        let values = vertex_values(&primitive);

        assert_eq!(&values[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&values[6..9], &[0.0, 0.0, 0.0]);
        assert!(values[9].abs() < 1e-6);
        assert!(values[10].abs() < 1e-6);
        assert!((values[11] - 1.0).abs() < 1e-6);
        assert!(values[12].is_finite());
        assert_eq!(&values[13..17], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn masked_primitives_are_transparent() {
        let primitive = Primitive {
            rotation: Quat::IDENTITY,
            ..Default::default()
        };

        assert_eq!(vertex_values(&primitive)[9], TRANSPARENT_LOGIT);
    }

    #[test]
    fn writes_binary_header() {
        let primitives = vec![
            Primitive {
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
                opacity: 0.9,
                ..Default::default()
            };
            3
        ];

        let mut bytes = Vec::new();
        write_ply_3d(&mut bytes, &primitives).unwrap();

        let header = String::from_utf8_lossy(&bytes);
        assert!(header.starts_with("ply\n"));
        assert!(header.contains("binary_little_endian"));
        assert!(header.contains("element vertex 3"));
        assert!(header.contains("rot_3"));
        assert!(bytes.len() > 3 * 17 * 4);
    }
}
