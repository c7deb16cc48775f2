use std::path::Path;

use static_assertions::assert_cfg;

use crate::{
    anchor::{
        AnchorBuffers,
        AnchorStore,
    },
    error::LoadError,
};


assert_cfg!(
    target_endian = "little",
    "anchor buffers are little-endian f32 and are reinterpreted in place",
);


pub const ANCHOR_POSITIONS: &str = "anchor_positions.bin";
pub const ANCHOR_SCALES: &str = "anchor_scales.bin";
pub const ANCHOR_FEATURES: &str = "anchor_features.bin";
pub const ANCHOR_LEVELS: &str = "anchor_levels.bin";
pub const ANCHOR_EXTRA_LEVELS: &str = "anchor_extra_levels.bin";
pub const ANCHOR_INFO: &str = "anchor_info.bin";
pub const GSPLAT_POSITIONS: &str = "gsplat_positions.bin";


pub fn decode_f32s(name: &'static str, bytes: &[u8]) -> Result<Vec<f32>, LoadError> {
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(LoadError::Misaligned {
            name,
            len: bytes.len(),
        });
    }

    Ok(bytemuck::allocation::pod_collect_to_vec::<u8, f32>(bytes))
}

pub fn read_f32_buffer(dir: &Path, name: &'static str) -> Result<Vec<f32>, LoadError> {
    let path = dir.join(name);
    let bytes = std::fs::read(&path)
        .map_err(|source| LoadError::Io { path, source })?;

    decode_f32s(name, &bytes)
}

pub fn load_anchor_buffers(dir: impl AsRef<Path>) -> Result<AnchorBuffers, LoadError> {
    let dir = dir.as_ref();

    Ok(AnchorBuffers {
        positions: read_f32_buffer(dir, ANCHOR_POSITIONS)?,
        scales: read_f32_buffer(dir, ANCHOR_SCALES)?,
        features: read_f32_buffer(dir, ANCHOR_FEATURES)?,
        levels: read_f32_buffer(dir, ANCHOR_LEVELS)?,
        extra_levels: read_f32_buffer(dir, ANCHOR_EXTRA_LEVELS)?,
        info: read_f32_buffer(dir, ANCHOR_INFO)?,
        base_offsets: read_f32_buffer(dir, GSPLAT_POSITIONS)?,
    })
}

pub fn write_anchor_buffers(
    dir: impl AsRef<Path>,
    buffers: &AnchorBuffers,
) -> Result<(), LoadError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|source| LoadError::Io { path: dir.to_path_buf(), source })?;

    let files: [(&str, &[f32]); 7] = [
        (ANCHOR_POSITIONS, &buffers.positions),
        (ANCHOR_SCALES, &buffers.scales),
        (ANCHOR_FEATURES, &buffers.features),
        (ANCHOR_LEVELS, &buffers.levels),
        (ANCHOR_EXTRA_LEVELS, &buffers.extra_levels),
        (ANCHOR_INFO, &buffers.info),
        (GSPLAT_POSITIONS, &buffers.base_offsets),
    ];

    for (name, values) in files {
        let path = dir.join(name);
        std::fs::write(&path, bytemuck::cast_slice::<f32, u8>(values))
            .map_err(|source| LoadError::Io { path, source })?;
    }

    Ok(())
}


impl AnchorStore {
    pub fn load_dir(
        dir: impl AsRef<Path>,
        feature_width: usize,
    ) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        let store = Self::from_buffers(load_anchor_buffers(dir)?, feature_width)?;

        bevy::log::info!(
            "loaded {} anchors ({} primitives) from {}",
            store.len(),
            store.primitive_count(),
            dir.display(),
        );

        Ok(store)
    }
}
