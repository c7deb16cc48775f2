use std::sync::Arc;

use bevy::{
    log::debug,
    math::Vec3,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    anchor::AnchorStore,
    camera::{
        Viewpoint,
        world_to_source,
    },
    error::InferenceError,
    gaussian::{
        Primitive,
        packed::PrimitiveBuffer,
    },
    math::pad_to_multiple,
    pipeline::settings::{
        OpacityActivation,
        PipelineSettings,
    },
    query::AnchorSelector,
    synthesis::{
        decode::{
            decode_color,
            decode_opacity,
            decode_rotation,
            decode_scale,
        },
        engine::{
            InferenceEngine,
            MlpHead,
        },
    },
};

pub mod decode;
pub mod engine;
pub mod mlp;


/// Per-head outputs for a set of selected anchors, padding rows removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeadOutputs {
    pub color: Vec<f32>,
    pub opacity: Vec<f32>,
    pub covariance: Vec<f32>,
}

impl HeadOutputs {
    fn head_mut(&mut self, head: MlpHead) -> &mut Vec<f32> {
        match head {
            MlpHead::Color => &mut self.color,
            MlpHead::Opacity => &mut self.opacity,
            MlpHead::Covariance => &mut self.covariance,
        }
    }
}


/// Expands selected anchors into primitives through the inference engine.
///
/// Owns one primitive slot per `(anchor, sub-index)` for the whole store.
/// Slots of anchors outside the current selection keep their last geometry
/// and are packed with zero opacity.
pub struct Synthesizer {
    store: Arc<AnchorStore>,
    engine: Arc<dyn InferenceEngine>,
    selector: AnchorSelector,
    opacity_activation: OpacityActivation,
    quaternion_epsilon: f32,
    batch_size: Option<usize>,
    primitives: Vec<Primitive>,
}

impl Synthesizer {
    pub fn new(
        store: Arc<AnchorStore>,
        engine: Arc<dyn InferenceEngine>,
        settings: &PipelineSettings,
    ) -> Self {
        let batch_size = engine.fixed_batch_size().or(settings.inference_batch);
        let primitives = vec![Primitive::default(); store.primitive_count()];

        Self {
            store,
            engine,
            selector: AnchorSelector::new(settings.frustum_bounds),
            opacity_activation: settings.opacity_activation,
            quaternion_epsilon: settings.quaternion_epsilon,
            batch_size,
            primitives,
        }
    }

    pub fn store(&self) -> &Arc<AnchorStore> {
        &self.store
    }

    pub fn selector(&self) -> &AnchorSelector {
        &self.selector
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Feature vector followed by the source-frame unit vector from camera to anchor.
    pub fn input_width(&self) -> usize {
        self.store.feature_width() + 3
    }

    pub fn build_input(
        &self,
        indices: &[usize],
        camera_position: Vec3,
    ) -> Vec<f32> {
        let mut input = Vec::with_capacity(indices.len() * self.input_width());

        for &index in indices {
            let direction = (self.store.position(index) - camera_position).normalize_or_zero();

            input.extend_from_slice(self.store.features(index));
            input.extend_from_slice(&world_to_source(direction).to_array());
        }

        input
    }

    /// Runs every head over `rows` input rows, split into zero-padded
    /// batches when the engine needs a fixed batch size.
    pub fn run_heads(
        &self,
        input: &[f32],
        rows: usize,
    ) -> Result<HeadOutputs, InferenceError> {
        let width = self.input_width();
        if input.len() != rows * width {
            return Err(InferenceError::InputWidth {
                width,
                actual: input.len(),
            });
        }

        let fan_out = self.store.fan_out();
        let batch = self.batch_size.unwrap_or(rows).max(1);
        let mut outputs = HeadOutputs::default();
        let mut padded = Vec::new();

        for (chunk_index, chunk) in input.chunks(batch * width).enumerate() {
            let chunk_rows = chunk.len() / width;
            let chunk_batch = match self.batch_size {
                Some(batch) => batch,
                None => chunk_rows,
            };

            if chunk_batch < chunk_rows {
                return Err(InferenceError::Engine(format!(
                    "batch size {chunk_batch} cannot hold {chunk_rows} rows",
                )));
            }

            let chunk_input = if chunk_rows == chunk_batch {
                chunk
            } else {
                padded.clear();
                padded.extend_from_slice(chunk);
                padded.resize(pad_to_multiple(chunk_rows, chunk_batch) * width, 0.0);
                padded.as_slice()
            };

            for head in MlpHead::ALL {
                let row_width = head.row_width(fan_out);
                let output = self.engine.infer(head, chunk_input, chunk_batch)?;

                if output.len() != chunk_batch * row_width {
                    return Err(InferenceError::ShapeMismatch {
                        head,
                        expected: chunk_batch * row_width,
                        actual: output.len(),
                    });
                }

                outputs
                    .head_mut(head)
                    .extend_from_slice(&output[..chunk_rows * row_width]);
            }

            debug!("inference batch {chunk_index}: {chunk_rows} rows");
        }

        Ok(outputs)
    }

    fn decode_primitive(
        &self,
        outputs: &HeadOutputs,
        anchor: usize,
        slot: usize,
        sub_index: usize,
    ) -> Primitive {
        Primitive {
            position: self.store.base_offset(anchor, sub_index),
            scale: decode_scale(&outputs.covariance[slot * 7..slot * 7 + 3], self.store.scale(anchor)),
            rotation: decode_rotation(&outputs.covariance[slot * 7 + 3..slot * 7 + 7], self.quaternion_epsilon),
            color: decode_color(&outputs.color[slot * 3..slot * 3 + 3]),
            opacity: decode_opacity(outputs.opacity[slot], self.opacity_activation),
        }
    }

    /// Synthesizes the primitive slots of `indices`; on error no slot is touched.
    pub fn synthesize_anchors(
        &mut self,
        indices: &[usize],
        camera_position: Vec3,
    ) -> Result<(), InferenceError> {
        if indices.is_empty() {
            return Ok(());
        }

        let input = self.build_input(indices, camera_position);
        let outputs = self.run_heads(&input, indices.len())?;
        let fan_out = self.store.fan_out();

        let decode = |slot: usize| {
            self.decode_primitive(&outputs, indices[slot / fan_out], slot, slot % fan_out)
        };

        #[cfg(feature = "parallel")]
        let decoded: Vec<Primitive> = (0..indices.len() * fan_out)
            .into_par_iter()
            .map(decode)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let decoded: Vec<Primitive> = (0..indices.len() * fan_out)
            .map(decode)
            .collect();

        for (slot, primitive) in decoded.into_iter().enumerate() {
            let anchor = indices[slot / fan_out];
            self.primitives[anchor * fan_out + slot % fan_out] = primitive;
        }

        Ok(())
    }

    /// Packs every slot, zeroing the opacity of anchors outside `indices`.
    pub fn pack(&self, indices: &[usize]) -> PrimitiveBuffer {
        let fan_out = self.store.fan_out();
        let mut selected = vec![false; self.store.len()];
        for &index in indices {
            selected[index] = true;
        }

        self.primitives
            .iter()
            .enumerate()
            .map(|(slot, primitive)| {
                let mut packed = primitive.pack();
                if !selected[slot / fan_out] {
                    packed.matrix[15] = 0.0;
                }
                packed
            })
            .collect()
    }

    /// `Ok(None)` when no anchor survives selection; the caller keeps its
    /// previous buffer in that case.
    pub fn synthesize(
        &mut self,
        viewpoint: &Viewpoint,
    ) -> Result<Option<PrimitiveBuffer>, InferenceError> {
        let indices = self.selector.select(&self.store, viewpoint);
        if indices.is_empty() {
            debug!("no visible anchors");
            return Ok(None);
        }

        self.synthesize_anchors(&indices, viewpoint.position)?;

        debug!(
            "synthesized {} anchors ({} primitives)",
            indices.len(),
            indices.len() * self.store.fan_out(),
        );

        Ok(Some(self.pack(&indices)))
    }
}
