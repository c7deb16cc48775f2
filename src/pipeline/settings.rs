use bevy::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    anchor::DEFAULT_FEATURE_WIDTH,
    error::PipelineError,
    query::DEFAULT_FRUSTUM_BOUNDS,
    sort::BlendOrder,
    synthesis::decode::DEFAULT_QUATERNION_EPSILON,
};


pub const DEFAULT_FAN_OUT: usize = 10;


/// Whether the opacity head already ends in a logistic.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OpacityActivation {
    #[default]
    Identity,
    Logistic,
}


#[derive(
    Clone,
    Debug,
    PartialEq,
    Resource,
    Serialize,
    Deserialize,
)]
#[serde(default)]
pub struct PipelineSettings {
    pub fan_out: usize,
    pub feature_width: usize,
    pub frustum_bounds: f32,
    pub blend_order: BlendOrder,
    pub opacity_activation: OpacityActivation,
    pub quaternion_epsilon: f32,
    pub inference_batch: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fan_out: DEFAULT_FAN_OUT,
            feature_width: DEFAULT_FEATURE_WIDTH,
            frustum_bounds: DEFAULT_FRUSTUM_BOUNDS,
            blend_order: BlendOrder::default(),
            opacity_activation: OpacityActivation::default(),
            quaternion_epsilon: DEFAULT_QUATERNION_EPSILON,
            inference_batch: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json)
            .map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn input_width(&self) -> usize {
        self.feature_width + 3
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.fan_out == 0 {
            return Err(PipelineError::Config("fan_out must be positive".into()));
        }

        if self.feature_width == 0 {
            return Err(PipelineError::Config("feature_width must be positive".into()));
        }

        if !(self.frustum_bounds.is_finite() && self.frustum_bounds > 0.0) {
            return Err(PipelineError::Config(format!(
                "frustum_bounds must be positive, got {}",
                self.frustum_bounds,
            )));
        }

        if !(self.quaternion_epsilon.is_finite() && self.quaternion_epsilon > 0.0) {
            return Err(PipelineError::Config(format!(
                "quaternion_epsilon must be positive, got {}",
                self.quaternion_epsilon,
            )));
        }

        if self.inference_batch == Some(0) {
            return Err(PipelineError::Config("inference_batch must be positive".into()));
        }

        Ok(())
    }
}
