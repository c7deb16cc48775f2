use serde::{
    Deserialize,
    Serialize,
};

use crate::error::InferenceError;


/// The three networks sharing one input row per anchor.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MlpHead {
    Color,
    Opacity,
    Covariance,
}

impl MlpHead {
    pub const ALL: [MlpHead; 3] = [
        MlpHead::Color,
        MlpHead::Opacity,
        MlpHead::Covariance,
    ];

    /// 3 color channels, 1 opacity, 3 scale logits + 4 quaternion components.
    pub const fn values_per_primitive(self) -> usize {
        match self {
            MlpHead::Color => 3,
            MlpHead::Opacity => 1,
            MlpHead::Covariance => 7,
        }
    }

    pub const fn row_width(self, fan_out: usize) -> usize {
        self.values_per_primitive() * fan_out
    }

    pub const fn file_stem(self) -> &'static str {
        match self {
            MlpHead::Color => "color_mlp",
            MlpHead::Opacity => "opacity_mlp",
            MlpHead::Covariance => "cov_mlp",
        }
    }
}


/// External inference engine. `input` holds `batch` rows of equal width and
/// the result must hold `batch * head.row_width(fan_out)` values.
pub trait InferenceEngine: Send + Sync {
    /// Batch size the engine was built for, `None` accepts any batch.
    fn fixed_batch_size(&self) -> Option<usize> {
        None
    }

    /// Row width every head expects, `None` when the engine cannot tell.
    fn input_width(&self) -> Option<usize> {
        None
    }

    /// Values per output row of `head`, `None` when the engine cannot tell.
    fn output_width(&self, _head: MlpHead) -> Option<usize> {
        None
    }

    fn infer(
        &self,
        head: MlpHead,
        input: &[f32],
        batch: usize,
    ) -> Result<Vec<f32>, InferenceError>;
}
