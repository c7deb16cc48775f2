use std::path::Path;

use bevy::log::info;
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use serde::{
    Deserialize,
    Serialize,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    error::{
        InferenceError,
        LoadError,
    },
    math::sigmoid,
    synthesis::engine::{
        InferenceEngine,
        MlpHead,
    },
};


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
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
        }
    }
}


/// Fully connected layer, torch layout: `weight[out][in]`.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Serialize,
    Deserialize,
)]
pub struct DenseLayer {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn in_features(&self) -> usize {
        self.weight.first().map_or(0, Vec::len)
    }

    pub fn out_features(&self) -> usize {
        self.weight.len()
    }

    fn forward(&self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        output.extend(self.weight.iter().zip(&self.bias).map(|(row, bias)| {
            let sum = row
                .iter()
                .zip(input)
                .fold(*bias, |acc, (w, x)| acc + w * x);
            self.activation.apply(sum)
        }));
    }
}


#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
)]
pub struct Mlp {
    pub layers: Vec<DenseLayer>,
}

impl Mlp {
    /// Uniform weights in `±1/sqrt(in)`, zero biases.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        widths: &[usize],
        hidden: Activation,
        output: Activation,
    ) -> Self {
        let layer_count = widths.len().saturating_sub(1);
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let bound = 1.0 / (pair[0] as f32).sqrt();
                DenseLayer {
                    weight: (0..pair[1])
                        .map(|_| (0..pair[0]).map(|_| rng.gen_range(-bound..=bound)).collect())
                        .collect(),
                    bias: vec![0.0; pair[1]],
                    activation: if index + 1 == layer_count { output } else { hidden },
                }
            })
            .collect();

        Self { layers }
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::in_features)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::out_features)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("no layers".into());
        }

        if self.input_width() == 0 {
            return Err("first layer takes no inputs".into());
        }

        let mut width = self.input_width();
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.out_features() == 0 {
                return Err(format!("layer {index} has no outputs"));
            }

            if let Some(row) = layer.weight.iter().position(|row| row.len() != width) {
                return Err(format!(
                    "layer {index} row {row} has {} inputs, expected {width}",
                    layer.weight[row].len(),
                ));
            }

            if layer.bias.len() != layer.out_features() {
                return Err(format!(
                    "layer {index} has {} biases for {} outputs",
                    layer.bias.len(),
                    layer.out_features(),
                ));
            }

            let finite = layer.bias.iter().chain(layer.weight.iter().flatten()).all(|v| v.is_finite());
            if !finite {
                return Err(format!("layer {index} has non-finite parameters"));
            }

            width = layer.out_features();
        }

        Ok(())
    }

    /// Evaluates one row, `row.len() == self.input_width()`.
    pub fn forward_row(&self, row: &[f32], output: &mut [f32]) {
        let mut current = row.to_vec();
        let mut next = Vec::new();

        for layer in &self.layers {
            layer.forward(&current, &mut next);
            std::mem::swap(&mut current, &mut next);
        }

        output.copy_from_slice(&current);
    }

    pub fn forward(&self, input: &[f32], rows: usize) -> Vec<f32> {
        let in_width = self.input_width();
        let out_width = self.output_width();
        let mut output = vec![0.0; rows * out_width];

        #[cfg(feature = "parallel")]
        output
            .par_chunks_mut(out_width)
            .zip(input.par_chunks(in_width))
            .for_each(|(out, row)| self.forward_row(row, out));

        #[cfg(not(feature = "parallel"))]
        output
            .chunks_mut(out_width)
            .zip(input.chunks(in_width))
            .for_each(|(out, row)| self.forward_row(row, out));

        output
    }
}


/// CPU evaluation of the color, opacity and covariance networks.
#[derive(Clone, Debug, PartialEq)]
pub struct MlpEngine {
    color: Mlp,
    opacity: Mlp,
    covariance: Mlp,
    fixed_batch_size: Option<usize>,
}

impl MlpEngine {
    pub fn new(
        color: Mlp,
        opacity: Mlp,
        covariance: Mlp,
    ) -> Result<Self, LoadError> {
        let engine = Self {
            color,
            opacity,
            covariance,
            fixed_batch_size: None,
        };

        let input_width = engine.color.input_width();
        for head in MlpHead::ALL {
            let mlp = engine.head(head);
            mlp.validate()
                .map_err(|err| LoadError::Model(format!("{}: {err}", head.file_stem())))?;

            if mlp.input_width() != input_width {
                return Err(LoadError::Model(format!(
                    "{} takes {} inputs, {} takes {input_width}",
                    head.file_stem(),
                    mlp.input_width(),
                    MlpHead::Color.file_stem(),
                )));
            }
        }

        Ok(engine)
    }

    /// Reads `color_mlp.json`, `opacity_mlp.json` and `cov_mlp.json` from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let dir = dir.as_ref();

        let read = |head: MlpHead| -> Result<Mlp, LoadError> {
            let path = dir.join(format!("{}.json", head.file_stem()));
            let json = std::fs::read_to_string(&path)
                .map_err(|source| LoadError::Io { path: path.clone(), source })?;

            serde_json::from_str(&json)
                .map_err(|source| LoadError::Json { path, source })
        };

        let engine = Self::new(
            read(MlpHead::Color)?,
            read(MlpHead::Opacity)?,
            read(MlpHead::Covariance)?,
        )?;

        info!(
            "loaded mlp heads from {} (input width {})",
            dir.display(),
            engine.input_width(),
        );

        Ok(engine)
    }

    /// Untrained heads with one hidden layer, shaped for `feature_width`
    /// features and `fan_out` primitives per anchor.
    pub fn random(
        feature_width: usize,
        fan_out: usize,
        hidden: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let input = feature_width + 3;
        let mut build = |head: MlpHead, output: Activation| {
            Mlp::random(&mut rng, &[input, hidden.max(1), head.row_width(fan_out)], Activation::Relu, output)
        };

        Self {
            color: build(MlpHead::Color, Activation::Sigmoid),
            opacity: build(MlpHead::Opacity, Activation::Tanh),
            covariance: build(MlpHead::Covariance, Activation::Identity),
            fixed_batch_size: None,
        }
    }

    pub fn with_fixed_batch_size(mut self, batch: usize) -> Self {
        self.fixed_batch_size = Some(batch.max(1));
        self
    }

    pub fn head(&self, head: MlpHead) -> &Mlp {
        match head {
            MlpHead::Color => &self.color,
            MlpHead::Opacity => &self.opacity,
            MlpHead::Covariance => &self.covariance,
        }
    }

    pub fn input_width(&self) -> usize {
        self.color.input_width()
    }

    pub fn output_width(&self, head: MlpHead) -> usize {
        self.head(head).output_width()
    }
}

impl InferenceEngine for MlpEngine {
    fn fixed_batch_size(&self) -> Option<usize> {
        self.fixed_batch_size
    }

    fn input_width(&self) -> Option<usize> {
        Some(MlpEngine::input_width(self))
    }

    fn output_width(&self, head: MlpHead) -> Option<usize> {
        Some(MlpEngine::output_width(self, head))
    }

    fn infer(
        &self,
        head: MlpHead,
        input: &[f32],
        batch: usize,
    ) -> Result<Vec<f32>, InferenceError> {
        let width = self.input_width();
        if input.len() != batch * width {
            return Err(InferenceError::InputWidth {
                width,
                actual: input.len(),
            });
        }

        if let Some(fixed) = self.fixed_batch_size {
            if batch != fixed {
                return Err(InferenceError::Engine(format!(
                    "engine runs batches of {fixed}, got {batch}",
                )));
            }
        }

        Ok(self.head(head).forward(input, batch))
    }
}
