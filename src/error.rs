use std::path::PathBuf;

use thiserror::Error;

use crate::synthesis::engine::MlpHead;


#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{name}` is {len} bytes, not a whole number of f32 values")]
    Misaligned {
        name: &'static str,
        len: usize,
    },

    #[error("`{name}` holds {actual} values, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("anchor store is empty")]
    Empty,

    #[error("`{name}` contains a non-finite value at {index}")]
    NonFinite {
        name: &'static str,
        index: usize,
    },

    #[error("malformed weight file `{path}`: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    Model(String),
}


#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("inference engine failed: {0}")]
    Engine(String),

    #[error("{head:?} head returned {actual} values, expected {expected}")]
    ShapeMismatch {
        head: MlpHead,
        expected: usize,
        actual: usize,
    },

    #[error("input has {actual} values, not a multiple of the row width {width}")]
    InputWidth {
        width: usize,
        actual: usize,
    },
}


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}
