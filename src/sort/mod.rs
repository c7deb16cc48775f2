use serde::{
    Deserialize,
    Serialize,
};

pub mod bucket;

pub use bucket::{
    DepthSorter,
    SORT_BUCKETS,
};


/// Order primitives are emitted in for compositing.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlendOrder {
    /// Farthest first, for "over" compositing.
    #[default]
    BackToFront,

    /// Nearest first, for "under" compositing (`OneMinusDstAlpha, One`).
    FrontToBack,
}
