use bevy::prelude::*;

pub use anchor::{
    Anchor,
    AnchorBuffers,
    AnchorStore,
    LevelInfo,
    rand::random_anchors,
};
pub use camera::{
    NeuralCamera,
    Viewpoint,
};
pub use error::{
    InferenceError,
    LoadError,
    PipelineError,
};
pub use gaussian::{
    Primitive,
    packed::{
        PackedPrimitive,
        PrimitiveBuffer,
    },
};
pub use pipeline::{
    PipelineScheduler,
    PipelineSettings,
    PublishedPrimitives,
    TickReport,
};
pub use query::AnchorSelector;
pub use sort::{
    BlendOrder,
    DepthSorter,
};
pub use synthesis::{
    Synthesizer,
    engine::{
        InferenceEngine,
        MlpHead,
    },
    mlp::MlpEngine,
};

pub mod anchor;
pub mod camera;
pub mod error;
pub mod gaussian;
pub mod io;
pub mod math;
pub mod pipeline;
pub mod query;
pub mod sort;
pub mod synthesis;
pub mod utils;


/// Ticks a [`PipelineScheduler`] resource every frame from the
/// [`NeuralCamera`] entity and mirrors its output into
/// [`PublishedPrimitives`]. Nothing runs until the scheduler is inserted.
pub struct NeuralSplattingPlugin;

impl Plugin for NeuralSplattingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PublishedPrimitives>();

        app.add_systems(
            Update,
            pipeline::drive_pipeline.run_if(resource_exists::<PipelineScheduler>),
        );
    }
}
