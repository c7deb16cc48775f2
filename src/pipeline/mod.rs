use std::sync::Arc;

use bevy::{
    prelude::*,
    render::camera::{
        CameraProjection,
        Projection,
    },
};

use crate::{
    anchor::AnchorStore,
    camera::{
        NeuralCamera,
        Viewpoint,
    },
    error::{
        InferenceError,
        PipelineError,
    },
    gaussian::packed::PrimitiveBuffer,
    sort::DepthSorter,
    synthesis::{
        Synthesizer,
        engine::{
            InferenceEngine,
            MlpHead,
        },
    },
};

pub mod settings;
pub mod stage;

pub use settings::{
    OpacityActivation,
    PipelineSettings,
};
pub use stage::{
    Stage,
    StageState,
};


pub type SynthesisOutput = Result<Option<PrimitiveBuffer>, InferenceError>;


/// What a single [`PipelineScheduler::tick`] did.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
)]
pub struct TickReport {
    pub synthesis_completed: bool,
    pub synthesis_failed: bool,
    pub synthesis_submitted: bool,
    pub sort_submitted: bool,
    pub published: bool,
}


/// Latest sorted buffer as seen by the renderer.
#[derive(Clone, Debug, Default, Resource)]
pub struct PublishedPrimitives {
    pub buffer: Arc<PrimitiveBuffer>,
    pub generation: u64,
}


/// Paces synthesis and sorting against a moving viewpoint.
///
/// Each stage holds at most one request. Synthesis is resubmitted when the
/// viewpoint changes; sorting is resubmitted when either the synthesized
/// buffer or the view direction changes. A sort may run on a buffer one
/// synthesis cycle behind.
#[derive(Resource)]
pub struct PipelineScheduler {
    settings: PipelineSettings,
    synthesis: Stage<Synthesizer, SynthesisOutput>,
    sort: Stage<DepthSorter, PrimitiveBuffer>,
    last_synthesis: Option<Viewpoint>,
    last_sort: Option<(Arc<PrimitiveBuffer>, Vec3)>,
    synthesized: Arc<PrimitiveBuffer>,
    published: Arc<PrimitiveBuffer>,
    generation: u64,
}

impl PipelineScheduler {
    pub fn new(
        store: Arc<AnchorStore>,
        engine: Arc<dyn InferenceEngine>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;

        if store.fan_out() != settings.fan_out {
            return Err(PipelineError::Config(format!(
                "store has {} primitives per anchor, settings expect {}",
                store.fan_out(),
                settings.fan_out,
            )));
        }

        if store.feature_width() != settings.feature_width {
            return Err(PipelineError::Config(format!(
                "store features are {} wide, settings expect {}",
                store.feature_width(),
                settings.feature_width,
            )));
        }

        if engine.fixed_batch_size() == Some(0) {
            return Err(PipelineError::Config("engine batch size is zero".into()));
        }

        if let Some(width) = engine.input_width() {
            if width != settings.input_width() {
                return Err(PipelineError::Config(format!(
                    "engine takes {width} inputs per row, settings produce {}",
                    settings.input_width(),
                )));
            }
        }

        for head in MlpHead::ALL {
            let expected = head.row_width(settings.fan_out);
            if let Some(width) = engine.output_width(head) {
                if width != expected {
                    return Err(PipelineError::Config(format!(
                        "{head:?} head yields {width} values per row, expected {expected}",
                    )));
                }
            }
        }

        let synthesizer = Synthesizer::new(store, engine, &settings);
        let sorter = DepthSorter::new(settings.blend_order);

        Ok(Self {
            synthesis: Stage::new("synthesis", synthesizer),
            sort: Stage::new("sort", sorter),
            settings,
            last_synthesis: None,
            last_sort: None,
            synthesized: Arc::default(),
            published: Arc::default(),
            generation: 0,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Most recent sorted buffer.
    pub fn published(&self) -> &Arc<PrimitiveBuffer> {
        &self.published
    }

    /// Most recent synthesized buffer, unsorted.
    pub fn synthesized(&self) -> &Arc<PrimitiveBuffer> {
        &self.synthesized
    }

    /// Incremented each time a sorted buffer is published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn synthesis_state(&self) -> StageState {
        self.synthesis.state()
    }

    pub fn sort_state(&self) -> StageState {
        self.sort.state()
    }

    /// Runs one synthesis and one sort to completion on the calling thread's
    /// behalf. Any request already in flight is awaited first.
    pub fn initialize(&mut self, viewpoint: &Viewpoint) -> Result<(), PipelineError> {
        if !viewpoint.is_finite() {
            return Err(PipelineError::Config("viewpoint is not finite".into()));
        }

        if let Some(output) = self.synthesis.wait() {
            if let Err(err) = self.finish_synthesis(output) {
                warn!("synthesis cycle abandoned: {err}");
            }
        }
        if let Some(sorted) = self.sort.wait() {
            self.publish(sorted);
        }

        let target = *viewpoint;
        self.synthesis.try_submit(move |synthesizer| synthesizer.synthesize(&target));
        self.last_synthesis = Some(target);

        if let Some(output) = self.synthesis.wait() {
            self.finish_synthesis(output)?;
        }

        if self.submit_sort(viewpoint.forward) {
            if let Some(sorted) = self.sort.wait() {
                self.publish(sorted);
            }
        }

        info!(
            "pipeline initialized: {} primitives published",
            self.published.len(),
        );

        Ok(())
    }

    /// Never blocks. Collects finished work, then submits new requests to
    /// idle stages.
    pub fn tick(&mut self, viewpoint: &Viewpoint) -> TickReport {
        let mut report = TickReport::default();

        if let Some(output) = self.synthesis.poll() {
            match self.finish_synthesis(output) {
                Ok(()) => report.synthesis_completed = true,
                Err(err) => {
                    warn!("synthesis cycle abandoned: {err}");
                    report.synthesis_failed = true;
                }
            }
        }

        if let Some(sorted) = self.sort.poll() {
            self.publish(sorted);
            report.published = true;
        }

        if !viewpoint.is_finite() {
            warn!("skipping non-finite viewpoint");
            return report;
        }

        if self.last_synthesis != Some(*viewpoint) && self.synthesis.is_idle() {
            let target = *viewpoint;
            report.synthesis_submitted = self.synthesis
                .try_submit(move |synthesizer| synthesizer.synthesize(&target));

            if report.synthesis_submitted {
                self.last_synthesis = Some(target);
                debug!("synthesis submitted");
            }
        }

        report.sort_submitted = self.submit_sort(viewpoint.forward);

        report
    }

    /// A failed cycle keeps the remembered viewpoint, so it is only retried
    /// once the viewpoint changes.
    fn finish_synthesis(&mut self, output: SynthesisOutput) -> Result<(), InferenceError> {
        match output {
            Ok(Some(buffer)) => {
                debug!("synthesis completed: {} primitives", buffer.len());
                self.synthesized = Arc::new(buffer);
                Ok(())
            }
            Ok(None) => {
                debug!("synthesis completed with no visible anchors");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn submit_sort(&mut self, forward: Vec3) -> bool {
        if !self.sort.is_idle() {
            return false;
        }

        let unchanged = self.last_sort
            .as_ref()
            .is_some_and(|(buffer, last_forward)| {
                Arc::ptr_eq(buffer, &self.synthesized) && *last_forward == forward
            });
        if unchanged {
            return false;
        }

        let buffer = Arc::clone(&self.synthesized);
        self.last_sort = Some((Arc::clone(&buffer), forward));

        self.sort.try_submit(move |sorter| sorter.sort(&buffer, forward))
    }

    fn publish(&mut self, sorted: PrimitiveBuffer) {
        self.published = Arc::new(sorted);
        self.generation += 1;
    }
}


/// Samples the first [`NeuralCamera`] and advances the scheduler by one tick.
pub fn drive_pipeline(
    mut scheduler: ResMut<PipelineScheduler>,
    mut published: ResMut<PublishedPrimitives>,
    cameras: Query<(&GlobalTransform, &Projection), With<NeuralCamera>>,
) {
    // TODO: one scheduler per camera, the first camera drives all splats for now
    let Some((transform, projection)) = cameras.iter().next() else {
        return;
    };

    let viewpoint = Viewpoint::from_transform(transform, projection.get_clip_from_view());
    scheduler.tick(&viewpoint);

    if published.generation != scheduler.generation() {
        published.buffer = Arc::clone(scheduler.published());
        published.generation = scheduler.generation();
    }
}
