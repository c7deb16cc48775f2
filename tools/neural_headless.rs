use std::sync::Arc;

use bevy::{
    app::ScheduleRunnerPlugin,
    log::LogPlugin,
    prelude::*,
    render::camera::{
        CameraProjection,
        PerspectiveProjection,
        Projection,
    },
};
use bevy_args::{
    BevyArgsPlugin,
    parse_args,
};

use bevy_neural_splatting::{
    AnchorStore,
    MlpEngine,
    NeuralCamera,
    NeuralSplattingPlugin,
    PipelineScheduler,
    PublishedPrimitives,
    Viewpoint,
    random_anchors,
    utils::{
        NeuralSplattingArgs,
        setup_hooks,
    },
};


fn setup_pipeline(
    mut commands: Commands,
    args: Res<NeuralSplattingArgs>,
) {
    let settings = args.settings().expect("failed to read settings");

    let store = if args.anchor_dir.is_empty() {
        random_anchors(args.random_anchor_count, settings.fan_out, args.seed)
    } else {
        AnchorStore::load_dir(&args.anchor_dir, settings.feature_width)
            .expect("failed to load anchors")
    };

    let engine = if args.mlp_dir.is_empty() {
        MlpEngine::random(store.feature_width(), store.fan_out(), 32, args.seed)
    } else {
        MlpEngine::load_dir(&args.mlp_dir).expect("failed to load mlp weights")
    };

    let projection = Projection::Perspective(PerspectiveProjection {
        fov: args.fov_degrees.to_radians(),
        aspect_ratio: args.aspect_ratio,
        ..default()
    });
    let transform = Transform::from_translation(args.camera_position()).looking_at(Vec3::ZERO, Vec3::Y);

    let mut scheduler = PipelineScheduler::new(Arc::new(store), Arc::new(engine), settings)
        .expect("incompatible pipeline settings");
    scheduler
        .initialize(&Viewpoint::from_transform(
            &GlobalTransform::from(transform),
            projection.get_clip_from_view(),
        ))
        .expect("pipeline initialization failed");

    commands.insert_resource(scheduler);
    commands.spawn((
        transform,
        projection,
        NeuralCamera,
        Name::new("neural_camera"),
    ));
}

fn orbit_camera(
    time: Res<Time>,
    args: Res<NeuralSplattingArgs>,
    mut cameras: Query<&mut Transform, With<NeuralCamera>>,
) {
    let radius = args.camera_position().length().max(1.0);
    let angle = time.elapsed_secs() * 0.5;

    for mut transform in cameras.iter_mut() {
        let eye = Vec3::new(radius * angle.sin(), args.camera_y, radius * angle.cos());
        *transform = Transform::from_translation(eye).looking_at(Vec3::ZERO, Vec3::Y);
    }
}

fn report_published(
    published: Res<PublishedPrimitives>,
    args: Res<NeuralSplattingArgs>,
    mut frames: Local<u32>,
    mut exit: EventWriter<AppExit>,
) {
    if published.is_changed() {
        info!(
            "generation {}: {} primitives",
            published.generation,
            published.buffer.len(),
        );
    }

    *frames += 1;
    if *frames >= args.frames {
        exit.write(AppExit::Success);
    }
}

fn neural_headless_app() {
    let config = parse_args::<NeuralSplattingArgs>();
    println!("running {} frames", config.frames);

    let mut app = App::new();

    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            std::time::Duration::from_secs_f64(1.0 / 60.0),
        )),
        LogPlugin::default(),
        TransformPlugin,
    ));
    app.add_plugins(BevyArgsPlugin::<NeuralSplattingArgs>::default());

    app.add_plugins(NeuralSplattingPlugin);
    app.add_systems(Startup, setup_pipeline);
    app.add_systems(Update, (orbit_camera, report_published));

    app.run();
}

pub fn main() {
    setup_hooks();
    neural_headless_app();
}
