use std::sync::Arc;

use bevy_args::parse_args;

use bevy_neural_splatting::{
    AnchorStore,
    MlpEngine,
    Synthesizer,
    Viewpoint,
    io::ply::write_ply_3d,
    random_anchors,
    utils::{
        NeuralSplattingArgs,
        setup_hooks,
    },
};


fn main() {
    setup_hooks();
    let args = parse_args::<NeuralSplattingArgs>();
    let settings = args.settings().expect("failed to read settings");

    let store = if args.anchor_dir.is_empty() {
        println!("generating {} random anchors", args.random_anchor_count);
        random_anchors(args.random_anchor_count, settings.fan_out, args.seed)
    } else {
        println!("loading anchors from `{}`", args.anchor_dir);
        AnchorStore::load_dir(&args.anchor_dir, settings.feature_width)
            .expect("failed to load anchors")
    };

    let engine = if args.mlp_dir.is_empty() {
        MlpEngine::random(store.feature_width(), store.fan_out(), 32, args.seed)
    } else {
        MlpEngine::load_dir(&args.mlp_dir).expect("failed to load mlp weights")
    };

    let camera = args.camera_position();
    let viewpoint = Viewpoint::look_at(
        camera,
        bevy::math::Vec3::ZERO,
        args.fov_degrees.to_radians(),
        args.aspect_ratio,
        0.1,
        1000.0,
    );

    let store = Arc::new(store);
    let mut synthesizer = Synthesizer::new(store.clone(), Arc::new(engine), &settings);

    let indices = if args.all_anchors > 0 {
        (0..store.len()).collect::<Vec<_>>()
    } else {
        synthesizer.selector().select(&store, &viewpoint)
    };
    println!("synthesizing {} of {} anchors", indices.len(), store.len());

    synthesizer
        .synthesize_anchors(&indices, camera)
        .expect("inference failed");

    let fan_out = store.fan_out();
    let primitives = synthesizer.primitives();
    let exported = indices
        .iter()
        .flat_map(|&anchor| &primitives[anchor * fan_out..(anchor + 1) * fan_out]);

    let file = std::fs::File::create(&args.output).expect("failed to create output file");
    let mut writer = std::io::BufWriter::new(file);
    write_ply_3d(&mut writer, exported).expect("failed to write ply");

    println!(
        "wrote {} primitives to `{}`",
        indices.len() * fan_out,
        args.output,
    );
}
