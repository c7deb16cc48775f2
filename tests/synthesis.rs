use std::sync::{
    Arc,
    atomic::Ordering,
};

use bevy::math::{
    Quat,
    Vec3,
};

use bevy_neural_splatting::{
    InferenceError,
    MlpHead,
    Primitive,
    Synthesizer,
    pipeline::OpacityActivation,
};

use _harness::{
    ConstantEngine,
    FailingEngine,
    TruncatingEngine,
    ZeroBatchEngine,
    camera_at,
    origin_camera,
    test_settings,
    two_anchor_store,
};



#[test]
fn test_input_rows_carry_source_frame_direction() {
    let synthesizer = Synthesizer::new(two_anchor_store(), Arc::new(ConstantEngine::default()), &test_settings());

    let input = synthesizer.build_input(&[0, 1], Vec3::ZERO);
    assert_eq!(input.len(), 2 * 7);

    assert_eq!(&input[0..4], &[0.1, 0.2, 0.3, 0.4]);
    // anchor 0 sits straight ahead in world -z, i.e. source +z
    assert_eq!(&input[4..7], &[0.0, 0.0, 1.0]);

    assert_eq!(&input[7..11], &[-0.1, -0.2, -0.3, -0.4]);
    let direction = Vec3::from_slice(&input[11..14]);
    assert!((direction - Vec3::new(1.0, 0.0, 8.0).normalize()).length() < 1e-6);
}

#[test]
fn test_decodes_constant_outputs() {
    let store = two_anchor_store();
    let mut synthesizer = Synthesizer::new(store.clone(), Arc::new(ConstantEngine::default()), &test_settings());

    let buffer = synthesizer.synthesize(&origin_camera()).unwrap().unwrap();
    assert_eq!(buffer.len(), 4);

    let primitives = synthesizer.primitives();
    assert_eq!(primitives.len(), 4);

    let expected = Primitive {
        position: Vec3::new(1.0, 0.5, -6.0),
        scale: Vec3::splat(0.2),
        rotation: Quat::IDENTITY,
        color: Vec3::splat(0.5),
        opacity: 0.8,
    };
    let actual = primitives[3];

    assert_eq!(actual.position, expected.position);
    assert!((actual.scale - expected.scale).length() < 1e-6);
    assert!(actual.rotation.abs_diff_eq(expected.rotation, 1e-6));
    assert_eq!(actual.color, expected.color);
    assert_eq!(actual.opacity, expected.opacity);

    assert_eq!(buffer[3].translation(), store.base_offset(1, 1));
    assert!(buffer[3].covariance().abs_diff_eq(actual.covariance(), 1e-6));
    assert_eq!(buffer[0].opacity(), 0.8);
}

#[test]
fn test_logistic_opacity_activation() {
    let settings = bevy_neural_splatting::PipelineSettings {
        opacity_activation: OpacityActivation::Logistic,
        ..test_settings()
    };
    let mut synthesizer = Synthesizer::new(two_anchor_store(), Arc::new(ConstantEngine::default()), &settings);

    synthesizer.synthesize_anchors(&[0], Vec3::ZERO).unwrap();

    let expected = 1.0 / (1.0 + (-0.8f32).exp());
    assert!((synthesizer.primitives()[0].opacity - expected).abs() < 1e-6);
}

#[test]
fn test_pads_to_fixed_batch() {
    let engine = Arc::new(ConstantEngine::with_batch(3));
    let mut synthesizer = Synthesizer::new(two_anchor_store(), engine.clone(), &test_settings());

    synthesizer.synthesize_anchors(&[0, 1], Vec3::ZERO).unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    assert_eq!(*engine.batches.lock().unwrap(), vec![3, 3, 3]);

    let input = engine.last_input.lock().unwrap().clone();
    assert_eq!(input.len(), 3 * 7);
    assert!(input[14..].iter().all(|&v| v == 0.0));
    assert!(synthesizer.primitives().iter().all(|p| p.opacity == 0.8));
}

#[test]
fn test_splits_rows_into_batches() {
    let engine = Arc::new(ConstantEngine::with_batch(1));
    let mut synthesizer = Synthesizer::new(two_anchor_store(), engine.clone(), &test_settings());

    synthesizer.synthesize_anchors(&[0, 1], Vec3::ZERO).unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 6);
    assert!(engine.batches.lock().unwrap().iter().all(|&batch| batch == 1));
    assert!(synthesizer.primitives().iter().all(|p| p.opacity == 0.8));
}

#[test]
fn test_settings_batch_applies_without_engine_batch() {
    let settings = bevy_neural_splatting::PipelineSettings {
        inference_batch: Some(4),
        ..test_settings()
    };
    let engine = Arc::new(ConstantEngine::default());
    let mut synthesizer = Synthesizer::new(two_anchor_store(), engine.clone(), &settings);

    assert_eq!(synthesizer.batch_size(), Some(4));
    synthesizer.synthesize_anchors(&[1], Vec3::ZERO).unwrap();
    assert_eq!(*engine.batches.lock().unwrap(), vec![4, 4, 4]);
}

#[test]
fn test_unselected_slots_are_transparent() {
    let mut synthesizer = Synthesizer::new(two_anchor_store(), Arc::new(ConstantEngine::default()), &test_settings());
    synthesizer.synthesize_anchors(&[0, 1], Vec3::ZERO).unwrap();

    let buffer = synthesizer.pack(&[1]);
    let opacities = buffer.iter().map(|p| p.opacity()).collect::<Vec<_>>();

    assert_eq!(opacities, vec![0.0, 0.0, 0.8, 0.8]);
    assert_eq!(buffer[0].translation(), synthesizer.primitives()[0].position);
}

#[test]
fn test_empty_selection_yields_nothing() {
    let engine = Arc::new(ConstantEngine::default());
    let mut synthesizer = Synthesizer::new(two_anchor_store(), engine.clone(), &test_settings());

    let away = camera_at(Vec3::ZERO, Vec3::Z);
    assert_eq!(synthesizer.synthesize(&away), Ok(None));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_shape_mismatch_is_a_hard_error() {
    let mut synthesizer = Synthesizer::new(two_anchor_store(), Arc::new(TruncatingEngine), &test_settings());

    let result = synthesizer.synthesize(&origin_camera());
    assert_eq!(
        result,
        Err(InferenceError::ShapeMismatch {
            head: MlpHead::Color,
            expected: 12,
            actual: 11,
        }),
    );
    assert!(synthesizer.primitives().iter().all(|p| *p == Primitive::default()));
}

#[test]
fn test_zero_batch_engine_is_an_error() {
    let mut synthesizer = Synthesizer::new(two_anchor_store(), Arc::new(ZeroBatchEngine), &test_settings());

    assert!(matches!(
        synthesizer.synthesize_anchors(&[0], Vec3::ZERO),
        Err(InferenceError::Engine(_)),
    ));
    assert!(matches!(
        synthesizer.synthesize(&origin_camera()),
        Err(InferenceError::Engine(_)),
    ));
    assert!(synthesizer.primitives().iter().all(|p| *p == Primitive::default()));
}

#[test]
fn test_engine_failure_keeps_previous_primitives() {
    let store = two_anchor_store();
    let mut good = Synthesizer::new(store.clone(), Arc::new(ConstantEngine::default()), &test_settings());
    good.synthesize_anchors(&[0, 1], Vec3::ZERO).unwrap();

    let mut failing = Synthesizer::new(store, Arc::new(FailingEngine), &test_settings());
    assert!(matches!(
        failing.synthesize(&origin_camera()),
        Err(InferenceError::Engine(_)),
    ));
    assert!(failing.primitives().iter().all(|p| *p == Primitive::default()));
    assert!(good.primitives().iter().all(|p| p.opacity == 0.8));
}
