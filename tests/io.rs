use std::path::PathBuf;

use bevy_neural_splatting::{
    AnchorStore,
    LoadError,
    MlpEngine,
    MlpHead,
    io::anchors::{
        ANCHOR_SCALES,
        GSPLAT_POSITIONS,
        load_anchor_buffers,
        write_anchor_buffers,
    },
    synthesis::mlp::Mlp,
};

use _harness::{
    FEATURE_WIDTH,
    two_anchor_buffers,
};



fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "bevy_neural_splatting_{}_{name}",
        std::process::id(),
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}


#[test]
fn test_anchor_directory_round_trip() {
    let dir = scratch_dir("anchors");
    let buffers = two_anchor_buffers();

    write_anchor_buffers(&dir, &buffers).unwrap();
    assert_eq!(load_anchor_buffers(&dir).unwrap(), buffers);

    let store = AnchorStore::load_dir(&dir, FEATURE_WIDTH).unwrap();
    assert_eq!(store, AnchorStore::from_buffers(buffers, FEATURE_WIDTH).unwrap());
    assert_eq!(store.len(), 2);
    assert_eq!(store.fan_out(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_and_truncated_files() {
    let dir = scratch_dir("broken");
    write_anchor_buffers(&dir, &two_anchor_buffers()).unwrap();

    std::fs::remove_file(dir.join(GSPLAT_POSITIONS)).unwrap();
    match AnchorStore::load_dir(&dir, FEATURE_WIDTH) {
        Err(LoadError::Io { path, .. }) => assert!(path.ends_with(GSPLAT_POSITIONS)),
        other => panic!("expected io error, got {other:?}"),
    }

    write_anchor_buffers(&dir, &two_anchor_buffers()).unwrap();
    std::fs::write(dir.join(ANCHOR_SCALES), [0u8; 10]).unwrap();
    assert!(matches!(
        AnchorStore::load_dir(&dir, FEATURE_WIDTH),
        Err(LoadError::Misaligned { len: 10, .. }),
    ));

    write_anchor_buffers(&dir, &two_anchor_buffers()).unwrap();
    std::fs::write(dir.join(ANCHOR_SCALES), [0u8; 8]).unwrap();
    assert!(matches!(
        AnchorStore::load_dir(&dir, FEATURE_WIDTH),
        Err(LoadError::LengthMismatch { expected: 6, actual: 2, .. }),
    ));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_mlp_weights_load_from_json() {
    let dir = scratch_dir("mlp");
    std::fs::create_dir_all(&dir).unwrap();

    let engine = MlpEngine::random(FEATURE_WIDTH, 2, 8, 1);
    for head in MlpHead::ALL {
        let json = serde_json::to_string(engine.head(head)).unwrap();
        std::fs::write(dir.join(format!("{}.json", head.file_stem())), json).unwrap();
    }

    let loaded = MlpEngine::load_dir(&dir).unwrap();
    assert_eq!(loaded, engine);
    assert_eq!(loaded.input_width(), FEATURE_WIDTH + 3);

    std::fs::write(dir.join("cov_mlp.json"), "{ \"layers\": [").unwrap();
    assert!(matches!(
        MlpEngine::load_dir(&dir),
        Err(LoadError::Json { .. }),
    ));

    let narrow = Mlp::random(&mut rand::thread_rng(), &[3, 14], Default::default(), Default::default());
    std::fs::write(dir.join("cov_mlp.json"), serde_json::to_string(&narrow).unwrap()).unwrap();
    assert!(matches!(
        MlpEngine::load_dir(&dir),
        Err(LoadError::Model(_)),
    ));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[cfg(feature = "io_ply")]
#[test]
fn test_ply_export_writes_every_primitive() {
    use std::sync::Arc;

    use bevy::math::Vec3;
    use bevy_neural_splatting::{
        PipelineSettings,
        Synthesizer,
        io::ply::write_ply_3d,
    };

    let store = Arc::new(AnchorStore::from_buffers(two_anchor_buffers(), FEATURE_WIDTH).unwrap());
    let engine = Arc::new(MlpEngine::random(FEATURE_WIDTH, 2, 8, 5));
    let settings = PipelineSettings {
        fan_out: 2,
        feature_width: FEATURE_WIDTH,
        ..Default::default()
    };

    let mut synthesizer = Synthesizer::new(store, engine, &settings);
    synthesizer.synthesize_anchors(&[0, 1], Vec3::ZERO).unwrap();

    let mut bytes = Vec::new();
    write_ply_3d(&mut bytes, synthesizer.primitives()).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    let header_end = text.find("end_header\n").unwrap() + "end_header\n".len();
    assert!(text[..header_end].contains("element vertex 4"));
    assert_eq!(bytes.len() - header_end, 4 * 17 * 4);
}
