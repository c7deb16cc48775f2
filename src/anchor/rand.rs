use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};

use crate::anchor::{
    AnchorBuffers,
    AnchorStore,
    DEFAULT_FEATURE_WIDTH,
};


pub fn random_anchor_buffers<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    fan_out: usize,
    feature_width: usize,
) -> AnchorBuffers {
    let mut buffers = AnchorBuffers {
        info: vec![0.01, 10.0],
        ..Default::default()
    };

    for _ in 0..count {
        let position: [f32; 3] = [
            rng.gen_range(-20.0..20.0),
            rng.gen_range(-20.0..20.0),
            rng.gen_range(-20.0..20.0),
        ];
        buffers.positions.extend(position);

        buffers.scales.extend([
            rng.gen_range(0.01..0.5f32),
            rng.gen_range(0.01..0.5f32),
            rng.gen_range(0.01..0.5f32),
        ]);

        buffers.features.extend((0..feature_width).map(|_| rng.gen_range(-1.0..1.0f32)));

        buffers.levels.push(rng.gen_range(0..4) as f32);
        buffers.extra_levels.push(rng.gen_range(-0.5..0.5));

        for _ in 0..fan_out {
            buffers.base_offsets.extend([
                position[0] + rng.gen_range(-0.5..0.5),
                position[1] + rng.gen_range(-0.5..0.5),
                position[2] + rng.gen_range(-0.5..0.5),
            ]);
        }
    }

    buffers
}

pub fn random_anchors(count: usize, fan_out: usize, seed: u64) -> AnchorStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let buffers = random_anchor_buffers(&mut rng, count.max(1), fan_out.max(1), DEFAULT_FEATURE_WIDTH);

    AnchorStore::from_buffers(buffers, DEFAULT_FEATURE_WIDTH)
        .expect("random anchor buffers are consistent")
}
