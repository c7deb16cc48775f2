use bevy::prelude::*;
use bevy_args::{
    Deserialize,
    Parser,
    Serialize,
};

use crate::pipeline::PipelineSettings;


#[derive(
    Clone,
    Debug,
    Resource,
    Serialize,
    Deserialize,
    Parser,
)]
#[command(about = "bevy_neural_splatting pipeline", version, long_about = None)]
pub struct NeuralSplattingArgs {
    /// directory holding the anchor_*.bin and gsplat_positions.bin buffers, empty for random anchors
    #[arg(long, default_value = "")]
    pub anchor_dir: String,

    /// directory holding color_mlp.json, opacity_mlp.json and cov_mlp.json, empty for random weights
    #[arg(long, default_value = "")]
    pub mlp_dir: String,

    #[arg(long, default_value = "")]
    pub settings_file: String,

    #[arg(long, default_value = "10000")]
    pub random_anchor_count: usize,

    #[arg(long, default_value = "0")]
    pub seed: u64,

    #[arg(long, default_value = "1000")]
    pub inference_batch: usize,

    #[arg(long, default_value = "0.0")]
    pub camera_x: f32,

    #[arg(long, default_value = "0.0")]
    pub camera_y: f32,

    #[arg(long, default_value = "30.0")]
    pub camera_z: f32,

    #[arg(long, default_value = "45.0")]
    pub fov_degrees: f32,

    #[arg(long, default_value = "1.7777778")]
    pub aspect_ratio: f32,

    #[arg(long, default_value = "240")]
    pub frames: u32,

    #[arg(long, default_value = "neural_splats.ply")]
    pub output: String,

    /// export every anchor instead of the ones visible from the camera
    #[arg(long, default_value = "0")]
    pub all_anchors: u8,
}

impl Default for NeuralSplattingArgs {
    fn default() -> NeuralSplattingArgs {
        NeuralSplattingArgs {
            anchor_dir: "".to_string(),
            mlp_dir: "".to_string(),
            settings_file: "".to_string(),
            random_anchor_count: 10000,
            seed: 0,
            inference_batch: 1000,
            camera_x: 0.0,
            camera_y: 0.0,
            camera_z: 30.0,
            fov_degrees: 45.0,
            aspect_ratio: 16.0 / 9.0,
            frames: 240,
            output: "neural_splats.ply".to_string(),
            all_anchors: 0,
        }
    }
}

impl NeuralSplattingArgs {
    pub fn camera_position(&self) -> Vec3 {
        Vec3::new(self.camera_x, self.camera_y, self.camera_z)
    }

    /// Settings file if given, defaults otherwise, with the batch size applied.
    pub fn settings(&self) -> Result<PipelineSettings, crate::PipelineError> {
        let mut settings = if self.settings_file.is_empty() {
            PipelineSettings::default()
        } else {
            let path = std::path::Path::new(&self.settings_file);
            let json = std::fs::read_to_string(path).map_err(|source| {
                crate::LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            PipelineSettings::from_json(&json)?
        };

        if self.inference_batch > 0 {
            settings.inference_batch = Some(self.inference_batch);
        }

        Ok(settings)
    }
}


pub fn setup_hooks() {
    #[cfg(debug_assertions)]
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
    }
}
