use std::path::PathBuf;

use super::CameraConfig;

/// Scene and frame configuration for the renderer.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub shader_path: PathBuf,
    pub vertex_entry: String,
    pub pixel_entry: String,
    pub vertex_profile: String,
    pub pixel_profile: String,

    /// OBJ model drawn instead of the cube when set.
    pub mesh_path: Option<PathBuf>,

    pub clear_color: [f32; 4],
    pub camera: CameraConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shader_path: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/phong.wgsl")),
            vertex_entry: "vs_main".to_string(),
            pixel_entry: "ps_main".to_string(),
            vertex_profile: "vs_5_1".to_string(),
            pixel_profile: "ps_5_1".to_string(),
            mesh_path: None,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            camera: CameraConfig::default(),
        }
    }
}
