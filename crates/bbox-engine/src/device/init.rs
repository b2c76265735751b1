use crate::hal::reference::ReferenceInstance;
use crate::hal::wgpu_backend::WgpuInstance;
use crate::hal::{FeatureLevel, Format, GpuPreference, Instance};

/// Which `hal` backend the engine runs on.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BackendKind {
    /// wgpu on the platform's native API.
    #[default]
    Hardware,
    /// In-process validating device; renders nothing visible.
    Reference,
}

impl BackendKind {
    /// Parses `hardware` / `reference` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hardware" | "wgpu" => Some(Self::Hardware),
            "reference" | "ref" => Some(Self::Reference),
            _ => None,
        }
    }
}

/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub backend: BackendKind,

    /// Adapters that cannot create a device at this level are rejected.
    pub min_feature_level: FeatureLevel,

    /// Adapter ordering tried first; plain enumeration order follows.
    pub preference: GpuPreference,

    pub back_buffer_format: Format,
    pub depth_format: Format,

    /// Flip-model ring size.
    pub swap_chain_buffers: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backend: BackendKind::Hardware,
            min_feature_level: FeatureLevel::L12_0,
            preference: GpuPreference::HighPerformance,
            back_buffer_format: Format::R8G8B8A8Unorm,
            depth_format: Format::D24UnormS8Uint,
            swap_chain_buffers: 2,
        }
    }
}

/// Creates the instance for `backend`.
pub fn create_instance(backend: BackendKind) -> Box<dyn Instance> {
    match backend {
        BackendKind::Hardware => Box::new(WgpuInstance::new()),
        BackendKind::Reference => Box::new(ReferenceInstance::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!(BackendKind::from_name("Reference"), Some(BackendKind::Reference));
        assert_eq!(BackendKind::from_name(" hardware "), Some(BackendKind::Hardware));
        assert_eq!(BackendKind::from_name("vulkan"), None);
    }

    #[test]
    fn defaults_match_the_viewer() {
        let init = GpuInit::default();
        assert_eq!(init.min_feature_level, FeatureLevel::L12_0);
        assert_eq!(init.swap_chain_buffers, 2);
        assert_eq!(init.back_buffer_format, Format::R8G8B8A8Unorm);
        assert_eq!(init.depth_format, Format::D24UnormS8Uint);
    }
}
