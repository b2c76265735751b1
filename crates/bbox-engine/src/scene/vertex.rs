use bytemuck::{Pod, Zeroable};

use crate::math::{Mat4, Vec3};

/// Interleaved vertex: position, normal, RGBA color. 40 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], normal: [f32; 3], color: [f32; 4]) -> Self {
        Self { pos, normal, color }
    }
}

/// Per-object constants (register b0 / binding 0).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub world_inv_transpose: [[f32; 4]; 4],
}

impl ObjectConstants {
    /// World matrix plus its inverse-transpose for normals. A singular world
    /// matrix falls back to identity for the normal transform.
    pub fn from_world(world: Mat4) -> Self {
        let inv_t = world.inverse().map(|m| m.transpose()).unwrap_or_default();
        Self {
            world: world.to_cols_array_2d(),
            world_inv_transpose: inv_t.to_cols_array_2d(),
        }
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::from_world(Mat4::IDENTITY)
    }
}

/// Per-pass constants (register b1 / binding 1). 160 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view_proj: [[f32; 4]; 4],
    pub eye_pos_w: [f32; 3],
    pub _pad0: f32,
    pub light_dir_w: [f32; 3],
    pub _pad1: f32,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub spec_power: f32,
    pub _pad2: [f32; 3],
}

impl PassConstants {
    pub const DEFAULT_LIGHT_DIR: Vec3 = Vec3::new(0.577, -0.3, 0.577);
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            eye_pos_w: [0.0; 3],
            _pad0: 0.0,
            light_dir_w: Self::DEFAULT_LIGHT_DIR.to_array(),
            _pad1: 0.0,
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [1.0; 4],
            specular: [1.0; 4],
            spec_power: 32.0,
            _pad2: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constant_buffer_stride;

    #[test]
    fn layouts_match_shader_expectations() {
        assert_eq!(std::mem::size_of::<Vertex>(), 40);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
        assert_eq!(std::mem::size_of::<PassConstants>(), 160);
        assert_eq!(std::mem::offset_of!(PassConstants, ambient), 96);
        assert_eq!(std::mem::offset_of!(PassConstants, spec_power), 144);
    }

    #[test]
    fn constant_strides_round_to_256() {
        assert_eq!(constant_buffer_stride(std::mem::size_of::<ObjectConstants>()), 256);
        assert_eq!(constant_buffer_stride(std::mem::size_of::<PassConstants>()), 256);
    }

    #[test]
    fn inverse_transpose_of_uniform_scale() {
        let c = ObjectConstants::from_world(Mat4::scaling(Vec3::splat(2.0)));
        assert_eq!(c.world[0][0], 2.0);
        assert!((c.world_inv_transpose[0][0] - 0.5).abs() < 1e-6);
        assert!((c.world_inv_transpose[3][3] - 1.0).abs() < 1e-6);
    }
}
