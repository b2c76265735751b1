//! Small linear-algebra kit for the camera and the per-object constants.
//!
//! Conventions:
//! - column vectors, `Mat4 * v`
//! - column-major storage, matching WGSL `mat4x4<f32>` so matrices upload as-is
//! - left-handed view space, clip depth in `[0, 1]`

mod mat4;
mod vec3;

pub use mat4::Mat4;
pub use vec3::Vec3;
