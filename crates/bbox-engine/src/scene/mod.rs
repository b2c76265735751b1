//! Frame orchestration.
//!
//! `Renderer` owns the device layer and records the fixed frame: transition
//! to render target, clear, draw the model or the cube, transition back,
//! submit, present, flush. `Viewer` adapts it to window events.

mod camera;
mod config;
mod geometry;
mod renderer;
mod vertex;
mod viewer;

pub use camera::{CameraConfig, CameraController};
pub use config::RendererConfig;
pub use geometry::{build_box, MeshData};
pub use renderer::Renderer;
pub use vertex::{ObjectConstants, PassConstants, Vertex};
pub use viewer::Viewer;
