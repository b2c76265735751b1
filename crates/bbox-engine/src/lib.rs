//! Bbox engine crate.
//!
//! Explicit GPU command submission and synchronization behind a small
//! D3D12-shaped hardware abstraction, plus the viewer scene built on it.

pub mod core;
pub mod input;
pub mod logging;
pub mod time;
pub mod window;

pub mod device;
pub mod hal;
pub mod math;

pub mod mesh;
pub mod scene;
pub mod shader;
