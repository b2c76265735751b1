//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the window, pumps events into an injected
//! `core::WindowHandler`, and pauses the frame loop while the window is
//! minimized or inactive.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
