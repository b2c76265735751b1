use std::sync::Arc;

use anyhow::Result;
use winit::window::Window;

use crate::input::{InputState, MouseButtons};
use crate::time::FrameTime;

/// Control directive returned by frame callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Window event handler implemented by the frame orchestrator.
///
/// Pointer coordinates are client-area physical pixels. Errors returned from
/// any callback stop the event loop and surface from `Runtime::run`.
pub trait WindowHandler {
    /// Called once the window exists, before the first resize or frame.
    fn on_init(&mut self, window: Arc<Window>) -> Result<()>;

    /// Called with the new client size. Never called with a zero dimension;
    /// minimizing pauses the loop instead.
    fn on_resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn on_mouse_down(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        let _ = (buttons, x, y);
    }

    fn on_mouse_up(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        let _ = (buttons, x, y);
    }

    fn on_mouse_move(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        let _ = (buttons, x, y);
    }

    /// Focus gained (`true`) or lost (`false`).
    fn on_activate(&mut self, active: bool) {
        let _ = active;
    }

    /// Called once per frame while the loop is not paused.
    fn on_frame(&mut self, time: FrameTime, input: &InputState) -> Result<AppControl>;
}
