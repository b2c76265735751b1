use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::{CursorGrabMode, Window};

use crate::core::{AppControl, WindowHandler};
use crate::device::{create_instance, GpuInit};
use crate::hal::PresentTarget;
use crate::input::{InputState, MouseButtons};
use crate::time::FrameTime;

use super::{Renderer, RendererConfig};

/// Keeps the cursor confined to the window while a mouse-look drag is active.
#[derive(Debug, Default)]
struct CursorCapture {
    captured: bool,
}

impl CursorCapture {
    /// Grab mode to apply when the look state changed since the last call.
    fn sync(&mut self, looking: bool) -> Option<CursorGrabMode> {
        if looking == self.captured {
            return None;
        }
        self.captured = looking;
        Some(if looking { CursorGrabMode::Confined } else { CursorGrabMode::None })
    }
}

/// Window handler driving a `Renderer`. The renderer is created in `on_init`,
/// once the window exists.
pub struct Viewer {
    config: RendererConfig,
    gpu: GpuInit,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    capture: CursorCapture,
}

impl Viewer {
    pub fn new(config: RendererConfig, gpu: GpuInit) -> Self {
        Self {
            config,
            gpu,
            renderer: None,
            window: None,
            capture: CursorCapture::default(),
        }
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    fn sync_cursor_capture(&mut self) {
        let looking = self.renderer.as_ref().is_some_and(|r| r.camera().is_looking());
        let (Some(mode), Some(window)) = (self.capture.sync(looking), self.window.as_ref()) else {
            return;
        };
        if let Err(e) = window.set_cursor_grab(mode) {
            log::debug!("cursor grab {mode:?} unavailable: {e}");
        }
    }
}

impl WindowHandler for Viewer {
    fn on_init(&mut self, window: Arc<Window>) -> Result<()> {
        let size = window.inner_size();
        let instance = create_instance(self.gpu.backend);
        self.window = Some(window.clone());
        let renderer = Renderer::new(
            instance.as_ref(),
            PresentTarget::Window(window),
            size.width,
            size.height,
            self.config.clone(),
            &self.gpu,
        )
        .context("failed to initialize the renderer")?;
        self.renderer = Some(renderer);
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<()> {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer
                .resize(width, height)
                .with_context(|| format!("resize to {width}x{height} failed"))?;
        }
        Ok(())
    }

    fn on_mouse_down(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.camera_mut().on_mouse_down(buttons, x, y);
        }
        self.sync_cursor_capture();
    }

    fn on_mouse_up(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.camera_mut().on_mouse_up(buttons, x, y);
        }
        self.sync_cursor_capture();
    }

    fn on_mouse_move(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.camera_mut().on_mouse_move(buttons, x, y);
        }
    }

    fn on_activate(&mut self, active: bool) {
        if !active {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.camera_mut().cancel_look();
            }
            self.sync_cursor_capture();
        }
    }

    fn on_frame(&mut self, time: FrameTime, input: &InputState) -> Result<AppControl> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(AppControl::Continue);
        };
        renderer.update(time.dt, input).context("frame update failed")?;
        renderer
            .draw()
            .with_context(|| format!("frame {} failed", time.frame_index))?;
        Ok(AppControl::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_confined_only_while_looking() {
        let mut capture = CursorCapture::default();
        assert_eq!(capture.sync(false), None);
        assert_eq!(capture.sync(true), Some(CursorGrabMode::Confined));
        assert_eq!(capture.sync(true), None);
        assert_eq!(capture.sync(false), Some(CursorGrabMode::None));
        assert_eq!(capture.sync(false), None);
    }
}
