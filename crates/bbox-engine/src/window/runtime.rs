use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{AppControl, WindowHandler};
use crate::input::platform::winit::translate_window_event;
use crate::input::{InputEvent, InputState};
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    /// Client-area size in physical pixels.
    pub initial_size: PhysicalSize<u32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "CG Window".to_string(),
            initial_size: PhysicalSize::new(1280, 720),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs the event loop until the window closes, the handler asks to exit,
    /// or a handler callback fails. The first failure is returned.
    pub fn run<H>(config: RuntimeConfig, handler: H) -> Result<()>
    where
        H: WindowHandler + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, handler);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct AppState<H> {
    config: RuntimeConfig,
    handler: H,

    window: Option<Arc<Window>>,
    input: InputState,
    clock: FrameClock,

    active: bool,
    minimized: bool,

    error: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<H> AppState<H>
where
    H: WindowHandler,
{
    fn new(config: RuntimeConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            window: None,
            input: InputState::default(),
            clock: FrameClock::default(),
            active: true,
            minimized: false,
            error: None,
            exit_requested: false,
        }
    }

    fn paused(&self) -> bool {
        !self.active || self.minimized
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        self.exit_requested = true;
        event_loop.exit();
    }

    fn sync_clock(&mut self) {
        if self.paused() {
            self.clock.stop();
        } else {
            self.clock.start();
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        self.handler
            .on_init(window.clone())
            .context("initialization failed")?;

        let size = window.inner_size();
        if size.width > 0 && size.height > 0 {
            self.handler.on_resize(size.width, size.height)?;
        }

        self.window = Some(window);
        self.clock.reset();
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            if !self.minimized {
                log::debug!("window minimized; pausing");
            }
            self.minimized = true;
            self.sync_clock();
            return Ok(());
        }

        if self.minimized {
            log::debug!("window restored; resuming");
        }
        self.minimized = false;
        self.sync_clock();
        self.handler.on_resize(size.width, size.height)
    }

    fn handle_input(&mut self, event: &WindowEvent) {
        let Some(ev) = translate_window_event(&self.input, event) else {
            return;
        };

        self.input.apply_event(&ev);

        match ev {
            InputEvent::Focused(active) => {
                self.active = active;
                self.sync_clock();
                self.handler.on_activate(active);
            }
            InputEvent::PointerMoved(p) => {
                self.handler
                    .on_mouse_move(self.input.mouse_buttons(), p.x, p.y);
            }
            InputEvent::PointerButton(b) => {
                let buttons = self.input.mouse_buttons();
                if let WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    ..
                } = event
                {
                    self.handler.on_mouse_down(buttons, b.x, b.y);
                } else {
                    self.handler.on_mouse_up(buttons, b.x, b.y);
                }
            }
            _ => {}
        }
    }

    fn run_frame(&mut self) -> Result<AppControl> {
        let ft = self.clock.tick();
        self.handler.on_frame(ft, &self.input)
    }
}

impl<H> ApplicationHandler for AppState<H>
where
    H: WindowHandler,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.create_window(event_loop) {
            self.fail(event_loop, e);
            return;
        }

        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.paused() {
            // Nothing to render; sleep until the next window event.
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        self.handle_input(&event);

        match &event {
            WindowEvent::CloseRequested => {
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if let Err(e) = self.handle_resize(*new_size) {
                    self.fail(event_loop, e);
                }
            }

            WindowEvent::Occluded(occluded) => {
                // Some platforms report minimize only through occlusion.
                self.minimized = *occluded;
                self.sync_clock();
            }

            WindowEvent::RedrawRequested => {
                if self.paused() {
                    return;
                }

                match self.run_frame() {
                    Ok(AppControl::Continue) => {}
                    Ok(AppControl::Exit) => {
                        self.exit_requested = true;
                        event_loop.exit();
                    }
                    Err(e) => self.fail(event_loop, e),
                }
            }

            _ => {}
        }
    }
}
