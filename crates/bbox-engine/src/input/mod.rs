//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The runtime translates platform events into `InputEvent`s, folds them into
//! an explicit `InputState`, and hands that state to the frame handler.

pub(crate) mod platform;
mod state;
mod types;

pub use state::InputState;
pub use types::{
    InputEvent, Key, KeyState, Modifiers, MouseButton, MouseButtonState, MouseButtons,
    PointerButtonEvent, PointerMoveEvent,
};
