use std::fmt;

/// Keyboard key identifier.
///
/// Only the keys the viewer reacts to get their own variant; everything else
/// maps to `Key::Unknown` with the platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Space,

    Shift,
    Control,
    Alt,

    W,
    A,
    S,
    D,
    Q,
    E,

    /// Platform-dependent key not represented here.
    Unknown(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButtonState {
    Pressed,
    Released,
}

/// Snapshot of the held mouse buttons, delivered with every pointer callback.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseButtons {
    pub fn any(&self) -> bool {
        self.left || self.right || self.middle
    }
}

/// Modifier keys state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// Pointer move event in physical pixels, client-area relative.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PointerMoveEvent {
    pub x: i32,
    pub y: i32,
}

/// Pointer button event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PointerButtonEvent {
    pub button: MouseButton,
    pub state: MouseButtonState,
    pub x: i32,
    pub y: i32,
}

/// Platform-agnostic input events emitted by the runtime.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),

    Key {
        key: Key,
        state: KeyState,
        /// True when the event is a key-repeat.
        repeat: bool,
    },

    PointerMoved(PointerMoveEvent),
    PointerButton(PointerButtonEvent),

    /// Window focus change.
    Focused(bool),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
