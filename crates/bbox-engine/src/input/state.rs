use std::collections::HashSet;

use super::types::{
    InputEvent, Key, KeyState, Modifiers, MouseButton, MouseButtonState, MouseButtons,
    PointerButtonEvent, PointerMoveEvent,
};

/// Current input state for the window.
///
/// Holds "is down" information and the last pointer position. The frame
/// handler reads it during `update`; nothing else mutates it.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,

    pub focused: bool,

    /// Pointer position in physical pixels.
    pub pointer_pos: Option<(i32, i32)>,

    pub keys_down: HashSet<Key>,

    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Folds a platform-agnostic input event into the state.
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
            }

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Releases are not delivered while unfocused.
                    self.clear_held();
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.pointer_pos = Some((*x, *y));
            }

            InputEvent::Key { key, state, .. } => match state {
                KeyState::Pressed => {
                    self.keys_down.insert(*key);
                }
                KeyState::Released => {
                    self.keys_down.remove(key);
                }
            },

            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state,
                x,
                y,
            }) => {
                self.pointer_pos = Some((*x, *y));
                match state {
                    MouseButtonState::Pressed => {
                        self.buttons_down.insert(*button);
                    }
                    MouseButtonState::Released => {
                        self.buttons_down.remove(button);
                    }
                }
            }
        }
    }

    /// Drops every held key and button.
    pub fn clear_held(&mut self) {
        self.keys_down.clear();
        self.buttons_down.clear();
        self.modifiers = Modifiers::default();
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }

    pub fn mouse_buttons(&self) -> MouseButtons {
        MouseButtons {
            left: self.button_down(MouseButton::Left),
            right: self.button_down(MouseButton::Right),
            middle: self.button_down(MouseButton::Middle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, state: KeyState) -> InputEvent {
        InputEvent::Key {
            key,
            state,
            repeat: false,
        }
    }

    #[test]
    fn press_and_release_track_held_keys() {
        let mut s = InputState::default();
        s.apply_event(&key(Key::W, KeyState::Pressed));
        s.apply_event(&key(Key::Shift, KeyState::Pressed));
        assert!(s.key_down(Key::W));
        assert!(s.key_down(Key::Shift));

        s.apply_event(&key(Key::W, KeyState::Released));
        assert!(!s.key_down(Key::W));
        assert!(s.key_down(Key::Shift));
    }

    #[test]
    fn focus_loss_clears_held_keys_and_buttons() {
        let mut s = InputState::default();
        s.apply_event(&InputEvent::Focused(true));
        s.apply_event(&key(Key::A, KeyState::Pressed));
        s.apply_event(&InputEvent::PointerButton(PointerButtonEvent {
            button: MouseButton::Right,
            state: MouseButtonState::Pressed,
            x: 3,
            y: 4,
        }));
        assert!(s.mouse_buttons().right);

        s.apply_event(&InputEvent::Focused(false));
        assert!(!s.focused);
        assert!(s.keys_down.is_empty());
        assert!(!s.mouse_buttons().any());
    }

    #[test]
    fn button_events_update_pointer_position() {
        let mut s = InputState::default();
        s.apply_event(&InputEvent::PointerButton(PointerButtonEvent {
            button: MouseButton::Left,
            state: MouseButtonState::Pressed,
            x: 10,
            y: 20,
        }));
        assert_eq!(s.pointer_pos, Some((10, 20)));
        assert!(s.mouse_buttons().left);
    }
}
