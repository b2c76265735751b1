use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::input::{InputState, Key, MouseButtons};
use crate::math::{Mat4, Vec3};

/// Pitch stops this far short of straight up/down.
const PITCH_MARGIN: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Units per second.
    pub move_speed: f32,
    /// Speed multiplier while Shift is held.
    pub fast_multiplier: f32,
    /// Radians per pixel of mouse travel.
    pub mouse_sensitivity: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 2.0, -5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            move_speed: 3.0,
            fast_multiplier: 3.0,
            mouse_sensitivity: 0.0025,
            fov_y: FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Fly camera: WASD + Space/Control movement, right-button mouse look.
#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    position: Vec3,
    target: Vec3,
    yaw: f32,
    pitch: f32,
    looking: bool,
    last_mouse: (i32, i32),
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        // Seed yaw/pitch from the configured view direction so the first
        // mouse-look step continues from it.
        let dir = (config.target - config.position).normalize_or_zero();
        let pitch = dir.y.clamp(-1.0, 1.0).asin();
        let yaw = dir.x.atan2(dir.z);

        Self {
            position: config.position,
            target: config.target,
            yaw,
            pitch: clamp_pitch(pitch),
            looking: false,
            last_mouse: (0, 0),
            config,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn on_mouse_down(&mut self, buttons: MouseButtons, x: i32, y: i32) {
        if buttons.right {
            self.looking = true;
            self.last_mouse = (x, y);
        }
    }

    pub fn on_mouse_up(&mut self, buttons: MouseButtons, _x: i32, _y: i32) {
        if !buttons.right {
            self.looking = false;
        }
    }

    pub fn on_mouse_move(&mut self, _buttons: MouseButtons, x: i32, y: i32) {
        let (lx, ly) = self.last_mouse;
        self.last_mouse = (x, y);
        if !self.looking {
            return;
        }

        let sens = self.config.mouse_sensitivity;
        self.yaw += (x - lx) as f32 * sens;
        self.pitch = clamp_pitch(self.pitch - (y - ly) as f32 * sens);
        self.target = self.position + forward(self.yaw, self.pitch);
    }

    /// Stops mouse look, e.g. when the window loses focus.
    pub fn cancel_look(&mut self) {
        self.looking = false;
    }

    /// Applies keyboard movement for `dt` seconds. Position and target move together.
    pub fn update(&mut self, dt: f32, input: &InputState) {
        let up = self.config.up.normalize_or_zero();
        let fwd = (self.target - self.position).normalize_or_zero();
        let right = up.cross(fwd).normalize_or_zero();

        let mut dir = Vec3::ZERO;
        if input.key_down(Key::W) {
            dir += fwd;
        }
        if input.key_down(Key::S) {
            dir -= fwd;
        }
        if input.key_down(Key::D) {
            dir += right;
        }
        if input.key_down(Key::A) {
            dir -= right;
        }
        if input.key_down(Key::Space) {
            dir += up;
        }
        if input.key_down(Key::Control) {
            dir -= up;
        }

        if dir == Vec3::ZERO {
            return;
        }

        let mut speed = self.config.move_speed;
        if input.key_down(Key::Shift) {
            speed *= self.config.fast_multiplier;
        }
        let step = dir.normalize_or_zero() * (speed * dt);
        self.position += step;
        self.target += step;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.position, self.target, self.config.up.normalize_or_zero())
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_fov_lh(self.config.fov_y, aspect, self.config.near, self.config.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }
}

fn clamp_pitch(pitch: f32) -> f32 {
    let limit = FRAC_PI_2 - PITCH_MARGIN;
    pitch.clamp(-limit, limit)
}

fn forward(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(pitch.cos() * yaw.sin(), pitch.sin(), pitch.cos() * yaw.cos()).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputEvent, KeyState};
    use approx::assert_relative_eq;

    fn right_button() -> MouseButtons {
        MouseButtons {
            right: true,
            ..Default::default()
        }
    }

    fn press(input: &mut InputState, key: Key) {
        input.apply_event(&InputEvent::Key {
            key,
            state: KeyState::Pressed,
            repeat: false,
        });
    }

    #[test]
    fn initial_angles_match_initial_direction() {
        let cam = CameraController::new(CameraConfig::default());
        let dir = (cam.target() - cam.position()).normalize_or_zero();
        let f = forward(cam.yaw(), cam.pitch());
        assert_relative_eq!(f.x, dir.x, epsilon = 1e-5);
        assert_relative_eq!(f.y, dir.y, epsilon = 1e-5);
        assert_relative_eq!(f.z, dir.z, epsilon = 1e-5);
    }

    #[test]
    fn forward_moves_position_and_target() {
        let mut cam = CameraController::new(CameraConfig {
            position: Vec3::ZERO,
            target: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        });
        let mut input = InputState::default();
        press(&mut input, Key::W);

        cam.update(0.5, &input);
        assert_relative_eq!(cam.position().z, 1.5);
        assert_relative_eq!(cam.target().z, 2.5);

        press(&mut input, Key::Shift);
        cam.update(0.5, &input);
        assert_relative_eq!(cam.position().z, 6.0);
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut cam = CameraController::new(CameraConfig {
            position: Vec3::ZERO,
            target: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        });
        let mut input = InputState::default();
        press(&mut input, Key::W);
        press(&mut input, Key::D);

        cam.update(1.0, &input);
        assert_relative_eq!(cam.position().length(), 3.0, epsilon = 1e-5);
        // Left-handed: right of +Z with +Y up is +X.
        assert!(cam.position().x > 0.0);
    }

    #[test]
    fn mouse_look_needs_right_button_and_clamps_pitch() {
        let mut cam = CameraController::new(CameraConfig::default());
        let yaw0 = cam.yaw();

        cam.on_mouse_move(MouseButtons::default(), 100, 100);
        assert_eq!(cam.yaw(), yaw0);

        cam.on_mouse_down(right_button(), 100, 100);
        cam.on_mouse_move(right_button(), 140, 100);
        assert_relative_eq!(cam.yaw(), yaw0 + 40.0 * 0.0025, epsilon = 1e-6);

        cam.on_mouse_move(right_button(), 140, -100_000);
        assert_relative_eq!(cam.pitch(), FRAC_PI_2 - PITCH_MARGIN);

        let dir = cam.target() - cam.position();
        assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-5);

        cam.on_mouse_up(MouseButtons::default(), 140, 0);
        assert!(!cam.is_looking());
    }

    #[test]
    fn view_proj_puts_target_in_front() {
        let cam = CameraController::new(CameraConfig::default());
        let clip = cam.view_proj(16.0 / 9.0).transform_point(cam.target());
        let (x, y, z) = (clip[0] / clip[3], clip[1] / clip[3], clip[2] / clip[3]);
        assert!(clip[3] > 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(y, 0.0, epsilon = 1e-5);
        assert!((0.0..1.0).contains(&z));
    }
}
