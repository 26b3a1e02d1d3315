use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use cgmath::{Rad, Vector3};
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::view_camera::Camera;

/// Fly-camera input
///
/// Keys move the camera at a speed proportional to how long they have been
/// held, so a tap nudges and a long press accelerates.
pub struct CameraController {
    pub key_speed: f32,
    pub mouse_speed: f32,
    pressed: HashMap<KeyCode, Instant>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(0.01, 0.001)
    }
}

impl CameraController {
    pub fn new(key_speed: f32, mouse_speed: f32) -> Self {
        Self {
            key_speed,
            mouse_speed,
            pressed: HashMap::new(),
        }
    }

    /// Mouse motion turns the view.
    pub fn process_events(&mut self, event: &DeviceEvent, camera: &mut Camera) -> bool {
        match event {
            DeviceEvent::MouseMotion { delta } => {
                let offset = camera.right() * (delta.0 as f32 * self.mouse_speed)
                    + camera.up() * (-delta.1 as f32 * self.mouse_speed);
                *camera = camera.look_toward(offset);
                true
            }
            _ => false,
        }
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match event.state {
            ElementState::Pressed => {
                // Key repeat must not restart the hold timer.
                self.pressed.entry(code).or_insert_with(Instant::now);
            }
            ElementState::Released => {
                self.pressed.remove(&code);
            }
        }
    }

    pub fn is_moving(&self) -> bool {
        !self.pressed.is_empty()
    }

    /// Applies held keys to `camera`.
    pub fn update(&self, camera: &mut Camera, now: Instant) {
        for (&code, &since) in &self.pressed {
            let step = self.key_speed * now.saturating_duration_since(since).as_secs_f32();
            *camera = apply_key(*camera, code, step);
        }
    }

    pub fn held_for(&self, code: KeyCode, now: Instant) -> Option<Duration> {
        self.pressed
            .get(&code)
            .map(|since| now.saturating_duration_since(*since))
    }
}

fn apply_key(camera: Camera, code: KeyCode, step: f32) -> Camera {
    let along = |axis: Vector3<f32>| camera.move_by(axis * step);
    match code {
        KeyCode::KeyW => along(camera.facing()),
        KeyCode::KeyS => along(-camera.facing()),
        KeyCode::KeyA => along(-camera.right()),
        KeyCode::KeyD => along(camera.right()),
        KeyCode::Space => along(camera.up()),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => along(-camera.up()),
        KeyCode::KeyQ => camera.rotate(Rad(-step)),
        KeyCode::KeyE => camera.rotate(Rad(step)),
        _ => camera,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_move_along_camera_axes() {
        let camera = Camera::default();
        assert_eq!(apply_key(camera, KeyCode::KeyW, 2.0).center(), Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(apply_key(camera, KeyCode::KeyD, 1.0).center(), camera.right());
        assert_eq!(apply_key(camera, KeyCode::Space, 1.0).center(), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(apply_key(camera, KeyCode::KeyZ, 1.0), camera);
    }

    #[test]
    fn test_roll_keeps_facing() {
        let camera = apply_key(Camera::default(), KeyCode::KeyE, 0.5);
        assert_eq!(camera.facing(), Vector3::unit_z());
        assert!(camera.up() != Vector3::unit_y());
    }
}
