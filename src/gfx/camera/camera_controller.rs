use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::camera::Camera;

/// Cursor travel in pixels below which a left press/release counts as a click.
const CLICK_DRAG_THRESHOLD: f64 = 4.0;

/// A left click that should be resolved by picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRequest {
    pub position: (f32, f32),
    pub multi_select: bool,
}

/// Fly-camera input state driven by winit events.
///
/// Right drag rotates, WASD moves in the view plane, Q/E move down/up and the
/// wheel narrows or widens the field of view.
pub struct CameraController {
    pub rotate_speed: f32,
    pub move_speed: f32,
    pub zoom_speed: f32,
    is_rotating: bool,
    is_shift_held: bool,
    forward: f32,
    backward: f32,
    left: f32,
    right: f32,
    up: f32,
    down: f32,
    pending_rotation: (f32, f32),
    pending_zoom: f32,
    cursor: PhysicalPosition<f64>,
    left_press: Option<PhysicalPosition<f64>>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(0.15, 5.0, 2.0)
    }
}

impl CameraController {
    pub fn new(rotate_speed: f32, move_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            move_speed,
            zoom_speed,
            is_rotating: false,
            is_shift_held: false,
            forward: 0.0,
            backward: 0.0,
            left: 0.0,
            right: 0.0,
            up: 0.0,
            down: 0.0,
            pending_rotation: (0.0, 0.0),
            pending_zoom: 0.0,
            cursor: PhysicalPosition::new(0.0, 0.0),
            left_press: None,
        }
    }

    /// Returns a pick request when the event completes a left click.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> Option<PickRequest> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.on_key(code, event.state == ElementState::Pressed);
                }
                None
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.is_shift_held = modifiers.state().shift_key();
                None
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = *position;
                None
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.on_mouse_button(*button, *state == ElementState::Pressed)
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 40.0,
                };
                self.on_scroll(lines);
                None
            }
            _ => None,
        }
    }

    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.on_mouse_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    pub fn on_key(&mut self, code: KeyCode, pressed: bool) {
        let amount = if pressed { 1.0 } else { 0.0 };
        match code {
            KeyCode::KeyW => self.forward = amount,
            KeyCode::KeyS => self.backward = amount,
            KeyCode::KeyA => self.left = amount,
            KeyCode::KeyD => self.right = amount,
            KeyCode::KeyE => self.up = amount,
            KeyCode::KeyQ => self.down = amount,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => self.is_shift_held = pressed,
            _ => {}
        }
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, pressed: bool) -> Option<PickRequest> {
        match button {
            MouseButton::Right => {
                self.is_rotating = pressed;
                None
            }
            MouseButton::Left if pressed => {
                self.left_press = Some(self.cursor);
                None
            }
            MouseButton::Left => {
                let start = self.left_press.take()?;
                let dx = self.cursor.x - start.x;
                let dy = self.cursor.y - start.y;
                if (dx * dx + dy * dy).sqrt() > CLICK_DRAG_THRESHOLD {
                    return None;
                }
                Some(PickRequest {
                    position: (self.cursor.x as f32, self.cursor.y as f32),
                    multi_select: self.is_shift_held,
                })
            }
            _ => None,
        }
    }

    pub fn on_cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor = PhysicalPosition::new(x, y);
    }

    pub fn on_mouse_motion(&mut self, dx: f32, dy: f32) {
        if self.is_rotating {
            self.pending_rotation.0 += dx;
            self.pending_rotation.1 += dy;
        }
    }

    pub fn on_scroll(&mut self, lines: f32) {
        self.pending_zoom += lines;
    }

    /// Drops held keys and drags, e.g. when the window loses focus.
    pub fn reset(&mut self) {
        self.forward = 0.0;
        self.backward = 0.0;
        self.left = 0.0;
        self.right = 0.0;
        self.up = 0.0;
        self.down = 0.0;
        self.is_rotating = false;
        self.left_press = None;
        self.pending_rotation = (0.0, 0.0);
        self.pending_zoom = 0.0;
    }

    pub fn is_rotating(&self) -> bool {
        self.is_rotating
    }

    pub fn multi_select_held(&self) -> bool {
        self.is_shift_held
    }

    /// Applies accumulated input to the camera.
    pub fn update_camera(&mut self, camera: &mut Camera, dt: f32) {
        let (dx, dy) = std::mem::take(&mut self.pending_rotation);
        if dx != 0.0 || dy != 0.0 {
            camera.rotate(dx * self.rotate_speed, -dy * self.rotate_speed);
            camera.refresh();
        }

        let zoom = std::mem::take(&mut self.pending_zoom);
        if zoom != 0.0 {
            camera.set_zoom(camera.zoom() - zoom * self.zoom_speed);
        }

        let step = self.move_speed * dt;
        let offset = camera.front() * (self.forward - self.backward) * step
            + camera.right() * (self.right - self.left) * step
            + cgmath::Vector3::unit_y() * (self.up - self.down) * step;
        if offset != cgmath::Vector3::new(0.0, 0.0, 0.0) {
            camera.translate(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    #[test]
    fn test_click_without_drag_requests_pick() {
        let mut controller = CameraController::default();
        controller.on_cursor_moved(100.0, 50.0);
        assert!(controller.on_mouse_button(MouseButton::Left, true).is_none());
        controller.on_cursor_moved(101.0, 51.0);

        let request = controller.on_mouse_button(MouseButton::Left, false).unwrap();
        assert_eq!(request.position, (101.0, 51.0));
        assert!(!request.multi_select);
    }

    #[test]
    fn test_drag_does_not_pick() {
        let mut controller = CameraController::default();
        controller.on_cursor_moved(100.0, 50.0);
        controller.on_mouse_button(MouseButton::Left, true);
        controller.on_cursor_moved(200.0, 50.0);
        assert!(controller.on_mouse_button(MouseButton::Left, false).is_none());
    }

    #[test]
    fn test_shift_sets_multi_select() {
        let mut controller = CameraController::default();
        controller.on_key(KeyCode::ShiftLeft, true);
        controller.on_mouse_button(MouseButton::Left, true);
        let request = controller.on_mouse_button(MouseButton::Left, false).unwrap();
        assert!(request.multi_select);
    }

    #[test]
    fn test_motion_only_rotates_while_right_held() {
        let mut controller = CameraController::default();
        let mut camera = Camera::new(Point3::new(0.0, 0.0, 0.0), -90.0, 0.0, 1.0);

        controller.on_mouse_motion(100.0, 0.0);
        controller.update_camera(&mut camera, 0.016);
        assert_eq!(camera.yaw(), -90.0);

        controller.on_mouse_button(MouseButton::Right, true);
        controller.on_mouse_motion(100.0, 0.0);
        controller.update_camera(&mut camera, 0.016);
        assert!((camera.yaw() - (-75.0)).abs() < 1e-4);
    }

    #[test]
    fn test_forward_key_moves_along_front() {
        let mut controller = CameraController::default();
        let mut camera = Camera::new(Point3::new(0.0, 0.0, 0.0), -90.0, 0.0, 1.0);
        controller.on_key(KeyCode::KeyW, true);
        controller.update_camera(&mut camera, 1.0);
        assert!((camera.position().z + 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_scroll_zooms_within_limits() {
        let mut controller = CameraController::default();
        let mut camera = Camera::default();
        controller.on_scroll(100.0);
        controller.update_camera(&mut camera, 0.0);
        assert_eq!(camera.zoom(), crate::gfx::camera::MIN_ZOOM);
    }
}
