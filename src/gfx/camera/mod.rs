pub mod camera;
pub mod camera_controller;

pub use camera::{Camera, MAX_ZOOM, MIN_ZOOM, OPENGL_TO_WGPU_MATRIX};
pub use camera_controller::CameraController;
