//! Fly camera with a lazily refreshed frustum.

use cgmath::{
    perspective, Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3,
};

use crate::gfx::geometry::Frustum;
use crate::gfx::resources::frame_uniforms::{matrix_to_array, CameraUniform};

/// Maps OpenGL clip depth `[-1, 1]` to the `[0, 1]` range wgpu expects.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Narrowest vertical field of view in degrees.
pub const MIN_ZOOM: f32 = 20.0;
/// Widest vertical field of view in degrees.
pub const MAX_ZOOM: f32 = 75.0;
const MAX_PITCH: f32 = 89.0;

#[derive(Debug, Clone)]
pub struct Camera {
    position: Point3<f32>,
    /// Degrees around world Y; -90 looks down -Z.
    yaw: f32,
    pitch: f32,
    /// Vertical field of view in degrees.
    zoom: f32,
    near: f32,
    far: f32,
    aspect: f32,
    world_up: Vector3<f32>,

    front: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    frustum: Frustum,
    dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Point3::new(0.0, 2.0, 8.0), -90.0, -10.0, 16.0 / 9.0)
    }
}

impl Camera {
    pub fn new(position: Point3<f32>, yaw: f32, pitch: f32, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
            zoom: 45.0,
            near: 0.1,
            far: 200.0,
            aspect: aspect.max(f32::EPSILON),
            world_up: Vector3::unit_y(),
            front: -Vector3::unit_z(),
            right: Vector3::unit_x(),
            up: Vector3::unit_y(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            frustum: Frustum::from_view_projection(&Matrix4::identity()),
            dirty: true,
        };
        camera.refresh();
        camera
    }

    /// Recomputes the basis, matrices and frustum if anything changed since
    /// the last call. Cached values are stale until this runs.
    pub fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();
        self.front = Vector3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();

        self.view = Matrix4::look_to_rh(self.position, self.front, self.up);
        self.projection = OPENGL_TO_WGPU_MATRIX
            * perspective(Deg(self.zoom), self.aspect, self.near, self.far);
        self.frustum = Frustum::from_view_projection(&(self.projection * self.view));
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.dirty = true;
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.set_position(self.position + offset);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Adds to yaw and pitch; pitch stays within ±89°.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = (self.yaw + yaw_delta) % 360.0;
        self.pitch = (self.pitch + pitch_delta).clamp(-MAX_PITCH, MAX_PITCH);
        self.dirty = true;
    }

    /// Points the camera at `target` from its current position.
    pub fn look_at(&mut self, target: Point3<f32>) {
        let direction = target - self.position;
        if direction.magnitude2() < f32::EPSILON {
            return;
        }
        let direction = direction.normalize();
        self.pitch = direction.y.asin().to_degrees().clamp(-MAX_PITCH, MAX_PITCH);
        self.yaw = direction.z.atan2(direction.x).to_degrees();
        self.dirty = true;
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, degrees: f32) {
        self.zoom = degrees.clamp(MIN_ZOOM, MAX_ZOOM);
        self.dirty = true;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 && aspect != self.aspect {
            self.aspect = aspect;
            self.dirty = true;
        }
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Ignored unless `0 < near < far`.
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        if near > 0.0 && far > near {
            self.near = near;
            self.far = far;
            self.dirty = true;
        } else {
            log::warn!("rejected camera clip planes near {} far {}", near, far);
        }
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    /// Projection including the wgpu depth correction.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn to_uniform(&self) -> CameraUniform {
        let view_proj = self.view_projection();
        let inverse = view_proj.invert().unwrap_or_else(Matrix4::identity);
        CameraUniform {
            view_proj: matrix_to_array(view_proj),
            view: matrix_to_array(self.view),
            projection: matrix_to_array(self.projection),
            inverse_view_proj: matrix_to_array(inverse),
            position: self.position.to_homogeneous().into(),
            params: [self.near, self.far, self.zoom.to_radians(), self.aspect],
        }
    }

    pub fn position_vector(&self) -> Vector3<f32> {
        self.position.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: Vector3<f32>, b: Vector3<f32>) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::default();
        camera.set_zoom(5.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);
        camera.set_zoom(120.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(0.0, 500.0);
        assert_eq!(camera.pitch(), 89.0);
        camera.rotate(0.0, -500.0);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn test_default_yaw_looks_down_negative_z() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 0.0), -90.0, 0.0, 1.0);
        assert_vec_eq(camera.front(), Vector3::new(0.0, 0.0, -1.0));
        assert_vec_eq(camera.right(), Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_frustum_refreshes_lazily() {
        let mut camera = Camera::new(Point3::new(0.0, 0.0, 0.0), -90.0, 0.0, 1.0);
        let ahead = Vector3::new(0.0, 0.0, -10.0);
        let behind = Vector3::new(0.0, 0.0, 10.0);
        assert!(camera.frustum().contains_point(ahead));

        camera.rotate(180.0, 0.0);
        assert!(camera.is_dirty());
        // Cached frustum still describes the old orientation
        assert!(camera.frustum().contains_point(ahead));

        camera.refresh();
        assert!(!camera.is_dirty());
        assert!(camera.frustum().contains_point(behind));
        assert!(!camera.frustum().contains_point(ahead));
    }

    #[test]
    fn test_look_at_faces_target() {
        let mut camera = Camera::new(Point3::new(0.0, 0.0, 5.0), 0.0, 0.0, 1.0);
        camera.look_at(Point3::new(0.0, 0.0, 0.0));
        camera.refresh();
        assert_vec_eq(camera.front(), Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_invalid_clip_planes_are_ignored() {
        let mut camera = Camera::default();
        camera.set_clip_planes(10.0, 1.0);
        assert_eq!(camera.near(), 0.1);
        assert_eq!(camera.far(), 200.0);
    }
}
