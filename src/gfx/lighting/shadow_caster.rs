//! # Shadow Casters
//!
//! Each light owns one [`ShadowCaster`]: the projection and view it renders
//! its depth map with, the derived light-space matrices, and the depth
//! texture itself.
//!
//! | light       | projection   | light space          |
//! |-------------|--------------|----------------------|
//! | directional | orthographic | one matrix           |
//! | spot        | perspective  | one matrix           |
//! | point       | perspective  | six cube-face matrices |
//!
//! All projections include the wgpu depth correction. A zero-length light
//! direction produces an identity view instead of NaNs, and a direction
//! nearly parallel to world up swaps the look-at up vector for world Z.

use cgmath::{
    ortho, perspective, Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3,
};

use crate::error::ShadowError;
use crate::gfx::camera::OPENGL_TO_WGPU_MATRIX;
use crate::gfx::resources::texture_resource::{clamp_extent, MAX_TEXTURE_DIMENSION};
use crate::wgpu_utils::{BindGroupBuilder, BindGroupLayoutWithDesc};

/// Directions shorter than this are treated as "no direction".
pub const DEGENERATE_DIRECTION: f32 = 1e-6;
/// `|dir.y|` at or above this uses world Z as the look-at up vector.
pub const UP_PARALLEL_THRESHOLD: f32 = 0.99;
/// Extra degrees added around a spot cone so its edge is not clipped.
pub const SPOT_FOV_PADDING: f32 = 4.0;

const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 170.0;

pub const SHADOW_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Largest shadow map side; casters clamp requested resolutions to it.
pub const MAX_SHADOW_RESOLUTION: u32 = MAX_TEXTURE_DIMENSION;

/// Look direction and up vector of each cube face, in layer order
/// +X, -X, +Y, -Y, +Z, -Z.
pub fn cube_face_axes() -> [(Vector3<f32>, Vector3<f32>); 6] {
    [
        (Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, -1.0, 0.0)),
        (Vector3::new(-1.0, 0.0, 0.0), Vector3::new(0.0, -1.0, 0.0)),
        (Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0)),
        (Vector3::new(0.0, -1.0, 0.0), Vector3::new(0.0, 0.0, -1.0)),
        (Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.0, -1.0, 0.0)),
        (Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, -1.0, 0.0)),
    ]
}

/// Vertical field of view that encloses a spot cone with the given outer
/// cutoff cosine.
pub fn spot_cone_fov(outer_cutoff_cos: f32) -> Deg<f32> {
    let half_angle = outer_cutoff_cos.clamp(-1.0, 1.0).acos().to_degrees();
    Deg((2.0 * half_angle + SPOT_FOV_PADDING).clamp(MIN_FOV, MAX_FOV))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumPlanes {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl FrustumPlanes {
    pub fn new(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
        }
    }

    pub fn symmetric(half_width: f32, half_height: f32, near: f32, far: f32) -> Self {
        Self::new(-half_width, half_width, -half_height, half_height, near, far)
    }

    pub fn validate(&self) -> Result<(), ShadowError> {
        // Written so NaN fails every comparison
        let ordered = self.left < self.right && self.bottom < self.top && self.near < self.far;
        if ordered {
            Ok(())
        } else {
            Err(ShadowError::InvalidFrustum {
                left: self.left,
                right: self.right,
                bottom: self.bottom,
                top: self.top,
                near: self.near,
                far: self.far,
            })
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Distance from an orthographic caster's eye to the point it is
    /// centred on, placing that point halfway between near and far.
    ///
    /// Backing off by the full frustum depth instead would leave the focus
    /// on the far plane, clipping every caster behind it.
    pub fn eye_distance(&self) -> f32 {
        (self.near + self.far) * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Orthographic,
    Perspective,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightSpace {
    Single(Matrix4<f32>),
    Cube([Matrix4<f32>; 6]),
}

/// GPU depth target of one caster: one layer, or six for cube casters.
pub struct ShadowTarget {
    texture: wgpu::Texture,
    layer_views: Vec<wgpu::TextureView>,
    blit_sources: Vec<wgpu::BindGroup>,
}

impl ShadowTarget {
    fn new(
        device: &wgpu::Device,
        (width, height): (u32, u32),
        layers: u32,
        blit_layout: &BindGroupLayoutWithDesc,
    ) -> Self {
        let (width, height) = clamp_extent((width, height), device.limits().max_texture_dimension_2d);

        // A failed allocation costs this light its shadow, not the frame.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Caster Depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let layer_views: Vec<wgpu::TextureView> = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Caster Layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let blit_sources = layer_views
            .iter()
            .map(|view| {
                BindGroupBuilder::new(blit_layout)
                    .texture(view)
                    .create(device, "Shadow Blit Source")
            })
            .collect();
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!(
                "Shadow depth target {}x{} ({} layers) is incomplete: {}",
                width,
                height,
                layers,
                error
            );
        }

        Self {
            texture,
            layer_views,
            blit_sources,
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Depth attachment for `layer` (cube face index for point lights).
    pub fn layer_view(&self, layer: usize) -> Option<&wgpu::TextureView> {
        self.layer_views.get(layer)
    }

    /// Bind group exposing `layer` to the atlas blit pass.
    pub fn blit_source(&self, layer: usize) -> Option<&wgpu::BindGroup> {
        self.blit_sources.get(layer)
    }
}

pub struct ShadowCaster {
    resolution: (u32, u32),
    kind: ProjectionKind,
    cube: bool,
    planes: FrustumPlanes,
    fov: Deg<f32>,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    light_space: LightSpace,
    target: Option<ShadowTarget>,
}

impl ShadowCaster {
    pub fn new(
        resolution: (u32, u32),
        kind: ProjectionKind,
        planes: FrustumPlanes,
        fov: Deg<f32>,
    ) -> Result<Self, ShadowError> {
        planes.validate()?;
        Ok(Self::build(resolution, kind, false, planes, fov))
    }

    /// Orthographic caster covering a 40×40 area, 0.1 to 60 deep.
    pub fn directional(resolution: u32) -> Self {
        Self::build(
            (resolution, resolution),
            ProjectionKind::Orthographic,
            false,
            FrustumPlanes::symmetric(20.0, 20.0, 0.1, 60.0),
            Deg(90.0),
        )
    }

    pub fn spot(resolution: u32, outer_cutoff_cos: f32, range: f32) -> Self {
        Self::build(
            (resolution, resolution),
            ProjectionKind::Perspective,
            false,
            FrustumPlanes::symmetric(1.0, 1.0, 0.1, range.max(0.2)),
            spot_cone_fov(outer_cutoff_cos),
        )
    }

    /// Six-face caster with a 90° square frustum per face.
    pub fn point(resolution: u32, radius: f32) -> Self {
        Self::build(
            (resolution, resolution),
            ProjectionKind::Perspective,
            true,
            FrustumPlanes::symmetric(1.0, 1.0, 0.1, radius.max(0.2)),
            Deg(90.0),
        )
    }

    fn build(
        resolution: (u32, u32),
        kind: ProjectionKind,
        cube: bool,
        planes: FrustumPlanes,
        fov: Deg<f32>,
    ) -> Self {
        let mut caster = Self {
            resolution: clamp_extent(resolution, MAX_SHADOW_RESOLUTION),
            kind,
            cube,
            planes,
            fov,
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
            light_space: if cube {
                LightSpace::Cube([Matrix4::identity(); 6])
            } else {
                LightSpace::Single(Matrix4::identity())
            },
            target: None,
        };
        caster.update_projection();
        caster
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Changing the resolution releases the GPU target; it is recreated at
    /// the new size on next use. Sides are clamped to
    /// [`MAX_SHADOW_RESOLUTION`].
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let resolution = clamp_extent((width, height), MAX_SHADOW_RESOLUTION);
        if resolution != self.resolution {
            self.resolution = resolution;
            self.target = None;
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn is_cube(&self) -> bool {
        self.cube
    }

    pub fn layer_count(&self) -> u32 {
        if self.cube {
            6
        } else {
            1
        }
    }

    pub fn planes(&self) -> FrustumPlanes {
        self.planes
    }

    /// Commits `planes` only if they are ordered; otherwise nothing changes.
    pub fn set_frustum_planes(&mut self, planes: FrustumPlanes) -> Result<(), ShadowError> {
        if let Err(err) = planes.validate() {
            log::warn!("{}", err);
            return Err(err);
        }
        self.planes = planes;
        self.update_projection();
        Ok(())
    }

    /// Moves only near/far, keeping the side planes.
    pub fn set_depth_range(&mut self, near: f32, far: f32) -> Result<(), ShadowError> {
        let planes = FrustumPlanes {
            near,
            far,
            ..self.planes
        };
        if planes == self.planes {
            return Ok(());
        }
        self.set_frustum_planes(planes)
    }

    pub fn fov(&self) -> Deg<f32> {
        self.fov
    }

    /// Ignored by orthographic and cube casters.
    pub fn set_fov(&mut self, fov: Deg<f32>) {
        if self.kind != ProjectionKind::Perspective || self.cube {
            return;
        }
        let fov = Deg(fov.0.clamp(MIN_FOV, MAX_FOV));
        if fov != self.fov {
            self.fov = fov;
            self.update_projection();
        }
    }

    fn update_projection(&mut self) {
        let p = self.planes;
        self.projection = match self.kind {
            ProjectionKind::Orthographic => {
                OPENGL_TO_WGPU_MATRIX * ortho(p.left, p.right, p.bottom, p.top, p.near, p.far)
            }
            ProjectionKind::Perspective => {
                let (fov, aspect) = if self.cube {
                    (Deg(90.0), 1.0)
                } else {
                    (self.fov, p.width() / p.height())
                };
                OPENGL_TO_WGPU_MATRIX * perspective(fov, aspect, p.near, p.far)
            }
        };
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    /// View of the single-matrix casters; identity for cube casters.
    pub fn view(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn light_space(&self) -> &LightSpace {
        &self.light_space
    }

    /// The light-space matrix of a single-matrix caster, or face 0 of a cube.
    pub fn light_space_matrix(&self) -> Matrix4<f32> {
        match &self.light_space {
            LightSpace::Single(m) => *m,
            LightSpace::Cube(faces) => faces[0],
        }
    }

    pub fn face_matrices(&self) -> Option<&[Matrix4<f32>; 6]> {
        match &self.light_space {
            LightSpace::Cube(faces) => Some(faces),
            LightSpace::Single(_) => None,
        }
    }

    /// Recomputes view and light-space matrices.
    ///
    /// Orthographic casters look at `position` from behind along
    /// `direction`; perspective casters look from `position` along it.
    /// Cube casters ignore `direction`.
    pub fn update(&mut self, position: Vector3<f32>, direction: Vector3<f32>) {
        if self.cube {
            let eye = Point3::from_vec(position);
            let mut faces = [Matrix4::identity(); 6];
            for (face, (axis, up)) in faces.iter_mut().zip(cube_face_axes()) {
                *face = self.projection * Matrix4::look_at_rh(eye, eye + axis, up);
            }
            self.view = Matrix4::identity();
            self.light_space = LightSpace::Cube(faces);
            return;
        }

        self.view = if direction.magnitude() < DEGENERATE_DIRECTION {
            Matrix4::identity()
        } else {
            let dir = direction.normalize();
            let up = if dir.y.abs() >= UP_PARALLEL_THRESHOLD {
                Vector3::unit_z()
            } else {
                Vector3::unit_y()
            };
            let target = Point3::from_vec(position);
            match self.kind {
                ProjectionKind::Orthographic => {
                    let eye = target - dir * self.planes.eye_distance();
                    Matrix4::look_at_rh(eye, target, up)
                }
                ProjectionKind::Perspective => Matrix4::look_at_rh(target, target + dir, up),
            }
        };
        self.light_space = LightSpace::Single(self.projection * self.view);
    }

    pub fn target(&self) -> Option<&ShadowTarget> {
        self.target.as_ref()
    }

    /// Creates the depth texture on first use.
    pub fn ensure_target(
        &mut self,
        device: &wgpu::Device,
        blit_layout: &BindGroupLayoutWithDesc,
    ) -> &ShadowTarget {
        let (resolution, layers) = (self.resolution, self.layer_count());
        self.target
            .get_or_insert_with(|| ShadowTarget::new(device, resolution, layers, blit_layout))
    }

    pub fn release_target(&mut self) {
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Transform, Vector4};

    fn all_finite(m: &Matrix4<f32>) -> bool {
        let values: &[f32; 16] = m.as_ref();
        values.iter().all(|v| v.is_finite())
    }

    #[test]
    fn test_rejected_planes_leave_state_unchanged() {
        let mut caster = ShadowCaster::directional(1024);
        caster.update(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.3, -1.0, 0.2));
        let planes = caster.planes();
        let projection = caster.projection();
        let light_space = caster.light_space_matrix();

        let result = caster.set_frustum_planes(FrustumPlanes::new(5.0, -5.0, -5.0, 5.0, 0.1, 50.0));
        assert!(matches!(result, Err(ShadowError::InvalidFrustum { left, right, .. }) if left == 5.0 && right == -5.0));
        assert_eq!(caster.planes(), planes);
        assert_eq!(caster.projection(), projection);
        assert_eq!(caster.light_space_matrix(), light_space);

        assert!(caster
            .set_frustum_planes(FrustumPlanes::new(-5.0, 5.0, 5.0, -5.0, 0.1, 50.0))
            .is_err());
        assert!(caster
            .set_frustum_planes(FrustumPlanes::new(-5.0, 5.0, -5.0, 5.0, 50.0, 50.0))
            .is_err());
        assert!(caster
            .set_frustum_planes(FrustumPlanes::new(f32::NAN, 5.0, -5.0, 5.0, 0.1, 50.0))
            .is_err());
        assert_eq!(caster.planes(), planes);
    }

    #[test]
    fn test_accepted_planes_update_projection() {
        let mut caster = ShadowCaster::directional(1024);
        let before = caster.projection();
        caster
            .set_frustum_planes(FrustumPlanes::symmetric(5.0, 5.0, 0.5, 20.0))
            .unwrap();
        assert_ne!(caster.projection(), before);
        assert_eq!(caster.planes().right, 5.0);
    }

    #[test]
    fn test_constructor_validates_planes() {
        let result = ShadowCaster::new(
            (512, 512),
            ProjectionKind::Orthographic,
            FrustumPlanes::new(-1.0, 1.0, -1.0, 1.0, 10.0, 1.0),
            Deg(45.0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_degenerate_direction_gives_identity_view() {
        let mut caster = ShadowCaster::directional(1024);
        caster.update(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(caster.view(), Matrix4::identity());
        assert!(all_finite(&caster.light_space_matrix()));
    }

    #[test]
    fn test_vertical_direction_uses_fallback_up() {
        let mut caster = ShadowCaster::directional(1024);
        caster.update(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        assert!(all_finite(&caster.view()));
        assert!(all_finite(&caster.light_space_matrix()));

        let mut spot = ShadowCaster::spot(512, 0.9, 20.0);
        spot.update(Vector3::new(0.0, 5.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        assert!(all_finite(&spot.light_space_matrix()));
    }

    #[test]
    fn test_orthographic_focus_sits_mid_depth() {
        let mut caster = ShadowCaster::directional(1024);
        let focus = Vector3::new(2.0, 0.0, -3.0);
        caster.update(focus, Vector3::new(0.0, -1.0, -1.0));

        let view_space = caster.view() * focus.extend(1.0);
        let expected = -caster.planes().eye_distance();
        assert_relative_eq!(view_space.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(view_space.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(view_space.z, expected, epsilon = 1e-3);

        // Lands in the middle of the wgpu depth range
        let clip = caster.light_space_matrix() * focus.extend(1.0);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_spot_fov_covers_cone() {
        for outer_deg in [5.0f32, 20.0, 45.0, 60.0] {
            let fov = spot_cone_fov(outer_deg.to_radians().cos());
            assert!(fov.0 * 0.5 >= outer_deg);
        }
        // Cone wider than a hemisphere is capped
        assert_eq!(spot_cone_fov(-0.5).0, MAX_FOV);
    }

    #[test]
    fn test_spot_light_space_centres_its_axis() {
        let mut caster = ShadowCaster::spot(512, 0.8, 30.0);
        let position = Vector3::new(1.0, 4.0, 0.0);
        let direction = Vector3::new(1.0, -1.0, 0.0).normalize();
        caster.update(position, direction);

        let clip = caster.light_space_matrix() * (position + direction * 5.0).extend(1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cube_faces_look_along_cardinal_axes() {
        let mut caster = ShadowCaster::point(256, 25.0);
        let position = Vector3::new(3.0, -2.0, 1.0);
        caster.update(position, Vector3::new(0.0, 0.0, 0.0));

        let faces = caster.face_matrices().unwrap();
        let expected_axes = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        for (face, (matrix, axis)) in faces.iter().zip(expected_axes).enumerate() {
            // A point along the face axis projects to the centre of that face
            let clip = *matrix * (position + axis * 5.0).extend(1.0);
            assert!(clip.w > 0.0, "face {} looks the wrong way", face);
            assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-4);
            assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-4);

            // And the opposite point is behind the face
            let behind = *matrix * (position - axis * 5.0).extend(1.0);
            assert!(behind.w < 0.0);
        }
    }

    #[test]
    fn test_cube_face_up_vectors() {
        let mut caster = ShadowCaster::point(256, 25.0);
        caster.update(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0));
        let faces = caster.face_matrices().unwrap();

        for (matrix, (axis, up)) in faces.iter().zip(cube_face_axes()) {
            // A point above the axis in the face's up direction maps to +y in NDC
            let p = axis * 5.0 + up;
            let clip: Vector4<f32> = *matrix * p.extend(1.0);
            assert!(clip.y / clip.w > 0.0);
        }
        let p = faces[0].transform_point(Point3::new(5.0, 0.0, 0.0));
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn test_depth_range_tracks_point_radius() {
        let mut caster = ShadowCaster::point(256, 10.0);
        caster.set_depth_range(0.1, 40.0).unwrap();
        assert_eq!(caster.planes().far, 40.0);
        assert!(caster.set_depth_range(5.0, 1.0).is_err());
        assert_eq!(caster.planes().far, 40.0);
    }

    #[test]
    fn test_resolution_is_clamped_to_texture_limit() {
        let max = MAX_SHADOW_RESOLUTION;
        assert_eq!(ShadowCaster::directional(8192).resolution(), (max, max));
        assert_eq!(ShadowCaster::point(max * 4, 10.0).resolution(), (max, max));
        assert_eq!(ShadowCaster::spot(0, 0.9, 10.0).resolution(), (1, 1));

        let mut caster = ShadowCaster::spot(1024, 0.9, 10.0);
        caster.set_resolution(8192, 512);
        assert_eq!(caster.resolution(), (max, 512));
    }
}
