use cgmath::{InnerSpace, Vector3, Zero};

use super::shadow_caster::{spot_cone_fov, ShadowCaster};

/// Smallest radius or range a light may have; keeps the shadow far plane
/// strictly past its near plane.
pub const MIN_LIGHT_EXTENT: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

impl LightType {
    pub const ALL: [LightType; 3] = [LightType::Directional, LightType::Point, LightType::Spot];

    pub fn label(self) -> &'static str {
        match self {
            LightType::Directional => "Directional",
            LightType::Point => "Point",
            LightType::Spot => "Spot",
        }
    }
}

/// Offsets applied when comparing against the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowBias {
    /// World-space push along the surface normal.
    pub normal_offset: f32,
    /// Constant subtracted from the compared depth.
    pub depth: f32,
}

impl Default for ShadowBias {
    fn default() -> Self {
        Self {
            normal_offset: 0.02,
            depth: 0.005,
        }
    }
}

/// Geometric parameters per light type. Spot cutoffs are stored as cosines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional {
        direction: Vector3<f32>,
    },
    Point {
        position: Vector3<f32>,
        radius: f32,
    },
    Spot {
        position: Vector3<f32>,
        direction: Vector3<f32>,
        range: f32,
        cut_off: f32,
        outer_cut_off: f32,
    },
}

impl LightKind {
    pub fn light_type(&self) -> LightType {
        match self {
            LightKind::Directional { .. } => LightType::Directional,
            LightKind::Point { .. } => LightType::Point,
            LightKind::Spot { .. } => LightType::Spot,
        }
    }

    pub fn position(&self) -> Option<Vector3<f32>> {
        match *self {
            LightKind::Directional { .. } => None,
            LightKind::Point { position, .. } | LightKind::Spot { position, .. } => Some(position),
        }
    }

    pub fn direction(&self) -> Option<Vector3<f32>> {
        match *self {
            LightKind::Point { .. } => None,
            LightKind::Directional { direction } | LightKind::Spot { direction, .. } => {
                Some(direction)
            }
        }
    }
}

fn normalized_or_down(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.magnitude2() > 0.0 {
        direction.normalize()
    } else {
        -Vector3::unit_y()
    }
}

/// Returns `(cos inner, cos outer)` with the inner angle no wider than the outer.
fn cutoff_cosines(inner_deg: f32, outer_deg: f32) -> (f32, f32) {
    let outer = outer_deg.clamp(0.5, 85.0);
    let inner = inner_deg.clamp(0.0, outer);
    (inner.to_radians().cos(), outer.to_radians().cos())
}

pub struct Light {
    pub color: [f32; 3],
    pub power: f32,
    pub bias: ShadowBias,
    pub visible: bool,
    pub casts_shadows: bool,
    kind: LightKind,
    shadow: ShadowCaster,
}

impl Light {
    pub fn directional(direction: Vector3<f32>, resolution: u32) -> Self {
        Self::with_kind(
            LightKind::Directional {
                direction: normalized_or_down(direction),
            },
            ShadowCaster::directional(resolution),
            3.0,
        )
    }

    pub fn point(position: Vector3<f32>, radius: f32, resolution: u32) -> Self {
        let radius = radius.max(MIN_LIGHT_EXTENT);
        Self::with_kind(
            LightKind::Point { position, radius },
            ShadowCaster::point(resolution, radius),
            20.0,
        )
    }

    /// Spot light with cone half-angles in degrees.
    pub fn spot(
        position: Vector3<f32>,
        direction: Vector3<f32>,
        range: f32,
        inner_deg: f32,
        outer_deg: f32,
        resolution: u32,
    ) -> Self {
        let range = range.max(MIN_LIGHT_EXTENT);
        let (cut_off, outer_cut_off) = cutoff_cosines(inner_deg, outer_deg);
        Self::with_kind(
            LightKind::Spot {
                position,
                direction: normalized_or_down(direction),
                range,
                cut_off,
                outer_cut_off,
            },
            ShadowCaster::spot(resolution, outer_cut_off, range),
            30.0,
        )
    }

    fn with_kind(kind: LightKind, shadow: ShadowCaster, power: f32) -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            power,
            bias: ShadowBias::default(),
            visible: true,
            casts_shadows: true,
            kind,
            shadow,
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_power(mut self, power: f32) -> Self {
        self.power = power.max(0.0);
        self
    }

    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    pub fn shadow(&self) -> &ShadowCaster {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut ShadowCaster {
        &mut self.shadow
    }

    /// Returns false when the light has no direction.
    pub fn set_direction(&mut self, new_direction: Vector3<f32>) -> bool {
        match &mut self.kind {
            LightKind::Directional { direction } | LightKind::Spot { direction, .. } => {
                *direction = normalized_or_down(new_direction);
                true
            }
            LightKind::Point { .. } => false,
        }
    }

    /// Returns false for directional lights.
    pub fn set_position(&mut self, new_position: Vector3<f32>) -> bool {
        match &mut self.kind {
            LightKind::Point { position, .. } | LightKind::Spot { position, .. } => {
                *position = new_position;
                true
            }
            LightKind::Directional { .. } => false,
        }
    }

    /// Point-light radius or spot-light range.
    pub fn set_extent(&mut self, extent: f32) -> bool {
        match &mut self.kind {
            LightKind::Point { radius: value, .. } | LightKind::Spot { range: value, .. } => {
                *value = extent.max(MIN_LIGHT_EXTENT);
                true
            }
            LightKind::Directional { .. } => false,
        }
    }

    /// Cone half-angles in degrees. Only spot lights accept this.
    pub fn set_cutoff(&mut self, inner_deg: f32, outer_deg: f32) -> bool {
        match &mut self.kind {
            LightKind::Spot {
                cut_off,
                outer_cut_off,
                ..
            } => {
                (*cut_off, *outer_cut_off) = cutoff_cosines(inner_deg, outer_deg);
                true
            }
            _ => false,
        }
    }

    /// Re-derives the caster's projection and light-space matrices.
    ///
    /// Directional casters follow `focus` so the ortho box stays centred on
    /// the area of interest.
    pub fn update_shadow(&mut self, focus: Vector3<f32>) {
        let near = self.shadow.planes().near;
        match self.kind {
            LightKind::Directional { direction } => self.shadow.update(focus, direction),
            LightKind::Point { position, radius } => {
                // Radius is floored above near, so this cannot be rejected.
                let _ = self.shadow.set_depth_range(near, radius.max(near * 2.0));
                self.shadow.update(position, Vector3::zero());
            }
            LightKind::Spot {
                position,
                direction,
                range,
                outer_cut_off,
                ..
            } => {
                self.shadow.set_fov(spot_cone_fov(outer_cut_off));
                let _ = self.shadow.set_depth_range(near, range.max(near * 2.0));
                self.shadow.update(position, direction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::lighting::shadow_caster::LightSpace;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_direction_falls_back_to_down() {
        let light = Light::directional(Vector3::zero(), 256);
        assert_eq!(light.kind().direction(), Some(-Vector3::unit_y()));
    }

    #[test]
    fn test_setters_respect_light_type() {
        let mut point = Light::point(Vector3::zero(), 5.0, 64);
        assert!(!point.set_direction(Vector3::unit_x()));
        assert!(point.set_position(Vector3::unit_x()));
        assert!(!point.set_cutoff(10.0, 20.0));

        let mut sun = Light::directional(-Vector3::unit_y(), 64);
        assert!(!sun.set_position(Vector3::unit_x()));
        assert!(!sun.set_extent(3.0));
    }

    #[test]
    fn test_spot_cutoffs_are_ordered_cosines() {
        let light = Light::spot(Vector3::zero(), -Vector3::unit_y(), 10.0, 40.0, 25.0, 64);
        let LightKind::Spot {
            cut_off,
            outer_cut_off,
            ..
        } = *light.kind()
        else {
            panic!("expected spot light");
        };
        // Inner clamps to the outer angle
        assert_relative_eq!(cut_off, outer_cut_off);
        assert_relative_eq!(outer_cut_off, 25f32.to_radians().cos(), epsilon = 1e-6);
    }

    #[test]
    fn test_spot_shadow_follows_range_and_cone() {
        let mut light = Light::spot(Vector3::new(0.0, 5.0, 0.0), -Vector3::unit_y(), 12.0, 15.0, 30.0, 64);
        light.set_extent(18.0);
        light.update_shadow(Vector3::zero());

        assert_relative_eq!(light.shadow().planes().far, 18.0);
        assert_relative_eq!(light.shadow().fov().0, 64.0, epsilon = 1e-3);
    }

    #[test]
    fn test_point_shadow_has_six_faces() {
        let mut light = Light::point(Vector3::new(1.0, 2.0, 3.0), 7.0, 64);
        light.update_shadow(Vector3::zero());
        assert!(matches!(light.shadow().light_space(), LightSpace::Cube(_)));
        assert_relative_eq!(light.shadow().planes().far, 7.0);
    }

    #[test]
    fn test_extent_is_floored() {
        let mut light = Light::point(Vector3::zero(), 0.0, 64);
        light.set_extent(-3.0);
        let LightKind::Point { radius, .. } = *light.kind() else {
            panic!("expected point light");
        };
        assert_eq!(radius, MIN_LIGHT_EXTENT);
        light.update_shadow(Vector3::zero());
        assert!(light.shadow().planes().far > light.shadow().planes().near);
    }
}
