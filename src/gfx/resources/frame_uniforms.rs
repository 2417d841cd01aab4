//! Per-frame uniform blocks and the packing that fills them.
//!
//! Every struct here MUST match its WGSL declaration in
//! `gfx/rendering/shaders` field for field. Arrays of structs are sized to
//! multiples of 16 bytes, and `vec3` members are always followed by a
//! scalar so nothing straddles a 16-byte boundary.

use cgmath::Matrix4;

use crate::gfx::lighting::{Light, LightKind, LightRegistry, LightType, ReflectionProbe};
use crate::gfx::lighting::{MAX_LIGHTS_PER_KIND, MAX_REFLECTION_PROBES};

pub const MAX_POINT_SHADOW_LAYERS: usize = MAX_LIGHTS_PER_KIND * 6;

pub fn matrix_to_array(m: Matrix4<f32>) -> [[f32; 4]; 4] {
    m.into()
}

fn identity() -> [[f32; 4]; 4] {
    matrix_to_array(<Matrix4<f32> as cgmath::SquareMatrix>::identity())
}

/// Group 0, binding 0
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub inverse_view_proj: [[f32; 4]; 4],
    /// xyz position, w = 1
    pub position: [f32; 4],
    /// near, far, vertical fov (radians), aspect
    pub params: [f32; 4],
}
// 4 * 64 + 16 + 16 = 288 bytes

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightData {
    /// xyz direction, w = power
    pub direction: [f32; 4],
    /// rgb colour, w unused
    pub color: [f32; 4],
    /// normal offset, depth bias, has shadow, unused
    pub shadow: [f32; 4],
    /// atlas uv scale xy, caster texel size zw
    pub shadow_extent: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightData {
    /// xyz position, w = radius
    pub position: [f32; 4],
    /// rgb colour, w = power
    pub color: [f32; 4],
    /// normal offset, depth bias, has shadow, shadow far plane
    pub shadow: [f32; 4],
    pub shadow_extent: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightData {
    /// xyz position, w = range
    pub position: [f32; 4],
    /// xyz direction, w = power
    pub direction: [f32; 4],
    pub color: [f32; 4],
    /// cos inner, cos outer, unused, unused
    pub cone: [f32; 4],
    pub shadow: [f32; 4],
    pub shadow_extent: [f32; 4],
}

/// Group 0, binding 1. Shaders must only read the first `counts[k]`
/// entries of each array.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub directional: [DirectionalLightData; MAX_LIGHTS_PER_KIND],
    pub point: [PointLightData; MAX_LIGHTS_PER_KIND],
    pub spot: [SpotLightData; MAX_LIGHTS_PER_KIND],
    /// directional, point, spot
    pub counts: [u32; 3],
    /// See [`crate::gfx::rendering::settings::flags`]
    pub flags: u32,
}
// 512 + 512 + 768 + 16 = 1808 bytes

impl Default for LightsUniform {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl LightsUniform {
    /// Byte ranges that carry meaning for the current counts: the used
    /// prefix of each array plus the trailing counts/flags.
    pub fn used_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let dir_start = std::mem::offset_of!(LightsUniform, directional);
        let point_start = std::mem::offset_of!(LightsUniform, point);
        let spot_start = std::mem::offset_of!(LightsUniform, spot);
        let counts_start = std::mem::offset_of!(LightsUniform, counts);

        let [dir, point, spot] = self.counts.map(|c| c as usize);
        let mut ranges = vec![
            dir_start..dir_start + dir * std::mem::size_of::<DirectionalLightData>(),
            point_start..point_start + point * std::mem::size_of::<PointLightData>(),
            spot_start..spot_start + spot * std::mem::size_of::<SpotLightData>(),
            counts_start..std::mem::size_of::<LightsUniform>(),
        ];
        ranges.retain(|range| !range.is_empty());
        ranges
    }
}

/// Group 0, binding 2. Point lights take six consecutive slots, one per
/// cube face in +X, -X, +Y, -Y, +Z, -Z order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniform {
    pub directional: [[[f32; 4]; 4]; MAX_LIGHTS_PER_KIND],
    pub spot: [[[f32; 4]; 4]; MAX_LIGHTS_PER_KIND],
    pub point: [[[f32; 4]; 4]; MAX_POINT_SHADOW_LAYERS],
}
// 64 * (8 + 8 + 48) = 4096 bytes

impl Default for ShadowUniform {
    fn default() -> Self {
        Self {
            directional: [identity(); MAX_LIGHTS_PER_KIND],
            spot: [identity(); MAX_LIGHTS_PER_KIND],
            point: [identity(); MAX_POINT_SHADOW_LAYERS],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProbeData {
    /// xyz capture position, w = blend radius
    pub position_radius: [f32; 4],
    /// xyz box min, w = intensity
    pub box_min: [f32; 4],
    pub box_max: [f32; 4],
}

/// Group 0, binding 3
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProbesUniform {
    pub probes: [ProbeData; MAX_REFLECTION_PROBES],
    /// x = count
    pub count: [u32; 4],
}
// 48 * 8 + 16 = 400 bytes

impl Default for ProbesUniform {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// One dynamic-offset slot per shadow view rendered this frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowPassUniform {
    pub light_space: [[f32; 4]; 4],
    /// xyz light position, w = far plane; zero for directional and spot
    pub light_position_far: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutlineUniform {
    pub color: [f32; 4],
    /// x = scale factor applied around the object's local origin
    pub scale: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessUniform {
    /// exposure, gamma, unused, unused
    pub params: [f32; 4],
}

/// Size of each per-kind shadow atlas layer. Casters smaller than the
/// atlas occupy its top-left corner and sample through a uv scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasExtents {
    pub directional: (u32, u32),
    pub spot: (u32, u32),
    pub point: (u32, u32),
}

impl Default for AtlasExtents {
    fn default() -> Self {
        Self {
            directional: (1, 1),
            spot: (1, 1),
            point: (1, 1),
        }
    }
}

impl AtlasExtents {
    /// Largest caster resolution among the packed lights of each type.
    pub fn for_registry(registry: &LightRegistry) -> Self {
        let largest = |light_type| {
            registry
                .packed(light_type)
                .map(|light: &Light| light.shadow().resolution())
                .fold((1, 1), |acc: (u32, u32), r| (acc.0.max(r.0), acc.1.max(r.1)))
        };
        Self {
            directional: largest(LightType::Directional),
            spot: largest(LightType::Spot),
            point: largest(LightType::Point),
        }
    }

    pub fn for_type(&self, light_type: LightType) -> (u32, u32) {
        match light_type {
            LightType::Directional => self.directional,
            LightType::Spot => self.spot,
            LightType::Point => self.point,
        }
    }
}

fn shadow_extent(light: &Light, atlas: (u32, u32)) -> [f32; 4] {
    let (w, h) = light.shadow().resolution();
    [
        w as f32 / atlas.0.max(1) as f32,
        h as f32 / atlas.1.max(1) as f32,
        1.0 / w as f32,
        1.0 / h as f32,
    ]
}

fn shadow_params(light: &Light, shadows_enabled: bool, far: f32) -> [f32; 4] {
    let has_shadow = shadows_enabled && light.casts_shadows;
    [
        light.bias.normal_offset,
        light.bias.depth,
        if has_shadow { 1.0 } else { 0.0 },
        far,
    ]
}

fn color(light: &Light, w: f32) -> [f32; 4] {
    [light.color[0], light.color[1], light.color[2], w]
}

/// Packs the visible lights of the registry, at most
/// [`MAX_LIGHTS_PER_KIND`] per type, and records how many slots are valid.
pub fn pack_lights(registry: &LightRegistry, flags: u32, atlas: &AtlasExtents) -> LightsUniform {
    let shadows_enabled = flags & crate::gfx::rendering::settings::flags::SHADOWS != 0;
    let mut uniform = LightsUniform {
        flags,
        ..Default::default()
    };

    for (slot, light) in uniform.directional.iter_mut().zip(registry.packed(LightType::Directional)) {
        let LightKind::Directional { direction } = *light.kind() else {
            continue;
        };
        *slot = DirectionalLightData {
            direction: [direction.x, direction.y, direction.z, light.power],
            color: color(light, 0.0),
            shadow: shadow_params(light, shadows_enabled, 0.0),
            shadow_extent: shadow_extent(light, atlas.directional),
        };
        uniform.counts[0] += 1;
    }

    for (slot, light) in uniform.point.iter_mut().zip(registry.packed(LightType::Point)) {
        let LightKind::Point { position, radius } = *light.kind() else {
            continue;
        };
        *slot = PointLightData {
            position: [position.x, position.y, position.z, radius],
            color: color(light, light.power),
            shadow: shadow_params(light, shadows_enabled, light.shadow().planes().far),
            shadow_extent: shadow_extent(light, atlas.point),
        };
        uniform.counts[1] += 1;
    }

    for (slot, light) in uniform.spot.iter_mut().zip(registry.packed(LightType::Spot)) {
        let LightKind::Spot {
            position,
            direction,
            range,
            cut_off,
            outer_cut_off,
        } = *light.kind()
        else {
            continue;
        };
        *slot = SpotLightData {
            position: [position.x, position.y, position.z, range],
            direction: [direction.x, direction.y, direction.z, light.power],
            color: color(light, 0.0),
            cone: [cut_off, outer_cut_off, 0.0, 0.0],
            shadow: shadow_params(light, shadows_enabled, 0.0),
            shadow_extent: shadow_extent(light, atlas.spot),
        };
        uniform.counts[2] += 1;
    }

    uniform
}

/// Light-space matrices in the same slot order as [`pack_lights`].
pub fn pack_shadow_matrices(registry: &LightRegistry) -> ShadowUniform {
    let mut uniform = ShadowUniform::default();

    for (slot, light) in uniform.directional.iter_mut().zip(registry.packed(LightType::Directional)) {
        *slot = matrix_to_array(light.shadow().light_space_matrix());
    }
    for (slot, light) in uniform.spot.iter_mut().zip(registry.packed(LightType::Spot)) {
        *slot = matrix_to_array(light.shadow().light_space_matrix());
    }
    for (slots, light) in uniform.point.chunks_exact_mut(6).zip(registry.packed(LightType::Point)) {
        if let Some(faces) = light.shadow().face_matrices() {
            for (slot, face) in slots.iter_mut().zip(faces) {
                *slot = matrix_to_array(*face);
            }
        }
    }

    uniform
}

pub fn pack_probes(probes: &[ReflectionProbe]) -> ProbesUniform {
    let mut uniform = ProbesUniform::default();
    for (slot, probe) in uniform.probes.iter_mut().zip(probes) {
        *slot = ProbeData {
            position_radius: [probe.position.x, probe.position.y, probe.position.z, probe.radius],
            box_min: [probe.box_min.x, probe.box_min.y, probe.box_min.z, probe.intensity],
            box_max: [probe.box_max.x, probe.box_max.y, probe.box_max.z, 0.0],
        };
        uniform.count[0] += 1;
    }
    uniform
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::settings::flags;
    use cgmath::{Vector3, Zero};
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_block_sizes_match_shader_layout() {
        assert_eq!(size_of::<CameraUniform>(), 288);
        assert_eq!(size_of::<DirectionalLightData>(), 64);
        assert_eq!(size_of::<PointLightData>(), 64);
        assert_eq!(size_of::<SpotLightData>(), 96);
        assert_eq!(size_of::<LightsUniform>(), 1808);
        assert_eq!(size_of::<ShadowUniform>(), 4096);
        assert_eq!(size_of::<ProbeData>(), 48);
        assert_eq!(size_of::<ProbesUniform>(), 400);
        assert_eq!(size_of::<ShadowPassUniform>(), 80);
    }

    #[test]
    fn test_array_members_start_on_16_byte_boundaries() {
        for offset in [
            offset_of!(LightsUniform, directional),
            offset_of!(LightsUniform, point),
            offset_of!(LightsUniform, spot),
            offset_of!(LightsUniform, counts),
            offset_of!(ShadowUniform, spot),
            offset_of!(ShadowUniform, point),
            offset_of!(ProbesUniform, count),
        ] {
            assert_eq!(offset % 16, 0, "offset {offset}");
        }
        assert_eq!(offset_of!(LightsUniform, counts), 1792);
        assert_eq!(offset_of!(LightsUniform, flags), 1804);
    }

    #[test]
    fn test_point_light_count_is_capped() {
        let mut registry = LightRegistry::new();
        for i in 0..10 {
            registry.add(Light::point(Vector3::new(i as f32, 1.0, 0.0), 4.0, 64));
        }
        let uniform = pack_lights(&registry, flags::SHADOWS, &AtlasExtents::for_registry(&registry));

        assert_eq!(uniform.counts, [0, 8, 0]);
        assert_eq!(uniform.point[7].position[0], 7.0);
        assert_eq!(uniform.point[7].position[3], 4.0);
        assert_eq!(uniform.directional[0], DirectionalLightData::default());
    }

    #[test]
    fn test_shadow_flag_gates_has_shadow() {
        let mut registry = LightRegistry::new();
        registry.add(Light::directional(-Vector3::unit_y(), 64));
        let atlas = AtlasExtents::for_registry(&registry);

        assert_eq!(pack_lights(&registry, flags::SHADOWS, &atlas).directional[0].shadow[2], 1.0);
        assert_eq!(pack_lights(&registry, 0, &atlas).directional[0].shadow[2], 0.0);
    }

    #[test]
    fn test_uv_scale_relative_to_largest_caster() {
        let mut registry = LightRegistry::new();
        registry.add(Light::spot(Vector3::zero(), -Vector3::unit_y(), 10.0, 20.0, 30.0, 512));
        registry.add(Light::spot(Vector3::zero(), -Vector3::unit_y(), 10.0, 20.0, 30.0, 1024));
        let atlas = AtlasExtents::for_registry(&registry);
        assert_eq!(atlas.spot, (1024, 1024));

        let uniform = pack_lights(&registry, flags::SHADOWS, &atlas);
        assert_eq!(uniform.spot[0].shadow_extent[0], 0.5);
        assert_eq!(uniform.spot[1].shadow_extent[0], 1.0);
    }

    #[test]
    fn test_point_faces_fill_six_slots() {
        let mut registry = LightRegistry::new();
        registry.add(Light::point(Vector3::new(0.0, 2.0, 0.0), 6.0, 64));
        registry.add(Light::point(Vector3::new(3.0, 2.0, 0.0), 6.0, 64));
        registry.update_shadow_matrices(Vector3::zero());

        let uniform = pack_shadow_matrices(&registry);
        let faces = registry.get(LightType::Point, 1).unwrap().shadow().face_matrices().unwrap();
        for face in 0..6 {
            assert_eq!(uniform.point[6 + face], matrix_to_array(faces[face]));
        }
        assert_eq!(uniform.point[12], identity());
    }

    #[test]
    fn test_used_ranges_cover_prefix_and_counts() {
        let mut uniform = LightsUniform::default();
        uniform.counts = [1, 0, 2];
        let ranges = uniform.used_ranges();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], 0..64);
        assert_eq!(ranges[1], 1024..1024 + 192);
        assert_eq!(ranges[2], 1792..1808);
    }

    #[test]
    fn test_probe_packing() {
        let probes = vec![ReflectionProbe::new(Vector3::new(0.0, 1.0, 0.0), Vector3::new(2.0, 2.0, 2.0)); 9];
        let uniform = pack_probes(&probes);
        assert_eq!(uniform.count[0], MAX_REFLECTION_PROBES as u32);
        assert_eq!(uniform.probes[0].box_min, [-2.0, -1.0, -2.0, 1.0]);
    }
}
