//! Shadow pass planning and the per-view uniform slots it renders with.
//!
//! Every shadow view of the frame (one per directional or spot light, six
//! per point light) gets one slot in a dynamic-offset uniform buffer, so a
//! single bind group serves the whole pass.

use cgmath::Matrix4;

use crate::gfx::lighting::{LightRegistry, LightType, MAX_LIGHTS_PER_KIND};
use crate::gfx::resources::frame_uniforms::{matrix_to_array, ShadowPassUniform, MAX_POINT_SHADOW_LAYERS};
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
};

use super::shadow_atlas::point_layer;

pub const MAX_SHADOW_SLOTS: usize = 2 * MAX_LIGHTS_PER_KIND + MAX_POINT_SHADOW_LAYERS;

/// One depth render of one light view, and where its result lands.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowJob {
    pub light_type: LightType,
    /// Index among the packed lights of `light_type`
    pub light_index: usize,
    /// Layer of the caster's own target (cube face for point lights)
    pub caster_layer: usize,
    pub atlas_layer: u32,
    pub slot: usize,
    pub resolution: (u32, u32),
    pub uniform: ShadowPassUniform,
}

fn single_view(matrix: Matrix4<f32>) -> ShadowPassUniform {
    ShadowPassUniform {
        light_space: matrix_to_array(matrix),
        light_position_far: [0.0; 4],
    }
}

/// Lists the views to render for every packed light that casts shadows,
/// directional first, then spot, then point. Slots are assigned in order.
pub fn plan_shadow_jobs(registry: &LightRegistry) -> Vec<ShadowJob> {
    let mut jobs = Vec::new();
    for light_type in [LightType::Directional, LightType::Spot, LightType::Point] {
        for (light_index, light) in registry.packed(light_type).enumerate() {
            if !light.casts_shadows {
                continue;
            }
            let caster = light.shadow();
            let resolution = caster.resolution();

            if let (Some(faces), Some(position)) = (caster.face_matrices(), light.kind().position()) {
                let far = caster.planes().far;
                for (face, matrix) in faces.iter().enumerate() {
                    jobs.push(ShadowJob {
                        light_type,
                        light_index,
                        caster_layer: face,
                        atlas_layer: point_layer(light_index, face),
                        slot: jobs.len(),
                        resolution,
                        uniform: ShadowPassUniform {
                            light_space: matrix_to_array(*matrix),
                            light_position_far: [position.x, position.y, position.z, far],
                        },
                    });
                }
            } else {
                jobs.push(ShadowJob {
                    light_type,
                    light_index,
                    caster_layer: 0,
                    atlas_layer: light_index as u32,
                    slot: jobs.len(),
                    resolution,
                    uniform: single_view(caster.light_space_matrix()),
                });
            }
        }
    }
    jobs
}

/// Rounds `size` up to the device's uniform offset alignment.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

pub struct ShadowSlots {
    buffer: wgpu::Buffer,
    stride: u64,
    layout: BindGroupLayoutWithDesc,
    bind_group: wgpu::BindGroup,
}

impl ShadowSlots {
    pub fn new(device: &wgpu::Device) -> Self {
        let size = std::mem::size_of::<ShadowPassUniform>() as u64;
        let stride = aligned_stride(size, device.limits().min_uniform_buffer_offset_alignment as u64);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Pass Slots"),
            size: stride * MAX_SHADOW_SLOTS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform_dynamic(size))
            .create(device, "Shadow Pass Slot Layout");
        let bind_group = BindGroupBuilder::new(&layout)
            .buffer_window(&buffer, size)
            .create(device, "Shadow Pass Slot Bind Group");

        Self {
            buffer,
            stride,
            layout,
            bind_group,
        }
    }

    /// Uploads the uniform of every job. Jobs past the buffer capacity are
    /// dropped with a warning.
    pub fn write(&self, queue: &wgpu::Queue, jobs: &[ShadowJob]) {
        if jobs.len() > MAX_SHADOW_SLOTS {
            log::warn!("{} shadow views requested, rendering {}", jobs.len(), MAX_SHADOW_SLOTS);
        }
        for job in jobs.iter().take(MAX_SHADOW_SLOTS) {
            queue.write_buffer(
                &self.buffer,
                job.slot as u64 * self.stride,
                bytemuck::bytes_of(&job.uniform),
            );
        }
    }

    pub fn offset(&self, slot: usize) -> u32 {
        (slot as u64 * self.stride) as u32
    }

    pub fn layout(&self) -> &BindGroupLayoutWithDesc {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::lighting::Light;
    use cgmath::Vector3;

    #[test]
    fn test_stride_alignment() {
        assert_eq!(aligned_stride(80, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(300, 256), 512);
        assert_eq!(aligned_stride(80, 0), 80);
    }

    #[test]
    fn test_jobs_cover_every_view_in_order() {
        let mut registry = LightRegistry::new();
        registry.add(Light::point(Vector3::new(0.0, 2.0, 0.0), 10.0, 256));
        registry.add(Light::directional(-Vector3::unit_y(), 1024));
        registry.add(Light::spot(
            Vector3::new(0.0, 4.0, 0.0),
            -Vector3::unit_y(),
            15.0,
            20.0,
            30.0,
            512,
        ));
        registry.update_shadow_matrices(Vector3::new(0.0, 0.0, 0.0));

        let jobs = plan_shadow_jobs(&registry);
        assert_eq!(jobs.len(), 1 + 1 + 6);
        assert_eq!(jobs[0].light_type, LightType::Directional);
        assert_eq!(jobs[1].light_type, LightType::Spot);
        assert_eq!(jobs[1].resolution, (512, 512));

        let point_jobs: Vec<&ShadowJob> = jobs.iter().filter(|j| j.light_type == LightType::Point).collect();
        assert_eq!(point_jobs.len(), 6);
        for (face, job) in point_jobs.iter().enumerate() {
            assert_eq!(job.caster_layer, face);
            assert_eq!(job.atlas_layer, face as u32);
            assert_eq!(job.uniform.light_position_far, [0.0, 2.0, 0.0, 10.0]);
        }
        let slots: Vec<usize> = jobs.iter().map(|j| j.slot).collect();
        assert_eq!(slots, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_non_casting_lights_are_skipped_but_keep_their_layer() {
        let mut registry = LightRegistry::new();
        registry.add(Light::directional(-Vector3::unit_y(), 64));
        registry.add(Light::directional(-Vector3::unit_x(), 64));
        registry
            .get_mut(LightType::Directional, 0)
            .unwrap()
            .casts_shadows = false;

        let jobs = plan_shadow_jobs(&registry);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].light_index, 1);
        assert_eq!(jobs[0].atlas_layer, 1);
        assert_eq!(jobs[0].slot, 0);
    }
}
