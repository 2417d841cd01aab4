//! Bind groups shared by every draw of a frame
//!
//! Group 0 holds the per-frame uniform blocks (camera, lights, shadow
//! matrices, reflection probes). Group 1 holds the textures the light pass
//! samples: the three shadow atlases, the comparison sampler and the IBL
//! maps. Both are created once at worst-case size and only rewritten.

use super::environment::Environment;
use super::frame_uniforms::{
    pack_lights, pack_probes, pack_shadow_matrices, AtlasExtents, CameraUniform, LightsUniform,
    ProbesUniform, ShadowUniform,
};
use crate::gfx::lighting::LightType;
use crate::gfx::rendering::shadow_atlas::ShadowAtlas;
use crate::gfx::scene::Scene;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

pub struct FrameBindings {
    layout: BindGroupLayoutWithDesc,
    camera: UniformBuffer<CameraUniform>,
    lights: UniformBuffer<LightsUniform>,
    shadows: UniformBuffer<ShadowUniform>,
    probes: UniformBuffer<ProbesUniform>,
    bind_group: wgpu::BindGroup,
}

impl FrameBindings {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform()) // camera
            .next_binding_fragment(binding_types::uniform()) // lights
            .next_binding_fragment(binding_types::uniform()) // shadow matrices
            .next_binding_fragment(binding_types::uniform()) // probes
            .create(device, "Frame Bind Group Layout");

        let camera = UniformBuffer::new(device);
        let lights = UniformBuffer::new_with_data(device, &LightsUniform::default());
        let shadows = UniformBuffer::new_with_data(device, &ShadowUniform::default());
        let probes = UniformBuffer::new_with_data(device, &ProbesUniform::default());

        let bind_group = BindGroupBuilder::new(&layout)
            .resource(camera.binding_resource())
            .resource(lights.binding_resource())
            .resource(shadows.binding_resource())
            .resource(probes.binding_resource())
            .create(device, "Frame Bind Group");

        Self {
            layout,
            camera,
            lights,
            shadows,
            probes,
            bind_group,
        }
    }

    /// Marshals the scene's camera, lights and probes. The lights block only
    /// uploads the slots in use plus its count fields.
    pub fn update(&mut self, queue: &wgpu::Queue, scene: &Scene, atlas: &AtlasExtents) {
        self.camera.update_content(queue, scene.camera.to_uniform());

        let lights = pack_lights(&scene.lights, scene.settings.shader_flags(), atlas);
        let ranges = lights.used_ranges();
        self.lights.update_ranges(queue, lights, &ranges);

        self.shadows
            .update_content(queue, pack_shadow_matrices(&scene.lights));
        self.probes
            .update_content(queue, pack_probes(scene.lights.probes()));
    }

    pub fn layout(&self) -> &BindGroupLayoutWithDesc {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Shadow atlases and IBL maps at group 1 of the light and skybox passes.
pub struct SceneTextureBindings {
    layout: BindGroupLayoutWithDesc,
    bind_group: Option<wgpu::BindGroup>,
}

impl SceneTextureBindings {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::depth_texture_2d_array()) // directional atlas
            .next_binding_fragment(binding_types::depth_texture_2d_array()) // spot atlas
            .next_binding_fragment(binding_types::depth_texture_2d_array()) // point atlas
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Comparison))
            .next_binding_fragment(binding_types::texture_cube()) // irradiance
            .next_binding_fragment(binding_types::texture_cube()) // prefiltered
            .next_binding_fragment(binding_types::texture_2d()) // brdf lut
            .next_binding_fragment(binding_types::texture_cube()) // skybox
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
            .create(device, "Scene Textures Bind Group Layout");

        Self {
            layout,
            bind_group: None,
        }
    }

    /// Must be called again whenever the atlas or environment is replaced.
    pub fn rebuild(&mut self, device: &wgpu::Device, atlas: &ShadowAtlas, environment: &Environment) {
        self.bind_group = Some(
            BindGroupBuilder::new(&self.layout)
                .texture(atlas.array(LightType::Directional).view())
                .texture(atlas.array(LightType::Spot).view())
                .texture(atlas.array(LightType::Point).view())
                .sampler(atlas.sampler())
                .texture(&environment.irradiance.view)
                .texture(&environment.prefilter.view)
                .texture(&environment.brdf_lut.view)
                .texture(&environment.skybox.view)
                .sampler(&environment.skybox.sampler)
                .create(device, "Scene Textures Bind Group"),
        );
    }

    pub fn layout(&self) -> &BindGroupLayoutWithDesc {
        &self.layout
    }

    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }
}
