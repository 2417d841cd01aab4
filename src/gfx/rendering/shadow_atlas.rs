//! Per-kind depth arrays the light pass samples shadows from.
//!
//! Each caster renders into its own target at its own resolution; the
//! shadow pass then copies that depth into one layer of the array for its
//! light kind. Layers are as large as the largest caster of the kind, and
//! smaller casters occupy the top-left corner.

use crate::gfx::lighting::{LightType, MAX_LIGHTS_PER_KIND, SHADOW_DEPTH_FORMAT};
use crate::gfx::resources::frame_uniforms::{AtlasExtents, MAX_POINT_SHADOW_LAYERS};
use crate::gfx::resources::texture_resource::{clamp_extent, shadow_sampler};
use crate::wgpu_utils::{
    binding_builder::{BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
};

/// Array layer of cube face `face` of the `light_index`-th packed point light.
pub fn point_layer(light_index: usize, face: usize) -> u32 {
    (light_index * 6 + face) as u32
}

pub struct AtlasArray {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    layer_views: Vec<wgpu::TextureView>,
    extent: (u32, u32),
}

impl AtlasArray {
    fn new(device: &wgpu::Device, extent: (u32, u32), layers: u32, label: &str) -> Self {
        let (width, height) = clamp_extent(extent, device.limits().max_texture_dimension_2d);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
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
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!("{} {}x{} is incomplete: {}", label, width, height, error);
        }

        Self {
            texture,
            view,
            layer_views,
            extent: (width, height),
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn layer_view(&self, layer: u32) -> Option<&wgpu::TextureView> {
        self.layer_views.get(layer as usize)
    }

    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}

pub struct ShadowAtlas {
    directional: AtlasArray,
    spot: AtlasArray,
    point: AtlasArray,
    extents: AtlasExtents,
    blit_layout: BindGroupLayoutWithDesc,
    sampler: wgpu::Sampler,
}

impl ShadowAtlas {
    pub fn new(device: &wgpu::Device) -> Self {
        let extents = AtlasExtents::default();
        let blit_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::depth_texture_2d())
            .create(device, "Shadow Blit Source");

        Self {
            directional: Self::create_array(device, LightType::Directional, extents.directional),
            spot: Self::create_array(device, LightType::Spot, extents.spot),
            point: Self::create_array(device, LightType::Point, extents.point),
            extents,
            blit_layout,
            sampler: shadow_sampler(device),
        }
    }

    fn create_array(device: &wgpu::Device, light_type: LightType, extent: (u32, u32)) -> AtlasArray {
        let layers = match light_type {
            LightType::Point => MAX_POINT_SHADOW_LAYERS as u32,
            LightType::Directional | LightType::Spot => MAX_LIGHTS_PER_KIND as u32,
        };
        let label = format!("{} Shadow Atlas", light_type.label());
        AtlasArray::new(device, extent, layers, &label)
    }

    /// Recreates the arrays whose extent changed. Returns true if any was
    /// recreated, in which case bind groups referencing the atlas are stale.
    pub fn resize(&mut self, device: &wgpu::Device, extents: AtlasExtents) -> bool {
        if extents == self.extents {
            return false;
        }
        for light_type in LightType::ALL {
            let extent = extents.for_type(light_type);
            if extent != self.extents.for_type(light_type) {
                log::debug!(
                    "Resizing {} shadow atlas to {}x{}",
                    light_type.label(),
                    extent.0,
                    extent.1
                );
                *self.array_mut(light_type) = Self::create_array(device, light_type, extent);
            }
        }
        self.extents = extents;
        true
    }

    pub fn extents(&self) -> &AtlasExtents {
        &self.extents
    }

    pub fn array(&self, light_type: LightType) -> &AtlasArray {
        match light_type {
            LightType::Directional => &self.directional,
            LightType::Spot => &self.spot,
            LightType::Point => &self.point,
        }
    }

    fn array_mut(&mut self, light_type: LightType) -> &mut AtlasArray {
        match light_type {
            LightType::Directional => &mut self.directional,
            LightType::Spot => &mut self.spot,
            LightType::Point => &mut self.point,
        }
    }

    pub fn blit_layout(&self) -> &BindGroupLayoutWithDesc {
        &self.blit_layout
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_layers_fill_the_array() {
        assert_eq!(point_layer(0, 0), 0);
        assert_eq!(point_layer(1, 0), 6);
        assert_eq!(point_layer(2, 5), 17);
        assert_eq!(
            point_layer(MAX_LIGHTS_PER_KIND - 1, 5) as usize,
            MAX_POINT_SHADOW_LAYERS - 1
        );
    }
}
