//! Texture resource management for wgpu
//!
//! Render targets, depth-stencil buffers and the small constant textures
//! the light pass falls back to when no environment has been baked.

/// GPU texture resource containing texture, view, and sampler
#[derive(Clone)]
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Edge length of the generated BRDF lookup table.
pub const BRDF_LUT_SIZE: u32 = 32;

/// `max_texture_dimension_2d` requested from the device.
pub const MAX_TEXTURE_DIMENSION: u32 = 4096;

/// Clamps each side of `size` to `1..=max_dimension`.
pub fn clamp_extent((width, height): (u32, u32), max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
}

impl TextureResource {
    /// Depth-stencil format of the light pass; the stencil carries the
    /// selection mask for outlines.
    pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
    pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Colour attachment of `size`. Single-sampled targets can also be
    /// sampled by later passes.
    pub fn create_render_target(
        device: &wgpu::Device,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        sample_count: u32,
        label: &str,
    ) -> Self {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if sample_count == 1 {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: linear_sampler(device, label),
        }
    }

    pub fn create_depth_stencil(
        device: &wgpu::Device,
        (width, height): (u32, u32),
        sample_count: u32,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: linear_sampler(device, label),
        }
    }

    /// 1x1 cubemap with every face set to `rgb`.
    pub fn create_solid_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgb: [f32; 3],
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 6,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texel = unorm_texel([rgb[0], rgb[1], rgb[2], 1.0]);
        let faces: Vec<u8> = texel.iter().copied().cycle().take(4 * 6).collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &faces,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler: linear_sampler(device, label),
        }
    }

    /// Split-sum BRDF table indexed by (n·v, roughness), filled with an
    /// analytic fit instead of an integration pass.
    pub fn create_brdf_lut(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let size = wgpu::Extent3d {
            width: BRDF_LUT_SIZE,
            height: BRDF_LUT_SIZE,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("BRDF LUT"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &brdf_lut_texels(BRDF_LUT_SIZE),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * BRDF_LUT_SIZE),
                rows_per_image: Some(BRDF_LUT_SIZE),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: linear_sampler(device, "BRDF LUT"),
        }
    }
}

pub fn linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{} Sampler", label)),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Comparison sampler for shadow atlas lookups.
pub fn shadow_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Shadow Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        compare: Some(wgpu::CompareFunction::LessEqual),
        lod_min_clamp: 0.0,
        lod_max_clamp: 100.0,
        ..Default::default()
    })
}

fn unorm_texel(rgba: [f32; 4]) -> [u8; 4] {
    rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Karis' analytic approximation of the split-sum environment BRDF.
/// Returns the (scale, bias) applied to F0.
pub fn env_brdf_approx(n_dot_v: f32, roughness: f32) -> (f32, f32) {
    let c0 = [-1.0, -0.0275, -0.572, 0.022];
    let c1 = [1.0, 0.0425, 1.04, -0.04];
    let r = [
        roughness * c0[0] + c1[0],
        roughness * c0[1] + c1[1],
        roughness * c0[2] + c1[2],
        roughness * c0[3] + c1[3],
    ];
    let a004 = (r[0] * r[0]).min((-9.28 * n_dot_v).exp2()) * r[0] + r[1];
    let scale = a004 * -1.04 + r[2];
    let bias = a004 * 1.04 + r[3];
    (scale.clamp(0.0, 1.0), bias.clamp(0.0, 1.0))
}

fn brdf_lut_texels(size: u32) -> Vec<u8> {
    let mut texels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (scale, bias) = env_brdf_approx(n_dot_v, roughness);
            texels.extend_from_slice(&unorm_texel([scale, bias, 0.0, 1.0]));
        }
    }
    texels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unorm_texel_clamps() {
        assert_eq!(unorm_texel([0.0, 1.0, 2.0, -1.0]), [0, 255, 255, 0]);
        assert_eq!(unorm_texel([0.5, 0.5, 0.5, 0.5]), [128, 128, 128, 128]);
    }

    #[test]
    fn test_env_brdf_smooth_grazing_reflects_more() {
        let (head_on_scale, head_on_bias) = env_brdf_approx(1.0, 0.0);
        let (grazing_scale, grazing_bias) = env_brdf_approx(0.05, 0.0);
        assert!(grazing_bias > head_on_bias);
        assert!(head_on_scale > grazing_scale);
        assert!(head_on_scale + head_on_bias <= 1.0 + 1e-4);
    }

    #[test]
    fn test_brdf_lut_size() {
        assert_eq!(brdf_lut_texels(4).len(), 4 * 4 * 4);
    }

    #[test]
    fn test_clamp_extent() {
        assert_eq!(clamp_extent((8192, 600), 4096), (4096, 600));
        assert_eq!(clamp_extent((0, 5000), 4096), (1, 4096));
        assert_eq!(clamp_extent((800, 600), 0), (1, 1));
    }
}
