use super::texture_resource::TextureResource;

/// Image-based lighting inputs of the light pass.
///
/// Baking these from an HDR panorama happens outside the editor; what lives
/// here are the resulting handles. Without a baked environment the renderer
/// uses [`Environment::uniform_color`] so every binding stays valid.
pub struct Environment {
    pub skybox: TextureResource,
    pub irradiance: TextureResource,
    pub prefilter: TextureResource,
    pub brdf_lut: TextureResource,
}

impl Environment {
    pub fn uniform_color(device: &wgpu::Device, queue: &wgpu::Queue, rgb: [f32; 3]) -> Self {
        log::debug!("Using constant environment {:?}", rgb);
        Self {
            skybox: TextureResource::create_solid_cube(device, queue, rgb, "Skybox"),
            irradiance: TextureResource::create_solid_cube(device, queue, rgb, "Irradiance"),
            prefilter: TextureResource::create_solid_cube(device, queue, rgb, "Prefiltered Environment"),
            brdf_lut: TextureResource::create_brdf_lut(device, queue),
        }
    }

    /// Replaces the handles with externally baked ones.
    pub fn from_baked(
        skybox: TextureResource,
        irradiance: TextureResource,
        prefilter: TextureResource,
        brdf_lut: TextureResource,
    ) -> Self {
        Self {
            skybox,
            irradiance,
            prefilter,
            brdf_lut,
        }
    }
}
