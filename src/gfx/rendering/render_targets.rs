//! Offscreen attachments of the light, resolve and tonemap passes.

use crate::gfx::resources::texture_resource::TextureResource;

/// HDR colour (multisampled when `sample_count > 1`), its single-sampled
/// resolve, the depth-stencil buffer and the tonemapped output handed to
/// the embedding editor.
pub struct RenderTargets {
    size: (u32, u32),
    sample_count: u32,
    generation: u64,
    color: TextureResource,
    resolve: Option<TextureResource>,
    depth: TextureResource,
    output: TextureResource,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, size: (u32, u32), sample_count: u32) -> Self {
        let size = (size.0.max(1), size.1.max(1));
        let sample_count = sample_count.max(1);

        // Incomplete attachments are reported, not fatal: the frame then
        // renders into whatever was created.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color = TextureResource::create_render_target(
            device,
            size,
            TextureResource::HDR_FORMAT,
            sample_count,
            "HDR Color",
        );
        let resolve = (sample_count > 1).then(|| {
            TextureResource::create_render_target(
                device,
                size,
                TextureResource::HDR_FORMAT,
                1,
                "HDR Resolve",
            )
        });
        let depth = TextureResource::create_depth_stencil(device, size, sample_count, "Scene Depth");
        let output = TextureResource::create_render_target(
            device,
            size,
            TextureResource::OUTPUT_FORMAT,
            1,
            "Tonemapped Output",
        );
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!(
                "Render targets {}x{} ({}x MSAA) are incomplete: {}",
                size.0,
                size.1,
                sample_count,
                error
            );
        }

        Self {
            size,
            sample_count,
            generation: 0,
            color,
            resolve,
            depth,
            output,
        }
    }

    /// Recreates every attachment if `size` differs. Returns true when the
    /// targets changed.
    pub fn ensure_size(&mut self, device: &wgpu::Device, size: (u32, u32)) -> bool {
        let size = (size.0.max(1), size.1.max(1));
        if size == self.size {
            return false;
        }
        let generation = self.generation + 1;
        *self = Self::new(device, size, self.sample_count);
        self.generation = generation;
        true
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Bumped every time the attachments are recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color.view
    }

    /// Where the last pass drawing into the colour target resolves to.
    pub fn resolve_view(&self) -> Option<&wgpu::TextureView> {
        self.resolve.as_ref().map(|t| &t.view)
    }

    /// Single-sampled HDR image the tonemap pass reads.
    pub fn hdr_view(&self) -> &wgpu::TextureView {
        self.resolve_view().unwrap_or(&self.color.view)
    }

    pub fn hdr_sampler(&self) -> &wgpu::Sampler {
        &self.color.sampler
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }

    pub fn output(&self) -> &TextureResource {
        &self.output
    }
}
