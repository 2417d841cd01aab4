//! Window-facing half of the renderer
//!
//! Owns the wgpu surface, device and queue, drives [`SceneRenderer`] every
//! frame and copies its tonemapped output onto the swapchain image before
//! the UI overlay is drawn on top.

use std::sync::Arc;

use anyhow::Context;
use wgpu::TextureFormat;

use crate::gfx::resources::texture_resource::{clamp_extent, MAX_TEXTURE_DIMENSION};
use crate::gfx::scene::Scene;
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
};

use super::pipeline_manager::PipelineConfig;
use super::renderer::{RendererOptions, SceneRenderer};

const PRESENT_PIPELINE: &str = "Present";

/// Core rendering engine managing the window surface and the per-frame
/// submission.
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    renderer: SceneRenderer,
    present_layout: BindGroupLayoutWithDesc,
    /// Rebuilt whenever the renderer's targets are recreated
    present_bind_group: Option<(u64, wgpu::BindGroup)>,
}

impl RenderEngine {
    /// Creates the surface, device and scene renderer for `window`.
    ///
    /// Line polygon mode is requested when the adapter has it so the
    /// wireframe render mode can draw real edges.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        vsync: bool,
        options: RendererOptions,
    ) -> anyhow::Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request adapter")?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features,
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: MAX_TEXTURE_DIMENSION,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request a device")?;
        // Validation errors outside an error scope are logged, never fatal.
        device.on_uncaptured_error(Box::new(|error| {
            log::error!("Uncaptured wgpu error: {}", error);
        }));
        let device = Arc::new(device);
        let queue = Arc::new(queue);
        let (width, height) = clamp_extent((width, height), device.limits().max_texture_dimension_2d);

        let surface_capabilities = surface.get_capabilities(&adapter);
        // Tonemapping applies gamma itself, so present to a linear format.
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("Surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let options = RendererOptions {
            size: (config.width, config.height),
            ..options
        };
        let mut renderer = SceneRenderer::new(Arc::clone(&device), Arc::clone(&queue), &options);

        let present_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
            .create(&device, "Present Bind Group Layout");

        let manager = &mut renderer.pipeline_manager;
        if let Err(error) = manager.load_shader("present", include_str!("shaders/present.wgsl")) {
            log::error!("{}", error);
        }
        manager.register_pipeline(
            PRESENT_PIPELINE,
            PipelineConfig::default_with_shader("present")
                .with_label("Present")
                .with_bind_group_layouts(vec![present_layout.layout.clone()])
                .with_no_vertex_buffers()
                .with_cull_mode(None)
                .with_color_format(format),
        );
        if manager.get_pipeline(PRESENT_PIPELINE).is_none() {
            log::error!("Present pipeline could not be created");
        }

        Ok(Self {
            surface,
            device,
            queue,
            config,
            format,
            renderer,
            present_layout,
            present_bind_group: None,
        })
    }

    /// Renders `scene`, presents it and lets `ui_callback` record its
    /// overlay into the same encoder before submission.
    ///
    /// A lost or outdated surface is reconfigured and the frame dropped.
    pub fn render_frame<F>(&mut self, scene: &mut Scene, ui_callback: Option<F>) -> Result<(), wgpu::SurfaceError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer
            .render_frame(scene, (self.config.width, self.config.height));
        self.refresh_present_bind_group();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let (Some(pipeline), Some((_, bind_group))) = (
                self.renderer.pipeline_manager.pipeline(PRESENT_PIPELINE),
                self.present_bind_group.as_ref(),
            ) {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        if let Some(ui_callback) = ui_callback {
            ui_callback(&self.device, &self.queue, &mut encoder, &surface_texture_view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn refresh_present_bind_group(&mut self) {
        let generation = self.renderer.targets().generation();
        if matches!(&self.present_bind_group, Some((cached, _)) if *cached == generation) {
            return;
        }
        let output = self.renderer.output();
        let bind_group = BindGroupBuilder::new(&self.present_layout)
            .texture(&output.view)
            .sampler(&output.sampler)
            .create(&self.device, "Present Bind Group");
        self.present_bind_group = Some((generation, bind_group));
    }

    /// Reconfigures the surface. Zero sizes (minimised windows) are ignored
    /// and larger than the device allows are clamped.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) =
            clamp_extent((width, height), self.device.limits().max_texture_dimension_2d);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        let mode = present_mode(vsync);
        if self.config.present_mode != mode {
            self.config.present_mode = mode;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn renderer(&self) -> &SceneRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut SceneRenderer {
        &mut self.renderer
    }

    /// Returns current surface dimensions
    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Used for creating compatible render targets and UI systems.
    pub fn surface_format(&self) -> TextureFormat {
        self.format
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_follows_vsync() {
        assert_eq!(present_mode(true), wgpu::PresentMode::AutoVsync);
        assert_eq!(present_mode(false), wgpu::PresentMode::AutoNoVsync);
    }
}
