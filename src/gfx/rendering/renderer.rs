//! Per-frame scene rendering into offscreen targets.
//!
//! Passes run strictly in this order every frame:
//!
//! 1. shadow: every packed caster renders depth into its own target with
//!    front faces culled, then the result is copied into its atlas layer;
//! 2. light: frustum-culled scene into the HDR target, then the skybox;
//! 3. outline: stencil mask of the selection, then a scaled fringe drawn
//!    where the mask is absent (only when something is selected);
//! 4. resolve: multisampled colour resolves at the end of the last pass
//!    that draws into it;
//! 5. tonemap: exposure and gamma into the output texture.
//!
//! A pass that is missing its pipeline is skipped with a log message and
//! the frame carries on.

use std::path::Path;
use std::sync::Arc;

use crate::gfx::lighting::{LightType, SHADOW_DEPTH_FORMAT};
use crate::gfx::picking::is_culled;
use crate::gfx::resources::{
    frame_uniforms::{AtlasExtents, OutlineUniform, PostProcessUniform},
    Environment, FrameBindings, SceneTextureBindings, TextureResource,
};
use crate::gfx::scene::{DrawModel, ObjectUniform, Scene, SceneNode};
use crate::wgpu_utils::{
    binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
    binding_types,
    uniform_buffer::UniformBuffer,
};

use super::pipeline_manager::{DepthConfig, PipelineConfig, PipelineManager};
use super::render_targets::RenderTargets;
use super::settings::RenderMode;
use super::shadow_atlas::ShadowAtlas;
use super::shadow_pass::{plan_shadow_jobs, ShadowJob, ShadowSlots, MAX_SHADOW_SLOTS};

/// Names the renderer registers its pipelines under.
pub mod pipelines {
    pub const SHADOW_DEPTH: &str = "ShadowDepth";
    pub const POINT_SHADOW_DEPTH: &str = "PointShadowDepth";
    pub const SHADOW_BLIT: &str = "ShadowBlit";
    pub const LIGHT: &str = "Light";
    pub const LIGHT_WIREFRAME: &str = "LightWireframe";
    pub const SKYBOX: &str = "Skybox";
    pub const OUTLINE_MASK: &str = "OutlineMask";
    pub const OUTLINE_FRINGE: &str = "OutlineFringe";
    pub const TONE_MAP: &str = "ToneMap";
}

/// WGSL sources compiled at startup, by shader name.
pub const BUILTIN_SHADERS: [(&str, &str); 7] = [
    ("shadow_depth", include_str!("shaders/shadow_depth.wgsl")),
    ("point_shadow", include_str!("shaders/point_shadow.wgsl")),
    ("shadow_blit", include_str!("shaders/shadow_blit.wgsl")),
    ("pbr", include_str!("shaders/pbr.wgsl")),
    ("skybox", include_str!("shaders/skybox.wgsl")),
    ("outline", include_str!("shaders/outline.wgsl")),
    ("tonemap", include_str!("shaders/tonemap.wgsl")),
];

const OUTLINE_STENCIL_REF: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct RendererOptions {
    pub size: (u32, u32),
    pub sample_count: u32,
    pub clear_color: [f32; 4],
    pub environment_color: [f32; 3],
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            size: (1280, 720),
            sample_count: 4,
            clear_color: [0.08, 0.08, 0.1, 1.0],
            environment_color: [0.25, 0.27, 0.3],
        }
    }
}

struct Layouts<'a> {
    frame: &'a BindGroupLayoutWithDesc,
    scene_textures: &'a BindGroupLayoutWithDesc,
    object: &'a BindGroupLayoutWithDesc,
    shadow_slot: &'a BindGroupLayoutWithDesc,
    shadow_blit: &'a BindGroupLayoutWithDesc,
    outline: &'a BindGroupLayoutWithDesc,
    post: &'a BindGroupLayoutWithDesc,
}

fn outline_stencil(compare: wgpu::CompareFunction, pass_op: wgpu::StencilOperation, write_mask: u32) -> wgpu::StencilState {
    let face = wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask,
    }
}

fn register_pipelines(
    manager: &mut PipelineManager,
    layouts: &Layouts,
    sample_count: u32,
    wireframe_supported: bool,
) {
    let scene_depth = DepthConfig::new(TextureResource::DEPTH_STENCIL_FORMAT);

    manager.register_pipeline(
        pipelines::SHADOW_DEPTH,
        PipelineConfig::default_with_shader("shadow_depth")
            .with_label("Shadow Depth")
            .with_bind_group_layouts(vec![
                layouts.shadow_slot.layout.clone(),
                layouts.object.layout.clone(),
            ])
            .with_vertex_only()
            .with_cull_mode(Some(wgpu::Face::Front))
            .with_depth(DepthConfig::new(SHADOW_DEPTH_FORMAT)),
    );

    manager.register_pipeline(
        pipelines::POINT_SHADOW_DEPTH,
        PipelineConfig::default_with_shader("point_shadow")
            .with_label("Point Shadow Depth")
            .with_bind_group_layouts(vec![
                layouts.shadow_slot.layout.clone(),
                layouts.object.layout.clone(),
            ])
            .with_color_targets(Vec::new())
            .with_cull_mode(Some(wgpu::Face::Front))
            .with_depth(DepthConfig::new(SHADOW_DEPTH_FORMAT)),
    );

    manager.register_pipeline(
        pipelines::SHADOW_BLIT,
        PipelineConfig::default_with_shader("shadow_blit")
            .with_label("Shadow Atlas Blit")
            .with_bind_group_layouts(vec![layouts.shadow_blit.layout.clone()])
            .with_no_vertex_buffers()
            .with_color_targets(Vec::new())
            .with_cull_mode(None)
            .with_depth(DepthConfig::new(SHADOW_DEPTH_FORMAT).with_compare(wgpu::CompareFunction::Always)),
    );

    let light = PipelineConfig::default_with_shader("pbr")
        .with_label("Light Pass")
        .with_bind_group_layouts(vec![
            layouts.frame.layout.clone(),
            layouts.scene_textures.layout.clone(),
            layouts.object.layout.clone(),
        ])
        .with_color_format(TextureResource::HDR_FORMAT)
        .with_depth(scene_depth.clone())
        .with_sample_count(sample_count);
    if wireframe_supported {
        manager.register_pipeline(
            pipelines::LIGHT_WIREFRAME,
            light
                .clone()
                .with_label("Light Pass Wireframe")
                .with_polygon_mode(wgpu::PolygonMode::Line)
                .with_cull_mode(None),
        );
    }
    manager.register_pipeline(pipelines::LIGHT, light);

    manager.register_pipeline(
        pipelines::SKYBOX,
        PipelineConfig::default_with_shader("skybox")
            .with_label("Skybox")
            .with_bind_group_layouts(vec![
                layouts.frame.layout.clone(),
                layouts.scene_textures.layout.clone(),
            ])
            .with_no_vertex_buffers()
            .with_cull_mode(None)
            .with_color_format(TextureResource::HDR_FORMAT)
            .with_depth(
                scene_depth
                    .clone()
                    .with_write(false)
                    .with_compare(wgpu::CompareFunction::LessEqual),
            )
            .with_sample_count(sample_count),
    );

    let outline = PipelineConfig::default_with_shader("outline")
        .with_bind_group_layouts(vec![
            layouts.frame.layout.clone(),
            layouts.outline.layout.clone(),
            layouts.object.layout.clone(),
        ])
        .with_color_format(TextureResource::HDR_FORMAT)
        .with_sample_count(sample_count);

    manager.register_pipeline(
        pipelines::OUTLINE_MASK,
        outline
            .clone()
            .with_label("Outline Mask")
            .with_vertex_entry("vs_mask")
            .with_color_write_mask(wgpu::ColorWrites::empty())
            .with_depth(
                scene_depth
                    .clone()
                    .with_write(false)
                    .with_compare(wgpu::CompareFunction::Always)
                    .with_stencil(outline_stencil(
                        wgpu::CompareFunction::Always,
                        wgpu::StencilOperation::Replace,
                        0xff,
                    )),
            ),
    );

    manager.register_pipeline(
        pipelines::OUTLINE_FRINGE,
        outline
            .with_label("Outline Fringe")
            .with_vertex_entry("vs_fringe")
            .with_depth(
                scene_depth
                    .with_write(false)
                    .with_compare(wgpu::CompareFunction::Always)
                    .with_stencil(outline_stencil(
                        wgpu::CompareFunction::NotEqual,
                        wgpu::StencilOperation::Keep,
                        0x00,
                    )),
            ),
    );

    manager.register_pipeline(
        pipelines::TONE_MAP,
        PipelineConfig::default_with_shader("tonemap")
            .with_label("Tone Map")
            .with_bind_group_layouts(vec![layouts.post.layout.clone()])
            .with_no_vertex_buffers()
            .with_cull_mode(None)
            .with_color_format(TextureResource::OUTPUT_FORMAT),
    );
}

/// Nodes whose object has GPU resources, in traversal order.
fn drawable_nodes(scene: &Scene) -> Vec<&SceneNode> {
    let mut nodes = Vec::new();
    scene.root().walk(&mut |node, _| {
        if node.object().and_then(|object| object.gpu()).is_some() {
            nodes.push(node);
        }
    });
    nodes
}

fn draw_nodes(pass: &mut wgpu::RenderPass<'_>, group: u32, nodes: &[&SceneNode]) {
    for node in nodes {
        if let Some(object) = node.object() {
            if let Some(gpu) = object.gpu() {
                pass.set_bind_group(group, gpu.bind_group(), &[]);
                pass.draw_model(object.model());
            }
        }
    }
}

pub struct SceneRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pub pipeline_manager: PipelineManager,
    frame: FrameBindings,
    scene_textures: SceneTextureBindings,
    object_layout: BindGroupLayoutWithDesc,
    atlas: ShadowAtlas,
    shadow_slots: ShadowSlots,
    environment: Environment,
    outline_ubo: UniformBuffer<OutlineUniform>,
    outline_bind_group: wgpu::BindGroup,
    post_ubo: UniformBuffer<PostProcessUniform>,
    post_layout: BindGroupLayoutWithDesc,
    post_bind_group: wgpu::BindGroup,
    targets: RenderTargets,
    clear_color: wgpu::Color,
    wireframe_supported: bool,
    wireframe_warned: bool,
}

impl SceneRenderer {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, options: &RendererOptions) -> Self {
        let frame = FrameBindings::new(&device);
        let atlas = ShadowAtlas::new(&device);
        let environment = Environment::uniform_color(&device, &queue, options.environment_color);
        let mut scene_textures = SceneTextureBindings::new(&device);
        scene_textures.rebuild(&device, &atlas, &environment);

        let object_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(&device, "Object Bind Group Layout");
        let shadow_slots = ShadowSlots::new(&device);

        let outline_layout = BindGroupLayoutBuilder::new()
            .next_binding_rendering(binding_types::uniform())
            .create(&device, "Outline Bind Group Layout");
        let outline_ubo = UniformBuffer::new_with_data(
            &device,
            &OutlineUniform {
                color: [1.0, 0.55, 0.1, 1.0],
                scale: [1.03, 0.0, 0.0, 0.0],
            },
        );
        let outline_bind_group = BindGroupBuilder::new(&outline_layout)
            .resource(outline_ubo.binding_resource())
            .create(&device, "Outline Bind Group");

        let post_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
            .next_binding_fragment(binding_types::uniform())
            .create(&device, "Post Process Bind Group Layout");
        let post_ubo = UniformBuffer::new_with_data(
            &device,
            &PostProcessUniform {
                params: [1.0, 2.2, 0.0, 0.0],
            },
        );

        let targets = RenderTargets::new(&device, options.size, options.sample_count);
        let post_bind_group = Self::create_post_bind_group(&device, &post_layout, &targets, &post_ubo);

        let wireframe_supported = device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        let mut pipeline_manager = PipelineManager::new(Arc::clone(&device));
        for (name, source) in BUILTIN_SHADERS {
            // Failures are logged by the manager; the pass using it is skipped.
            let _ = pipeline_manager.load_shader(name, source);
        }
        register_pipelines(
            &mut pipeline_manager,
            &Layouts {
                frame: frame.layout(),
                scene_textures: scene_textures.layout(),
                object: &object_layout,
                shadow_slot: shadow_slots.layout(),
                shadow_blit: atlas.blit_layout(),
                outline: &outline_layout,
                post: &post_layout,
            },
            targets.sample_count(),
            wireframe_supported,
        );
        if let Err(errors) = pipeline_manager.create_all_pipelines() {
            for error in errors {
                log::error!("{}", error);
            }
        }

        let [r, g, b, a] = options.clear_color.map(f64::from);
        Self {
            device,
            queue,
            pipeline_manager,
            frame,
            scene_textures,
            object_layout,
            atlas,
            shadow_slots,
            environment,
            outline_ubo,
            outline_bind_group,
            post_ubo,
            post_layout,
            post_bind_group,
            targets,
            clear_color: wgpu::Color { r, g, b, a },
            wireframe_supported,
            wireframe_warned: false,
        }
    }

    fn create_post_bind_group(
        device: &wgpu::Device,
        layout: &BindGroupLayoutWithDesc,
        targets: &RenderTargets,
        ubo: &UniformBuffer<PostProcessUniform>,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(layout)
            .texture(targets.hdr_view())
            .sampler(targets.hdr_sampler())
            .resource(ubo.binding_resource())
            .create(device, "Post Process Bind Group")
    }

    /// Replaces the IBL inputs of the light pass and skybox.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
        self.scene_textures
            .rebuild(&self.device, &self.atlas, &self.environment);
    }

    /// Recompiles every shader with a `<name>.wgsl` file in `dir` and
    /// rebuilds the pipelines using it. Returns the reloaded shader names.
    pub fn reload_shaders(&mut self, dir: &Path) -> Vec<String> {
        let reloaded = self.pipeline_manager.reload_from_dir(dir);
        if reloaded.is_empty() {
            log::warn!("No shaders reloaded from {}", dir.display());
        }
        reloaded
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn output(&self) -> &TextureResource {
        self.targets.output()
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn wireframe_supported(&self) -> bool {
        self.wireframe_supported
    }

    /// Renders `scene` into the output texture at `viewport` size and
    /// returns it. The scene graph and shadow matrices are expected to be
    /// up to date.
    pub fn render_frame(&mut self, scene: &mut Scene, viewport: (u32, u32)) -> &TextureResource {
        if self.targets.ensure_size(&self.device, viewport) {
            log::debug!("Render targets resized to {}x{}", viewport.0, viewport.1);
            self.post_bind_group =
                Self::create_post_bind_group(&self.device, &self.post_layout, &self.targets, &self.post_ubo);
        }

        let settings = scene.settings.clone();
        self.outline_ubo.update_content(
            &self.queue,
            OutlineUniform {
                color: settings.outline_color,
                scale: [settings.outline_scale, 0.0, 0.0, 0.0],
            },
        );
        self.post_ubo.update_content(
            &self.queue,
            PostProcessUniform {
                params: [settings.exposure, settings.gamma, 0.0, 0.0],
            },
        );

        if self.atlas.resize(&self.device, AtlasExtents::for_registry(&scene.lights)) {
            self.scene_textures
                .rebuild(&self.device, &self.atlas, &self.environment);
        }
        self.frame.update(&self.queue, scene, self.atlas.extents());
        self.prepare_objects(scene);

        let shadow_jobs = if settings.shadows_enabled {
            self.prepare_shadow_targets(scene);
            plan_shadow_jobs(&scene.lights)
        } else {
            Vec::new()
        };
        self.shadow_slots.write(&self.queue, &shadow_jobs);
        let wireframe = self.use_wireframe(settings.mode);

        let scene: &Scene = scene;
        let nodes = drawable_nodes(scene);
        let selected: Vec<&SceneNode> = nodes.iter().copied().filter(|n| n.is_selected()).collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });

        log::trace!("shadow pass: {} views", shadow_jobs.len());
        self.encode_shadow_pass(&mut encoder, scene, &nodes, &shadow_jobs);

        log::trace!("light pass");
        self.encode_light_pass(&mut encoder, scene, &nodes, wireframe, selected.is_empty());

        if !selected.is_empty() {
            log::trace!("outline pass: {} selected", selected.len());
            self.encode_outline_pass(&mut encoder, &selected);
        }

        log::trace!("tonemap pass");
        self.encode_tonemap_pass(&mut encoder);

        self.queue.submit(std::iter::once(encoder.finish()));
        self.targets.output()
    }

    /// Uploads meshes and per-object uniforms, creating them on first use.
    fn prepare_objects(&self, scene: &mut Scene) {
        let (device, queue, layout) = (&*self.device, &*self.queue, &self.object_layout);
        scene.root_mut().walk_mut(&mut |node| {
            let world = node.world_matrix();
            let selected = node.is_selected();
            if let Some(object) = node.object_mut() {
                let content = ObjectUniform::new(world, object.material(), selected);
                object.prepare_gpu(device, queue, layout, content);
            }
        });
    }

    fn prepare_shadow_targets(&self, scene: &mut Scene) {
        let blit_layout = self.atlas.blit_layout();
        for light_type in LightType::ALL {
            for light in scene.lights.packed_mut(light_type) {
                if light.casts_shadows {
                    light.shadow_mut().ensure_target(&self.device, blit_layout);
                }
            }
        }
    }

    fn use_wireframe(&mut self, mode: RenderMode) -> bool {
        if mode != RenderMode::Wireframe {
            return false;
        }
        if !self.wireframe_supported && !self.wireframe_warned {
            log::warn!("Wireframe mode needs POLYGON_MODE_LINE; drawing filled");
            self.wireframe_warned = true;
        }
        self.wireframe_supported
    }

    fn encode_shadow_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        nodes: &[&SceneNode],
        jobs: &[ShadowJob],
    ) {
        if jobs.is_empty() {
            return;
        }
        let (Some(depth), Some(point_depth), Some(blit)) = (
            self.pipeline_manager.pipeline(pipelines::SHADOW_DEPTH),
            self.pipeline_manager.pipeline(pipelines::POINT_SHADOW_DEPTH),
            self.pipeline_manager.pipeline(pipelines::SHADOW_BLIT),
        ) else {
            log::error!("Shadow pipelines unavailable, skipping shadow pass");
            return;
        };

        for job in jobs.iter().take(MAX_SHADOW_SLOTS) {
            let Some(light) = scene.lights.packed(job.light_type).nth(job.light_index) else {
                continue;
            };
            let Some(target) = light.shadow().target() else {
                continue;
            };
            let (Some(caster_view), Some(blit_source), Some(atlas_view)) = (
                target.layer_view(job.caster_layer),
                target.blit_source(job.caster_layer),
                self.atlas.array(job.light_type).layer_view(job.atlas_layer),
            ) else {
                continue;
            };
            let (width, height) = (job.resolution.0 as f32, job.resolution.1 as f32);

            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Shadow Depth Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: caster_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);
                pass.set_pipeline(if job.light_type == LightType::Point {
                    point_depth
                } else {
                    depth
                });
                pass.set_bind_group(
                    0,
                    self.shadow_slots.bind_group(),
                    &[self.shadow_slots.offset(job.slot)],
                );
                draw_nodes(&mut pass, 1, nodes);
            }

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Atlas Copy"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: atlas_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);
            pass.set_pipeline(blit);
            pass.set_bind_group(0, blit_source, &[]);
            pass.draw(0..3, 0..1);
        }
    }

    fn encode_light_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        nodes: &[&SceneNode],
        wireframe: bool,
        resolve_now: bool,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Light Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.targets.color_view(),
                resolve_target: if resolve_now {
                    self.targets.resolve_view()
                } else {
                    None
                },
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.targets.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let Some(scene_textures) = self.scene_textures.bind_group() else {
            log::error!("Scene texture bindings missing, skipping light pass draws");
            return;
        };
        pass.set_bind_group(0, self.frame.bind_group(), &[]);
        pass.set_bind_group(1, scene_textures, &[]);

        let pipeline_name = if wireframe {
            pipelines::LIGHT_WIREFRAME
        } else {
            pipelines::LIGHT
        };
        if let Some(pipeline) = self.pipeline_manager.pipeline(pipeline_name) {
            pass.set_pipeline(pipeline);
            let frustum = scene.frustum();
            let visible: Vec<&SceneNode> = nodes
                .iter()
                .copied()
                .filter(|node| !is_culled(node, frustum))
                .collect();
            draw_nodes(&mut pass, 2, &visible);
        } else {
            log::error!("Pipeline '{}' unavailable, scene not drawn", pipeline_name);
        }

        if scene.settings.show_skybox {
            if let Some(skybox) = self.pipeline_manager.pipeline(pipelines::SKYBOX) {
                pass.set_pipeline(skybox);
                pass.draw(0..3, 0..1);
            }
        }
    }

    fn encode_outline_pass(&self, encoder: &mut wgpu::CommandEncoder, selected: &[&SceneNode]) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Selection Outline Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.targets.color_view(),
                resolve_target: self.targets.resolve_view(),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.targets.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let (Some(mask), Some(fringe)) = (
            self.pipeline_manager.pipeline(pipelines::OUTLINE_MASK),
            self.pipeline_manager.pipeline(pipelines::OUTLINE_FRINGE),
        ) else {
            log::error!("Outline pipelines unavailable, selection not outlined");
            return;
        };

        pass.set_bind_group(0, self.frame.bind_group(), &[]);
        pass.set_bind_group(1, &self.outline_bind_group, &[]);
        pass.set_stencil_reference(OUTLINE_STENCIL_REF);

        pass.set_pipeline(mask);
        draw_nodes(&mut pass, 2, selected);

        pass.set_pipeline(fringe);
        draw_nodes(&mut pass, 2, selected);
    }

    fn encode_tonemap_pass(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Tone Map Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.output().view,
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

        let Some(pipeline) = self.pipeline_manager.pipeline(pipelines::TONE_MAP) else {
            log::error!("Tone map pipeline unavailable, output left black");
            return;
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.post_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_stencil_states() {
        let mask = outline_stencil(wgpu::CompareFunction::Always, wgpu::StencilOperation::Replace, 0xff);
        assert_eq!(mask.front.pass_op, wgpu::StencilOperation::Replace);
        assert_eq!(mask.back, mask.front);
        assert!(mask.is_enabled());

        let fringe = outline_stencil(wgpu::CompareFunction::NotEqual, wgpu::StencilOperation::Keep, 0x00);
        assert_eq!(fringe.front.compare, wgpu::CompareFunction::NotEqual);
        assert_eq!(fringe.write_mask, 0);
    }

    #[test]
    fn test_builtin_shaders_define_their_entry_points() {
        for (name, source) in BUILTIN_SHADERS {
            assert!(!source.trim().is_empty(), "{} is empty", name);
            assert!(source.contains("fn vs_") , "{} has no vertex entry", name);
        }
        let outline = BUILTIN_SHADERS
            .iter()
            .find(|(name, _)| *name == "outline")
            .map(|(_, source)| *source)
            .unwrap();
        assert!(outline.contains("fn vs_mask"));
        assert!(outline.contains("fn vs_fringe"));
    }

    #[test]
    fn test_drawable_nodes_skip_unprepared_objects() {
        use crate::assets::{AssetManager, BUILTIN_CUBE};
        use crate::gfx::scene::NodeId;

        let mut scene = Scene::default();
        let mut assets = AssetManager::new();
        let model = assets.load_model(BUILTIN_CUBE).unwrap();
        scene.add_object_node(NodeId::ROOT, "Cube", model).unwrap();
        assert!(drawable_nodes(&scene).is_empty());
    }
}
