//! Application shell: window, event loop and the per-frame editor cycle.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use cgmath::Point3;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::assets::AssetManager;
use crate::config::EditorConfig;
use crate::gfx::{
    camera::{Camera, CameraController},
    rendering::{RenderEngine, RendererOptions},
    scene::Scene,
};
use crate::ui::{EditorPanels, PanelAction, UiManager};

pub struct EditorApp {
    event_loop: Option<EventLoop<()>>,
    state: EditorState,
}

struct EditorState {
    config: EditorConfig,
    window: Option<Arc<Window>>,
    engine: Option<RenderEngine>,
    ui: Option<UiManager>,
    panels: Option<EditorPanels>,
    scene: Scene,
    assets: AssetManager,
    controller: CameraController,
    last_frame: Instant,
    fatal: Option<anyhow::Error>,
}

impl EditorApp {
    pub fn new(config: EditorConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let aspect = config.window.width as f32 / config.window.height.max(1) as f32;
        let mut scene = Scene::new(Camera::new(Point3::new(0.0, 3.0, 8.0), -90.0, -15.0, aspect));
        scene.settings = config.render_settings();

        Ok(Self {
            event_loop: Some(event_loop),
            state: EditorState {
                config,
                window: None,
                engine: None,
                ui: None,
                panels: None,
                scene,
                assets: AssetManager::new(),
                controller: CameraController::default(),
                last_frame: Instant::now(),
                fatal: None,
            },
        })
    }

    /// Scene edits made before `run` show up on the first frame.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.state.scene
    }

    pub fn assets_mut(&mut self) -> &mut AssetManager {
        &mut self.state.assets
    }

    /// Starts the event loop and blocks until the window closes.
    pub fn run(mut self) -> anyhow::Result<()> {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();

        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self.state)
            .context("Event loop failed")?;

        match self.state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl EditorState {
    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_config = &self.config.window;
        let window = Arc::new(
            event_loop
                .create_window(
                    WindowAttributes::default()
                        .with_title(window_config.title.clone())
                        .with_inner_size(winit::dpi::LogicalSize::new(window_config.width, window_config.height)),
                )
                .context("Failed to create window")?,
        );
        let (width, height) = window.inner_size().into();

        let options = RendererOptions {
            sample_count: self.config.render.msaa_samples,
            clear_color: self.config.render.clear_color,
            ..RendererOptions::default()
        };
        let engine = pollster::block_on(RenderEngine::new(
            Arc::clone(&window),
            width,
            height,
            window_config.vsync,
            options,
        ))?;

        let ui = UiManager::new(engine.device(), engine.queue(), engine.surface_format(), &window);
        self.panels = Some(EditorPanels::new(
            self.config.shadows.clone(),
            engine.renderer().wireframe_supported(),
        ));
        self.scene.camera.set_aspect(width as f32 / height.max(1) as f32);

        log::info!("Editor window {}x{} ready", width, height);
        self.window = Some(window);
        self.engine = Some(engine);
        self.ui = Some(ui);
        Ok(())
    }

    fn reload_shaders(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match self.config.shader_dir.as_deref() {
            Some(dir) => {
                let reloaded = engine.renderer_mut().reload_shaders(dir);
                log::info!("Reloaded {} shader(s) from {}", reloaded.len(), dir.display());
            }
            None => log::warn!("No shader_dir configured, nothing to reload"),
        }
    }

    /// UI, scene update, render and present, then the deferred loads.
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let (Some(window), Some(ui), Some(panels)) =
            (self.window.as_ref(), self.ui.as_mut(), self.panels.as_mut())
        else {
            return;
        };

        self.controller.update_camera(&mut self.scene.camera, dt);

        let scene = &mut self.scene;
        let actions = ui.build(window, |frame| panels.draw(frame, scene));
        for action in actions {
            match action {
                PanelAction::ReloadShaders => self.reload_shaders(),
            }
        }

        let (Some(engine), Some(ui)) = (self.engine.as_mut(), self.ui.as_mut()) else {
            return;
        };
        self.scene.update_scene_graph();
        self.scene.update_shadow_matrices();

        let overlay = |device: &wgpu::Device, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView| {
            ui.render(device, queue, encoder, view);
        };
        match engine.render_frame(&mut self.scene, Some(overlay)) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory, exiting");
                event_loop.exit();
            }
            Err(err) => log::warn!("Dropped frame: {}", err),
        }

        let added = self.scene.drain_pending_loads(&mut self.assets);
        if !added.is_empty() {
            log::debug!("Added {} node(s) from the load queue", added.len());
        }
    }
}

impl ApplicationHandler for EditorState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_graphics(event_loop) {
            log::error!("{:#}", err);
            self.fatal = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };

        let ui_captured = self
            .ui
            .as_mut()
            .is_some_and(|ui| ui.handle_window_event(&window, window_id, &event));

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.resize(width, height);
                }
                if width > 0 && height > 0 {
                    self.scene.camera.set_aspect(width as f32 / height as f32);
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } if !ui_captured && matches!(code, KeyCode::Escape | KeyCode::F5) => {
                if code == KeyCode::Escape {
                    event_loop.exit();
                } else {
                    self.reload_shaders();
                }
            }
            _ if ui_captured => {}
            _ => {
                if let Some(pick) = self.controller.process_window_event(&event) {
                    let Some(engine) = self.engine.as_ref() else {
                        return;
                    };
                    let (width, height) = engine.surface_size();
                    let hit = self.scene.pick(pick.position, (width as f32, height as f32), pick.multi_select);
                    log::debug!("Pick at {:?}: {:?}", pick.position, hit);
                }
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if self.ui.as_ref().is_some_and(UiManager::wants_input) {
            return;
        }
        self.controller.process_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}
