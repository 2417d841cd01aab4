//! # Graphics Module
//!
//! Everything between the editor and the GPU: the scene graph, lights and
//! their shadow casters, the camera, picking, and the passes that turn a
//! [`Scene`] into a tonemapped image.
//!
//! ## Architecture Overview
//!
//! - **Scene Graph** ([`scene`]) - Node hierarchy with cached world matrices
//! - **Lighting** ([`lighting`]) - Light registry, shadow casters, probes
//! - **Camera** ([`camera`]) - Fly camera and its input controller
//! - **Picking** ([`picking`]) - Mouse rays against sphere colliders
//! - **Rendering** ([`rendering`]) - Shadow, light, outline and tonemap passes
//! - **Resources** ([`resources`]) - Uniform blocks, bind groups, textures
//!
//! ## Frame order
//!
//! ```no_run
//! # fn frame(scene: &mut trellis::gfx::Scene, engine: &mut trellis::gfx::RenderEngine) {
//! scene.update_scene_graph();
//! scene.update_shadow_matrices();
//! let _ = engine.render_frame(scene, None::<fn(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView)>);
//! # }
//! ```
//!
//! [`Scene`]: scene::Scene

pub mod camera;
pub mod geometry;
pub mod lighting;
pub mod picking;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::{Camera, CameraController};
pub use rendering::render_engine::RenderEngine;
pub use scene::Scene;
