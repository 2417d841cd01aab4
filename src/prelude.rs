//! # Trellis Prelude
//!
//! Commonly used types in one import:
//!
//! ```no_run
//! use trellis::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut app = EditorApp::new(EditorConfig::default())?;
//!     let scene = app.scene_mut();
//!     scene.queue_model_load(BUILTIN_CUBE, NodeId::ROOT);
//!     scene.add_light(Light::directional(Vector3::new(-0.3, -1.0, -0.2), 2048));
//!     app.run()
//! }
//! ```

pub use crate::app::EditorApp;
pub use crate::config::EditorConfig;
pub use crate::error::{AssetError, ConfigError, SceneError, ShadowError};

pub use crate::assets::{AssetManager, BUILTIN_CUBE, BUILTIN_PLANE, BUILTIN_SPHERE};
pub use crate::gfx::camera::{Camera, CameraController};
pub use crate::gfx::lighting::{Light, LightType, ReflectionProbe};
pub use crate::gfx::rendering::{RenderMode, RenderSettings};
pub use crate::gfx::scene::{Material, NodeId, Scene, SceneNode, Transform};

// Re-export common external dependencies
pub use cgmath::{Deg, InnerSpace, Point3, Vector3};
