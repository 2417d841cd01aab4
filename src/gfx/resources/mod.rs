//! GPU resource management
//!
//! Uniform block layouts, the bind groups built from them, and the textures
//! the passes render into or sample from.

pub mod environment;
pub mod frame_bindings;
pub mod frame_uniforms;
pub mod texture_resource;

pub use environment::Environment;
pub use frame_bindings::{FrameBindings, SceneTextureBindings};
pub use frame_uniforms::{
    pack_lights, pack_probes, pack_shadow_matrices, AtlasExtents, CameraUniform, LightsUniform,
    ProbesUniform, ShadowUniform,
};
pub use texture_resource::TextureResource;
