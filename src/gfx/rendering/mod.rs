//! Core rendering functionality
//!
//! Frame passes, the pipelines and offscreen targets they use, the shadow
//! atlases and the surface-facing engine that presents the result.

pub mod pipeline_manager;
pub mod render_engine;
pub mod render_targets;
pub mod renderer;
pub mod settings;
pub mod shadow_atlas;
pub mod shadow_pass;

// Re-export main types
pub use pipeline_manager::{DepthConfig, PipelineConfig, PipelineManager, PipelineStats};
pub use render_engine::RenderEngine;
pub use render_targets::RenderTargets;
pub use renderer::{RendererOptions, SceneRenderer};
pub use settings::{RenderMode, RenderSettings};
pub use shadow_atlas::ShadowAtlas;
