//! Trellis
//!
//! Core of an interactive 3D scene editor built on wgpu and winit: a
//! hierarchical scene graph with cached world matrices, shadow-mapped PBR
//! rendering with selection outlines, and ray picking.

pub mod app;
pub mod assets;
pub mod config;
pub mod error;
pub mod gfx;
pub mod prelude;
pub mod ui;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::EditorApp;
pub use config::EditorConfig;
