//! # Editor User Interface
//!
//! Dear ImGui panels drawn over the rendered viewport.
//!
//! - [`UiManager`] - imgui context, winit platform glue and wgpu renderer
//! - [`EditorPanels`] - outliner, inspector, lights and render settings
//!
//! When imgui wants the mouse or keyboard, the application keeps those
//! events away from the camera controller and picking.

pub mod manager;
pub mod panel;

pub use manager::UiManager;
pub use panel::{outline_rows, EditorPanels, OutlineRow, PanelAction, TransformFields};
