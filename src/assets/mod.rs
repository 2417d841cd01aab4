//! Model loading and the shared resource cache behind it.

pub mod cache;
pub mod manager;

pub use cache::{composite_key, ResourceCache};
pub use manager::{AssetManager, BUILTIN_CUBE, BUILTIN_PLANE, BUILTIN_SPHERE};
