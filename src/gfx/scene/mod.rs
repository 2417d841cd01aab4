//! # Scene Graph
//!
//! Nodes own their children, carry a local [`Transform`] and cache a world
//! matrix that is only recomputed when the node or an ancestor changed.
//! [`Scene`] wraps the tree together with the camera, lights and render
//! flags, and is what the renderer and the editor panels operate on.

pub mod node;
pub mod object;
pub mod scene;
pub mod transform;
pub mod vertex;

pub use node::{NodeId, NodeIdAllocator, SceneNode, SphereCollider};
pub use object::{DrawModel, Material, Mesh, Model, ObjectGpuResources, ObjectUniform, RenderObject};
pub use scene::{PendingLoad, Scene};
pub use transform::Transform;
pub use vertex::Vertex3D;
