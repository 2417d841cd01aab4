//! # Geometry
//!
//! Bounding volumes used by culling and picking, and procedural primitives
//! backing the built-in models.
//!
//! - [`bounds`]: axis-aligned boxes, spheres, planes and the view frustum
//! - [`primitives`]: cube, UV sphere and plane generators

pub mod bounds;
pub mod primitives;

pub use bounds::{Aabb, BoundingSphere, Frustum, Plane};
pub use primitives::{generate_cube, generate_plane, generate_sphere};

use crate::gfx::scene::vertex::Vertex3D;

/// Generated geometry ready for upload
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub positions: Vec<[f32; 3]>,
    /// Normal vectors, one per position
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices (counter-clockwise winding seen from outside)
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves positions and normals into the renderer's vertex format.
    pub fn to_vertices(&self) -> Vec<Vertex3D> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex3D {
                position: *position,
                normal: self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            })
            .collect()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().map(|p| cgmath::Vector3::from(*p)))
    }
}
