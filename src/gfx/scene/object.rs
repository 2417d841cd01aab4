//! Renderable payloads: shared models and their per-node instances.
//!
//! A [`Model`] is loaded once and shared through `Rc` by every node that
//! shows it. A [`RenderObject`] is the per-node instance: it mirrors the
//! node's local transform and owns the uniform buffer the draw reads from.

use std::cell::OnceCell;
use std::rc::Rc;

use cgmath::{Matrix, Matrix4, SquareMatrix, Vector3};
use wgpu::util::DeviceExt;

use super::transform::Transform;
use super::vertex::Vertex3D;
use crate::gfx::geometry::{Aabb, GeometryData};
use crate::gfx::resources::frame_uniforms::matrix_to_array;
use crate::wgpu_utils::{BindGroupBuilder, BindGroupLayoutWithDesc, UniformBuffer};

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

pub struct Mesh {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
    bounds: Aabb,
    buffers: OnceCell<MeshBuffers>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vector3::from(v.position)));
        Self {
            vertices,
            indices,
            bounds,
            buffers: OnceCell::new(),
        }
    }

    pub fn from_geometry(geometry: &GeometryData) -> Self {
        Self::new(geometry.to_vertices(), geometry.indices.clone())
    }

    /// Builds a mesh from flat position/normal arrays as produced by OBJ
    /// loaders. Normals are generated when missing or mismatched.
    pub fn from_flat(positions: &[f32], normals: &[f32], indices: Vec<u32>) -> Self {
        let generated;
        let normals: &[f32] = if normals.len() == positions.len() {
            normals
        } else {
            generated = Self::calculate_smooth_normals(positions, &indices);
            &generated
        };

        let vertices = positions
            .chunks_exact(3)
            .zip(normals.chunks_exact(3))
            .map(|(p, n)| Vertex3D {
                position: [p[0], p[1], p[2]],
                normal: [n[0], n[1], n[2]],
            })
            .collect();
        Self::new(vertices, indices)
    }

    /// Area-weighted vertex normals accumulated from adjacent faces.
    pub fn calculate_smooth_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
        let vertex_count = positions.len() / 3;
        let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); vertex_count];
        let position = |i: usize| {
            Vector3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2])
        };

        for triangle in indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            if i0.max(i1).max(i2) >= vertex_count {
                continue;
            }
            let face = (position(i1) - position(i0)).cross(position(i2) - position(i0));
            for i in [i0, i1, i2] {
                accumulated[i] += face;
            }
        }

        accumulated
            .into_iter()
            .flat_map(|n| {
                let length = (n.x * n.x + n.y * n.y + n.z * n.z).sqrt();
                if length > 0.0 {
                    [n.x / length, n.y / length, n.z / length]
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect()
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn is_uploaded(&self) -> bool {
        self.buffers.get().is_some()
    }

    /// Creates the vertex and index buffers on first use.
    pub fn ensure_uploaded(&self, device: &wgpu::Device) {
        self.buffers.get_or_init(|| MeshBuffers {
            vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&self.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
        });
    }
}

/// Metallic-roughness surface parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

/// Immutable geometry shared between every node that displays it.
pub struct Model {
    name: String,
    meshes: Vec<Mesh>,
    material: Material,
    bounds: Aabb,
}

impl Model {
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>, material: Material) -> Self {
        let bounds = meshes
            .iter()
            .map(Mesh::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Aabb::from_points(std::iter::empty()));
        Self {
            name: name.into(),
            meshes,
            material,
            bounds,
        }
    }

    pub fn from_geometry(name: impl Into<String>, geometry: &GeometryData, material: Material) -> Self {
        Self::new(name, vec![Mesh::from_geometry(geometry)], material)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn material(&self) -> Material {
        self.material
    }

    /// Local-space box around every mesh.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn ensure_uploaded(&self, device: &wgpu::Device) {
        for mesh in &self.meshes {
            mesh.ensure_uploaded(device);
        }
    }
}

/// Per-draw uniform block at group 2 of the light pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model matrix for normals
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// metallic, roughness, selected, unused
    pub material: [f32; 4],
}

impl ObjectUniform {
    pub fn new(world: Matrix4<f32>, material: &Material, selected: bool) -> Self {
        let normal_matrix = world
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity);
        Self {
            model: matrix_to_array(world),
            normal_matrix: matrix_to_array(normal_matrix),
            base_color: material.base_color,
            material: [
                material.metallic,
                material.roughness,
                if selected { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

pub struct ObjectGpuResources {
    uniform: UniformBuffer<ObjectUniform>,
    bind_group: wgpu::BindGroup,
}

impl ObjectGpuResources {
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// A model instance attached to a scene node.
pub struct RenderObject {
    model: Rc<Model>,
    material: Material,
    transform: Transform,
    gpu: Option<ObjectGpuResources>,
}

impl RenderObject {
    pub fn new(model: Rc<Model>) -> Self {
        let material = model.material();
        Self {
            model,
            material,
            transform: Transform::default(),
            gpu: None,
        }
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    /// Mirror of the owning node's local transform, refreshed by every
    /// [`SceneNode::update`](super::SceneNode::update) visit. Drawing uses
    /// the node's world matrix, not this.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn sync_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }

    pub fn local_bounds(&self) -> Aabb {
        self.model.bounds()
    }

    /// Copy sharing the same model; GPU resources are recreated on demand.
    pub fn duplicate(&self) -> Self {
        Self {
            model: Rc::clone(&self.model),
            material: self.material,
            transform: self.transform,
            gpu: None,
        }
    }

    pub fn gpu(&self) -> Option<&ObjectGpuResources> {
        self.gpu.as_ref()
    }

    /// Uploads mesh buffers and the per-object uniform, creating both on
    /// first use.
    pub fn prepare_gpu(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &BindGroupLayoutWithDesc,
        content: ObjectUniform,
    ) {
        self.model.ensure_uploaded(device);
        let gpu = self.gpu.get_or_insert_with(|| {
            let uniform = UniformBuffer::new_with_data(device, &content);
            let bind_group = BindGroupBuilder::new(layout)
                .resource(uniform.binding_resource())
                .create(device, "Object Bind Group");
            ObjectGpuResources { uniform, bind_group }
        });
        gpu.uniform.update_content(queue, content);
    }
}

pub trait DrawModel {
    fn draw_mesh(&mut self, mesh: &Mesh);
    fn draw_model(&mut self, model: &Model);
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh(&mut self, mesh: &Mesh) {
        // Not uploaded yet: skip rather than bind stale buffers
        let Some(buffers) = mesh.buffers.get() else {
            return;
        };
        self.set_vertex_buffer(0, buffers.vertex.slice(..));
        self.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count(), 0, 0..1);
    }

    fn draw_model(&mut self, model: &Model) {
        for mesh in &model.meshes {
            self.draw_mesh(mesh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::generate_cube;

    #[test]
    fn test_model_bounds_cover_all_meshes() {
        let a = Mesh::from_geometry(&generate_cube(1.0));
        let mut b = generate_cube(0.5);
        for p in &mut b.positions {
            p[0] += 3.0;
        }
        let model = Model::new("pair", vec![a, Mesh::from_geometry(&b)], Material::default());

        assert_eq!(model.bounds().min, Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(model.bounds().max, Vector3::new(3.5, 1.0, 1.0));
    }

    #[test]
    fn test_smooth_normals_for_flat_quad() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0, -1.0];
        let mesh = Mesh::from_flat(&positions, &[], vec![0, 1, 2, 0, 2, 3]);
        for vertex in mesh.vertices() {
            assert!((vertex.normal[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_duplicate_shares_model() {
        let model = Rc::new(Model::from_geometry("cube", &generate_cube(1.0), Material::default()));
        let object = RenderObject::new(Rc::clone(&model));
        let copy = object.duplicate();

        assert!(Rc::ptr_eq(copy.model(), &model));
        assert_eq!(Rc::strong_count(&model), 3);
        assert!(copy.gpu().is_none());
    }

    #[test]
    fn test_object_uniform_layout() {
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 160);
        let uniform = ObjectUniform::new(
            Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0),
            &Material::default(),
            true,
        );
        assert_eq!(uniform.normal_matrix[0][0], 0.5);
        assert_eq!(uniform.material[2], 1.0);
    }
}
