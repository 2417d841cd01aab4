//! # Object Picking
//!
//! Mouse clicks become world-space rays by unprojecting the cursor through
//! the inverse view-projection. The ray is then tested against every node
//! that carries a model, in that node's local space, so the model's own
//! bounding box can be used unchanged however the node is transformed.
//!
//! The nearest hit wins. Equal distances keep the node visited first.

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::gfx::geometry::Frustum;
use crate::gfx::scene::{NodeId, SceneNode};

/// A world-space ray built from a click, plus the result of tracing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseRay {
    pub origin: Vector3<f32>,
    /// Unit length
    pub direction: Vector3<f32>,
    pub hit: bool,
    pub distance: f32,
}

impl MouseRay {
    pub fn new(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        let direction = if direction.magnitude2() > 0.0 {
            direction.normalize()
        } else {
            -Vector3::unit_z()
        };
        Self {
            origin,
            direction,
            hit: false,
            distance: f32::INFINITY,
        }
    }

    /// Ray through the pixel at `screen` (origin top-left) of a viewport,
    /// starting on the near plane.
    pub fn from_screen(screen: (f32, f32), viewport: (f32, f32), view_proj: &Matrix4<f32>) -> Self {
        let ndc_x = 2.0 * screen.0 / viewport.0.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.1 / viewport.1.max(1.0);
        let inverse = view_proj.invert().unwrap_or_else(Matrix4::identity);

        // wgpu clip depth runs from 0 at the near plane to 1 at the far plane
        let unproject = |z: f32| {
            let p = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
            p.truncate() / p.w
        };
        let near = unproject(0.0);
        let far = unproject(1.0);
        Self::new(near, far - near)
    }

    pub fn point_at(&self, distance: f32) -> Vector3<f32> {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub distance: f32,
}

/// Distance along `ray` to the model bounds of `node`, if it has a model
/// and the ray reaches it.
pub fn intersect_node(node: &SceneNode, ray: &MouseRay) -> Option<f32> {
    let object = node.object()?;
    let inverse = node.world_matrix().invert()?;
    let origin = (inverse * ray.origin.extend(1.0)).truncate();
    // Left unnormalised so local t equals world distance.
    let direction = (inverse * ray.direction.extend(0.0)).truncate();
    object.local_bounds().intersect_ray(origin, direction)
}

/// Nearest node under `ray` in `root`'s subtree. Updates the ray's hit
/// flag and distance.
pub fn pick_node(root: &SceneNode, ray: &mut MouseRay) -> Option<PickHit> {
    let mut nearest: Option<PickHit> = None;
    root.walk(&mut |node, _| {
        let Some(distance) = intersect_node(node, ray) else {
            return;
        };
        if nearest.map_or(true, |best| distance < best.distance) {
            nearest = Some(PickHit {
                node: node.id(),
                distance,
            });
        }
    });

    ray.hit = nearest.is_some();
    ray.distance = nearest.map_or(f32::INFINITY, |hit| hit.distance);
    nearest
}

/// Whether the light pass skips `node`: only non-root nodes with a
/// collider fully outside the frustum are culled.
pub fn is_culled(node: &SceneNode, frustum: &Frustum) -> bool {
    if node.is_root() {
        return false;
    }
    node.collider()
        .is_some_and(|c| !frustum.intersects_sphere(c.world_center(), c.world_radius()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::Camera;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::scene::{Material, Model, NodeIdAllocator, RenderObject};
    use approx::assert_relative_eq;
    use cgmath::Point3;
    use std::rc::Rc;

    fn cube_node(ids: &mut NodeIdAllocator, name: &str, position: Vector3<f32>) -> SceneNode {
        let model = Rc::new(Model::from_geometry("cube", &generate_cube(1.0), Material::default()));
        let mut node = SceneNode::with_object(ids.allocate(), name, RenderObject::new(model));
        node.set_position(position);
        node
    }

    fn scene_with(children: Vec<SceneNode>) -> SceneNode {
        let mut root = SceneNode::new(NodeId::ROOT, "Root");
        for child in children {
            root.add_child(child);
        }
        root.update(&Matrix4::identity(), true);
        root
    }

    #[test]
    fn test_pick_hits_entry_face() {
        let mut ids = NodeIdAllocator::default();
        let child = cube_node(&mut ids, "cube", Vector3::new(5.0, 0.0, 0.0));
        let id = child.id();
        let root = scene_with(vec![child]);

        let mut ray = MouseRay::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        let hit = pick_node(&root, &mut ray).unwrap();

        assert_eq!(hit.node, id);
        assert!(ray.hit);
        assert_relative_eq!(ray.distance, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_pick_away_misses() {
        let mut ids = NodeIdAllocator::default();
        let root = scene_with(vec![cube_node(&mut ids, "cube", Vector3::new(5.0, 0.0, 0.0))]);

        let mut ray = MouseRay::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0));
        assert!(pick_node(&root, &mut ray).is_none());
        assert!(!ray.hit);
    }

    #[test]
    fn test_nearest_wins_and_ties_keep_first() {
        let mut ids = NodeIdAllocator::default();
        let far = cube_node(&mut ids, "far", Vector3::new(10.0, 0.0, 0.0));
        let near = cube_node(&mut ids, "near", Vector3::new(5.0, 0.0, 0.0));
        let twin = cube_node(&mut ids, "twin", Vector3::new(5.0, 0.0, 0.0));
        let near_id = near.id();
        let root = scene_with(vec![far, near, twin]);

        let mut ray = MouseRay::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(pick_node(&root, &mut ray).unwrap().node, near_id);
    }

    #[test]
    fn test_scaled_node_distance_is_world_space() {
        let mut ids = NodeIdAllocator::default();
        let mut child = cube_node(&mut ids, "big", Vector3::new(10.0, 0.0, 0.0));
        child.set_scale(Vector3::new(2.0, 2.0, 2.0));
        let root = scene_with(vec![child]);

        let mut ray = MouseRay::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        pick_node(&root, &mut ray).unwrap();
        assert_relative_eq!(ray.distance, 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_screen_centre_ray_follows_camera_front() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 10.0), -90.0, 0.0, 1.0);
        let ray = MouseRay::from_screen((50.0, 50.0), (100.0, 100.0), &camera.view_projection());

        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-4);
        assert_relative_eq!(ray.origin.z, 10.0 - camera.near(), epsilon = 1e-3);
    }

    #[test]
    fn test_screen_top_edge_points_up() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 10.0), -90.0, 0.0, 1.0);
        let ray = MouseRay::from_screen((50.0, 0.0), (100.0, 100.0), &camera.view_projection());
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn test_cull_predicate() {
        let camera = Camera::new(Point3::new(0.0, 0.0, 10.0), -90.0, 0.0, 1.0);
        let mut ids = NodeIdAllocator::default();
        let visible = cube_node(&mut ids, "visible", Vector3::new(0.0, 0.0, 0.0));
        let behind = cube_node(&mut ids, "behind", Vector3::new(0.0, 0.0, 30.0));
        let empty = {
            let mut node = SceneNode::new(ids.allocate(), "group");
            node.set_position(Vector3::new(0.0, 0.0, 30.0));
            node
        };
        let root = scene_with(vec![visible, behind, empty]);
        let frustum = camera.frustum();

        let culled: Vec<bool> = root.children().iter().map(|n| is_culled(n, frustum)).collect();
        assert_eq!(culled, vec![false, true, false]);
        assert!(!is_culled(&root, frustum));
    }
}
